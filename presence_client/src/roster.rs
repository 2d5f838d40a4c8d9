//! Client-side session mirror.
//!
//! The roster applies each received server event to a local copy of the
//! session. Deltas patch single records; `state_update_all` and full
//! `state_update`s replace wholesale, so a dropped delta heals on the next
//! tick. Relay events (keys, audio) carry no state and are ignored here.

use std::collections::HashMap;

use presence_shared::net::{ServerMsg, StateUpdate};
use presence_shared::state::{ClientId, EggState, PlayerState};

/// Last-known view of who is where.
#[derive(Debug, Default)]
pub struct Roster {
    pub players: HashMap<ClientId, PlayerState>,
    pub eggs: HashMap<ClientId, EggState>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one server event to the local view.
    pub fn apply(&mut self, msg: &ServerMsg) {
        match msg {
            ServerMsg::Init(init) => {
                self.players = init.snapshot.players.clone();
                self.eggs = init.snapshot.eggs.clone();
            }
            ServerMsg::NewPlayer(p) => {
                self.players.insert(p.id, p.state);
            }
            ServerMsg::NewEgg(e) => {
                self.eggs.insert(e.id, e.egg);
            }
            ServerMsg::StateUpdate(StateUpdate::Delta { id, x, z, rotation }) => {
                // A delta for an unknown id raced its new_player; the next
                // full snapshot fills it in.
                if let Some(p) = self.players.get_mut(id) {
                    p.x = *x;
                    p.z = *z;
                    p.rotation = *rotation;
                }
            }
            ServerMsg::StateUpdate(StateUpdate::Full { players }) => {
                self.players = players.clone();
            }
            ServerMsg::StateUpdateAll(snap) => {
                self.players = snap.players.clone();
                self.eggs = snap.eggs.clone();
            }
            ServerMsg::PlayerDisconnected { id } => {
                self.players.remove(id);
            }
            ServerMsg::EggDisconnected { id } => {
                self.eggs.remove(id);
            }
            // Transient relay events carry no session state.
            ServerMsg::KeyDown { .. }
            | ServerMsg::KeyUp { .. }
            | ServerMsg::StartAudio { .. }
            | ServerMsg::StopAudio { .. }
            | ServerMsg::AudioStream { .. } => {}
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
