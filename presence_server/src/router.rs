//! Event routing and fan-out selection.
//!
//! The router validates each inbound event against the registry, applies the
//! state store contract, and decides who hears about it. It is a pure
//! decision layer: it returns addressed messages and never touches a socket,
//! so the fan-out rules (in particular sender exclusion) are testable
//! without any networking.
//!
//! Addressing rule: every broadcast triggered by a connection's own event
//! excludes that connection. The two exceptions are `init` (unicast to the
//! joiner) and the reconciling full-state broadcasts, which are
//! all-inclusive.

use presence_shared::config::{ColorSource, RelayConfig, SyncPolicy};
use presence_shared::net::{
    ClientMsg, EggAnnounce, InitData, JoinData, PlayerAnnounce, ServerMsg, StateUpdate,
};
use presence_shared::state::{ClientId, Color, PlayerState};
use tracing::debug;

use crate::registry::SessionRegistry;

/// Which connections receive an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Unicast.
    To(ClientId),
    /// Every connection except one (the sender, the joiner, the departed).
    Except(ClientId),
    /// Every connection, unconditionally.
    All,
}

/// An addressed outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub addressing: Addressing,
    pub msg: ServerMsg,
}

impl Outbound {
    fn to(id: ClientId, msg: ServerMsg) -> Self {
        Self {
            addressing: Addressing::To(id),
            msg,
        }
    }

    fn except(id: ClientId, msg: ServerMsg) -> Self {
        Self {
            addressing: Addressing::Except(id),
            msg,
        }
    }

    fn all(msg: ServerMsg) -> Self {
        Self {
            addressing: Addressing::All,
            msg,
        }
    }
}

/// Handles a new transport connection.
///
/// Under `server_random` the identity is registered immediately with a
/// random color and origin pose. Under `client_supplied` nothing happens
/// until the `player_joined` event arrives.
pub fn on_connect(reg: &mut SessionRegistry, cfg: &RelayConfig, id: ClientId) -> Vec<Outbound> {
    match cfg.color_source {
        ColorSource::ServerRandom => {
            register(reg, cfg, id, PlayerState::at_origin(Color::random()))
        }
        ColorSource::ClientSupplied => Vec::new(),
    }
}

/// Handles one inbound client event.
pub fn on_message(
    reg: &mut SessionRegistry,
    cfg: &RelayConfig,
    id: ClientId,
    msg: ClientMsg,
) -> Vec<Outbound> {
    match msg {
        ClientMsg::PlayerJoined(join) => {
            if reg.contains(id) {
                // Already registered (implicit-join servers, or a repeat).
                return Vec::new();
            }
            register(reg, cfg, id, player_from_join(&join))
        }
        ClientMsg::Move(mv) => {
            if !reg.apply_move(id, &mv) {
                // Raced a disconnect; absorb.
                debug!(client_id = %id, "Dropping move for unknown identity");
                return Vec::new();
            }
            match cfg.sync_policy {
                SyncPolicy::Incremental => vec![Outbound::except(
                    id,
                    ServerMsg::StateUpdate(StateUpdate::Delta {
                        id,
                        x: mv.x,
                        z: mv.z,
                        rotation: mv.rotation,
                    }),
                )],
                SyncPolicy::FullOnMove => vec![full_update(reg)],
            }
        }
        ClientMsg::CreateEgg(egg) => {
            if !reg.create_egg(id, egg) {
                // Duplicate or unregistered creator: silent, no message.
                return Vec::new();
            }
            vec![Outbound::except(
                id,
                ServerMsg::NewEgg(EggAnnounce { id, egg }),
            )]
        }
        // Relay-only events: never stored, forwarded with the sender id.
        ClientMsg::KeyDown { key } => relay(reg, id, ServerMsg::KeyDown { id, key }),
        ClientMsg::KeyUp { key } => relay(reg, id, ServerMsg::KeyUp { id, key }),
        ClientMsg::StartAudio => relay(reg, id, ServerMsg::StartAudio { id }),
        ClientMsg::StopAudio => relay(reg, id, ServerMsg::StopAudio { id }),
        ClientMsg::AudioStream(data) => relay(reg, id, ServerMsg::AudioStream { id, data }),
    }
}

/// Handles a transport disconnect. Fires at most once per connection.
pub fn on_disconnect(reg: &mut SessionRegistry, cfg: &RelayConfig, id: ClientId) -> Vec<Outbound> {
    let Some((_, had_egg)) = reg.disconnect(id) else {
        return Vec::new();
    };

    let mut out = vec![Outbound::except(id, ServerMsg::PlayerDisconnected { id })];
    if had_egg {
        out.push(Outbound::except(id, ServerMsg::EggDisconnected { id }));
    }
    if cfg.sync_policy == SyncPolicy::FullOnMove {
        out.push(full_update(reg));
    }
    out
}

/// One periodic broadcaster tick: a reconciling snapshot to everyone,
/// inclusive of each recipient's own state.
pub fn on_tick(reg: &SessionRegistry) -> Outbound {
    Outbound::all(ServerMsg::StateUpdateAll(reg.snapshot()))
}

fn register(
    reg: &mut SessionRegistry,
    cfg: &RelayConfig,
    id: ClientId,
    state: PlayerState,
) -> Vec<Outbound> {
    let state = reg.connect(id, state);

    let mut out = vec![Outbound::to(
        id,
        ServerMsg::Init(InitData {
            id,
            snapshot: reg.snapshot(),
        }),
    )];
    match cfg.sync_policy {
        // Point event to everyone else; the ticker reconciles from there.
        SyncPolicy::Incremental => out.push(Outbound::except(
            id,
            ServerMsg::NewPlayer(PlayerAnnounce { id, state }),
        )),
        // An all-inclusive snapshot instead of a point event.
        SyncPolicy::FullOnMove => out.push(full_update(reg)),
    }
    out
}

fn player_from_join(join: &JoinData) -> PlayerState {
    PlayerState {
        x: join.x,
        z: join.z,
        rotation: join.rotation,
        color: join.color.unwrap_or_else(Color::random),
    }
}

fn relay(reg: &SessionRegistry, id: ClientId, msg: ServerMsg) -> Vec<Outbound> {
    if !reg.contains(id) {
        return Vec::new();
    }
    vec![Outbound::except(id, msg)]
}

fn full_update(reg: &SessionRegistry) -> Outbound {
    Outbound::all(ServerMsg::StateUpdate(StateUpdate::Full {
        players: reg.snapshot().players,
    }))
}
