//! Session registry and state store.
//!
//! The registry is the single owner of all per-connection state. It lives on
//! the hub task and is never shared, so every mutation and snapshot read is
//! serialized by construction. Stale or invalid operations (update for an
//! unknown identity, duplicate egg create) are absorbed as no-ops rather
//! than reported; they reflect races with disconnects, not bugs.

use std::collections::HashMap;

use presence_shared::net::MoveData;
use presence_shared::state::{ClientId, EggState, PlayerState, SessionSnapshot};

/// Live session state: one `PlayerState` per connected identity, plus at
/// most one `EggState` per identity.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    players: HashMap<ClientId, PlayerState>,
    eggs: HashMap<ClientId, EggState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the record for a newly connected identity and returns it.
    ///
    /// Identities are unique by construction of the transport, so an existing
    /// record is never overwritten; if one is somehow present it is returned
    /// unchanged.
    pub fn connect(&mut self, id: ClientId, state: PlayerState) -> PlayerState {
        *self.players.entry(id).or_insert(state)
    }

    /// Applies a pose update. Returns false (caller drops silently) when the
    /// identity is unknown, which happens when an update races a disconnect.
    /// The color is only replaced when the update carries one.
    pub fn apply_move(&mut self, id: ClientId, mv: &MoveData) -> bool {
        match self.players.get_mut(&id) {
            Some(p) => {
                p.x = mv.x;
                p.z = mv.z;
                p.rotation = mv.rotation;
                if let Some(color) = mv.color {
                    p.color = color;
                }
                true
            }
            None => false,
        }
    }

    /// Creates the egg for `id`. At most one egg per identity: a second
    /// create is ignored (not overwritten) and returns false, as does a
    /// create from an unregistered identity.
    pub fn create_egg(&mut self, id: ClientId, egg: EggState) -> bool {
        if !self.players.contains_key(&id) {
            return false;
        }
        if self.eggs.contains_key(&id) {
            return false;
        }
        self.eggs.insert(id, egg);
        true
    }

    /// Removes all state owned by `id`. Returns the removed player record
    /// and whether an egg existed; `None` when the identity was unknown.
    pub fn disconnect(&mut self, id: ClientId) -> Option<(PlayerState, bool)> {
        let player = self.players.remove(&id)?;
        let had_egg = self.eggs.remove(&id).is_some();
        Some((player, had_egg))
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.players.contains_key(&id)
    }

    /// Point-in-time copy of all live state. No aliasing into the live maps;
    /// later mutation never shows through a snapshot already taken.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            players: self.players.clone(),
            eggs: self.eggs.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_shared::state::Color;

    fn mv(x: f32, z: f32, rotation: f32) -> MoveData {
        MoveData {
            x,
            z,
            rotation,
            color: None,
        }
    }

    #[test]
    fn connect_then_disconnect_leaves_no_state() {
        let mut reg = SessionRegistry::new();
        let id = ClientId(1);

        reg.connect(id, PlayerState::at_origin(Color(0x123456)));
        assert!(reg.contains(id));
        assert_eq!(reg.len(), 1);

        assert!(reg.disconnect(id).is_some());
        assert!(!reg.contains(id));
        assert!(reg.is_empty());
        assert!(reg.snapshot().players.is_empty());
    }

    #[test]
    fn connect_never_overwrites_a_live_record() {
        let mut reg = SessionRegistry::new();
        let id = ClientId(1);

        let first = reg.connect(id, PlayerState::at_origin(Color(0x111111)));
        let second = reg.connect(id, PlayerState::at_origin(Color(0x222222)));
        assert_eq!(first, second);
        assert_eq!(second.color, Color(0x111111));
    }

    #[test]
    fn move_for_unknown_identity_is_dropped() {
        let mut reg = SessionRegistry::new();
        assert!(!reg.apply_move(ClientId(9), &mv(1.0, 2.0, 3.0)));
        assert!(reg.is_empty());
    }

    #[test]
    fn move_overwrites_pose_and_keeps_color() {
        let mut reg = SessionRegistry::new();
        let id = ClientId(1);
        reg.connect(id, PlayerState::at_origin(Color(0xABCDEF)));

        assert!(reg.apply_move(id, &mv(5.0, 5.0, 1.2)));
        let snap = reg.snapshot();
        let p = &snap.players[&id];
        assert_eq!((p.x, p.z, p.rotation), (5.0, 5.0, 1.2));
        assert_eq!(p.color, Color(0xABCDEF));
    }

    #[test]
    fn move_with_color_recolors() {
        let mut reg = SessionRegistry::new();
        let id = ClientId(1);
        reg.connect(id, PlayerState::at_origin(Color(0x000000)));

        let update = MoveData {
            color: Some(Color(0xFF0000)),
            ..mv(0.0, 0.0, 0.0)
        };
        assert!(reg.apply_move(id, &update));
        assert_eq!(reg.snapshot().players[&id].color, Color(0xFF0000));
    }

    #[test]
    fn at_most_one_egg_per_identity() {
        let mut reg = SessionRegistry::new();
        let id = ClientId(1);
        reg.connect(id, PlayerState::at_origin(Color(0)));

        let first = EggState {
            x: 1.0,
            z: 1.0,
            rotation: 0.0,
        };
        let second = EggState {
            x: 9.0,
            z: 9.0,
            rotation: 9.0,
        };
        assert!(reg.create_egg(id, first));
        assert!(!reg.create_egg(id, second));

        // Ignored, not overwritten.
        assert_eq!(reg.snapshot().eggs[&id], first);
    }

    #[test]
    fn egg_from_unregistered_identity_is_dropped() {
        let mut reg = SessionRegistry::new();
        assert!(!reg.create_egg(ClientId(4), EggState::default()));
        assert!(reg.snapshot().eggs.is_empty());
    }

    #[test]
    fn disconnect_reports_egg_ownership() {
        let mut reg = SessionRegistry::new();
        let a = ClientId(1);
        let b = ClientId(2);
        reg.connect(a, PlayerState::at_origin(Color(0)));
        reg.connect(b, PlayerState::at_origin(Color(0)));
        reg.create_egg(a, EggState::default());

        let (_, had_egg) = reg.disconnect(a).unwrap();
        assert!(had_egg);
        let (_, had_egg) = reg.disconnect(b).unwrap();
        assert!(!had_egg);

        // Removing a non-existent identity is a no-op.
        assert!(reg.disconnect(a).is_none());
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutation() {
        let mut reg = SessionRegistry::new();
        let id = ClientId(1);
        reg.connect(id, PlayerState::at_origin(Color(0)));

        let snap = reg.snapshot();
        reg.apply_move(id, &mv(7.0, 7.0, 7.0));
        reg.disconnect(id);

        assert_eq!(snap.players[&id].x, 0.0);
        assert_eq!(snap.players.len(), 1);
    }
}
