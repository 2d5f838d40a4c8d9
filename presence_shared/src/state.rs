//! Session state types.
//!
//! One `PlayerState` per live connection, plus an optional `EggState` keyed
//! by the creating connection. All per-connection state lives exactly as long
//! as the connection that owns it; the registry on the server is the single
//! owner of these records.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static NEXT_CLIENT_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies one live transport connection. Server-assigned, never reused
/// for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

impl ClientId {
    pub fn new_unique() -> Self {
        ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// On the wire, ids are decimal strings so that snapshot maps keyed by id
// serialize as plain JSON objects.
impl Serialize for ClientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u32>().map(ClientId).map_err(serde::de::Error::custom)
    }
}

/// Opaque display color. Server-generated values are in `0..=0xFFFFFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    /// Picks a uniformly random 24-bit color.
    pub fn random() -> Self {
        Color(rand::thread_rng().gen_range(0..=0xFF_FFFF))
    }
}

/// Pose and display state for one connected participant.
///
/// Coordinates are world-plane floats with no server-side range constraint;
/// `rotation` units are caller-defined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: f32,
    pub z: f32,
    pub rotation: f32,
    pub color: Color,
}

impl PlayerState {
    /// A player at the origin with the given color.
    pub fn at_origin(color: Color) -> Self {
        Self {
            x: 0.0,
            z: 0.0,
            rotation: 0.0,
            color,
        }
    }
}

/// Secondary entity, at most one per connection identity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EggState {
    pub x: f32,
    pub z: f32,
    pub rotation: f32,
}

/// Full, point-in-time copy of all live session state.
///
/// Deep copy by construction: mutating the live registry after taking a
/// snapshot never shows through here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub players: HashMap<ClientId, PlayerState>,
    pub eggs: HashMap<ClientId, EggState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_unique_and_monotonic() {
        let a = ClientId::new_unique();
        let b = ClientId::new_unique();
        assert_ne!(a, b);
        assert!(b.0 > a.0);
    }

    #[test]
    fn client_id_is_a_string_on_the_wire() {
        let json = serde_json::to_string(&ClientId(42)).unwrap();
        assert_eq!(json, "\"42\"");
        let back: ClientId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ClientId(42));
    }

    #[test]
    fn snapshot_maps_key_by_id_string() {
        let mut snap = SessionSnapshot::default();
        snap.players
            .insert(ClientId(7), PlayerState::at_origin(Color(0xABCDEF)));
        let v = serde_json::to_value(&snap).unwrap();
        assert!(v["players"]["7"].is_object());
        assert_eq!(v["players"]["7"]["color"], 0xABCDEF);
    }

    #[test]
    fn random_color_is_24_bit() {
        for _ in 0..100 {
            assert!(Color::random().0 <= 0xFF_FFFF);
        }
    }
}
