//! Configuration system.
//!
//! Loads relay configuration from JSON strings/files (file IO left to app).
//! Binaries layer CLI flags and the `PORT` environment variable on top.

use serde::{Deserialize, Serialize};

/// How the relay converges the shared view after a `move`.
///
/// Exactly one policy is active; they are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Incremental `state_update` deltas to everyone but the mover, plus the
    /// periodic all-inclusive `state_update_all` tick.
    #[default]
    Incremental,
    /// An all-inclusive full `state_update` on every join/move/disconnect;
    /// the periodic ticker is disabled.
    FullOnMove,
}

/// Where a participant's display color comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSource {
    /// Registration happens on transport connect with a random color.
    #[default]
    ServerRandom,
    /// Registration waits for a `player_joined` event, which may carry an
    /// initial pose and color.
    ClientSupplied,
}

/// Root relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Listen address, e.g. `0.0.0.0:3000`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Periodic snapshot broadcast rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default)]
    pub sync_policy: SyncPolicy,
    #[serde(default)]
    pub color_source: ColorSource,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_tick_hz() -> u32 {
    60
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            tick_hz: default_tick_hz(),
            sync_policy: SyncPolicy::default(),
            color_source: ColorSource::default(),
        }
    }
}

impl RelayConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Applies the `PORT` environment variable, keeping the configured host.
    /// Unparseable values are ignored.
    pub fn apply_port_env(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.set_port(port);
            }
        }
    }

    fn set_port(&mut self, port: u16) {
        if let Some((host, _)) = self.listen_addr.rsplit_once(':') {
            self.listen_addr = format!("{host}:{port}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_relay_contract() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
        assert_eq!(cfg.tick_hz, 60);
        assert_eq!(cfg.sync_policy, SyncPolicy::Incremental);
        assert_eq!(cfg.color_source, ColorSource::ServerRandom);
    }

    #[test]
    fn parses_partial_json() {
        let cfg = RelayConfig::from_json_str(
            r#"{"tick_hz": 30, "sync_policy": "full_on_move", "color_source": "client_supplied"}"#,
        )
        .unwrap();
        assert_eq!(cfg.tick_hz, 30);
        assert_eq!(cfg.sync_policy, SyncPolicy::FullOnMove);
        assert_eq!(cfg.color_source, ColorSource::ClientSupplied);
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
    }

    #[test]
    fn set_port_keeps_host() {
        let mut cfg = RelayConfig {
            listen_addr: "127.0.0.1:3000".into(),
            ..Default::default()
        };
        cfg.set_port(4000);
        assert_eq!(cfg.listen_addr, "127.0.0.1:4000");
    }
}
