//! `presence_server`
//!
//! Server-side systems:
//! - Session registry owning all per-connection state
//! - Event routing with sender-exclusion fan-out
//! - Periodic snapshot broadcaster
//!
//! Networking model:
//! - One TCP connection per participant (length-prefixed JSON frames)
//! - One hub task owns the registry; per-connection reader/writer tasks
//!   never touch it directly.

pub mod registry;
pub mod router;
pub mod server;

pub use server::RelayServer;
