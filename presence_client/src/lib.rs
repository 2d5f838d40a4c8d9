//! `presence_client`
//!
//! Client-side systems:
//! - Connection management and the `init` handshake
//! - Typed event sending (move, egg, key, audio)
//! - A local roster mirroring the server's session state from received
//!   events (rendering is someone else's job)

pub mod client;
pub mod roster;

pub use client::RelayClient;
pub use roster::Roster;
