//! `presence_shared`
//!
//! Shared libraries used by both the relay server and clients.
//!
//! Design goals:
//! - Clear separation of concerns (state, net, config).
//! - The wire contract lives in one place, typed end to end.
//! - No `unsafe`.

pub mod config;
pub mod net;
pub mod state;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::net::*;
    pub use crate::state::*;
}
