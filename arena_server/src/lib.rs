//! `arena_server`
//!
//! Reference authority for the arena protocol:
//! - Handshake and session id assignment
//! - Roster, spawn and team assignment
//! - Pose relay between players
//! - Star placement and team scoring
//!
//! Networking model:
//! - TCP, length-prefixed JSON envelopes (see `arena_shared::net`)
//! - One task per connection, one task owning all match state

pub mod server;

pub use server::{ArenaServer, Authority};
