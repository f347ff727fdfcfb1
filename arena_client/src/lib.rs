//! `arena_client`
//!
//! Client-side systems:
//! - Transport session (framed TCP, background I/O, ordered inbound queue)
//! - Typed event dispatch
//! - Remote player registry
//! - Input model
//! - The state-synchronization core (change detection, entity lifecycle)

pub mod client;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod registry;
pub mod session;
pub mod sync;

pub use client::GameClient;
pub use error::{SessionError, SyncError};
pub use sync::SyncCore;
