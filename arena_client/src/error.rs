//! Client error taxonomy.

use arena_shared::net::PlayerId;
use thiserror::Error;

/// Failures local to one inbound event or registry operation.
///
/// None of these are fatal: the driver logs them and keeps ticking.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An event referenced a player with no registry entry.
    #[error("no entity for player {0}")]
    UnknownEntity(PlayerId),

    /// A second construction for a player that already has a proxy.
    #[error("entity for player {0} already exists")]
    DuplicateEntity(PlayerId),

    /// The payload did not have the shape the event requires.
    #[error("malformed `{event}` payload")]
    MalformedPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// A handler is already registered for this event name.
    #[error("handler for `{0}` already registered")]
    DuplicateHandler(String),
}

/// Failures of the transport session. All of them end the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connect to {addr} failed")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("encode `{event}` payload")]
    Encode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("session closed")]
    Closed,
}
