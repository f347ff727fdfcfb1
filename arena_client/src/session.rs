//! Transport session.
//!
//! Owns the connection to one authority. Socket I/O runs on two background
//! tasks; everything they read is handed over through an ordered channel so
//! that events are only ever processed on the caller's task.

use std::time::Duration;

use arena_shared::net::{
    events, Envelope, FrameConn, FrameReader, FrameWriter, Hello, PlayerId, Welcome,
    PROTOCOL_VERSION,
};
use serde::Serialize;
use tokio::{
    net::TcpStream,
    sync::mpsc::{self, error::TryRecvError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// How long the authority has to answer `hello`.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected session.
pub struct Session {
    id: PlayerId,
    outbound: mpsc::UnboundedSender<Envelope>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    reader: JoinHandle<()>,
    _writer: JoinHandle<()>,
}

impl Session {
    /// Connects and performs the handshake.
    pub async fn connect(addr: &str) -> Result<Self, SessionError> {
        info!(server = %addr, "Connecting to server");

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| SessionError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        // Pose updates are small and frequent.
        let _ = stream.set_nodelay(true);
        let mut conn = FrameConn::new(stream);

        let id = tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&mut conn))
            .await
            .map_err(|_| SessionError::Handshake("timed out waiting for welcome".into()))??;

        info!(session_id = %id, "Connected to server");
        Ok(Self::from_conn(id, conn))
    }

    fn from_conn(id: PlayerId, conn: FrameConn) -> Self {
        let (reader, writer) = conn.into_split();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        Self {
            id,
            outbound: out_tx,
            inbound: in_rx,
            reader: tokio::spawn(read_loop(reader, in_tx)),
            _writer: tokio::spawn(write_loop(writer, out_rx)),
        }
    }

    /// The id the authority assigned to this session.
    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    /// Queues a typed event for transmission. Never waits on the socket.
    pub fn emit<T: Serialize>(&self, event: &str, payload: &T) -> Result<(), SessionError> {
        let env = Envelope::new(event, payload).map_err(|source| SessionError::Encode {
            event: event.to_string(),
            source,
        })?;
        self.send(env)
    }

    /// Queues a prepared envelope for transmission.
    pub fn send(&self, env: Envelope) -> Result<(), SessionError> {
        self.outbound.send(env).map_err(|_| SessionError::Closed)
    }

    /// Waits for the next inbound event.
    pub async fn recv(&mut self) -> Result<Envelope, SessionError> {
        self.inbound.recv().await.ok_or(SessionError::Closed)
    }

    /// Returns the next inbound event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<Envelope>, SessionError> {
        match self.inbound.try_recv() {
            Ok(env) => Ok(Some(env)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SessionError::Closed),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The writer exits on its own once the outbound sender is gone, after
        // flushing what was already queued.
        self.reader.abort();
    }
}

async fn handshake(conn: &mut FrameConn) -> Result<PlayerId, SessionError> {
    let hello = Envelope::new(events::HELLO, &Hello {
        protocol: PROTOCOL_VERSION,
    })
    .map_err(|source| SessionError::Encode {
        event: events::HELLO.to_string(),
        source,
    })?;
    conn.send(&hello)
        .await
        .map_err(|e| SessionError::Handshake(format!("{e:#}")))?;

    let reply = conn
        .recv()
        .await
        .map_err(|e| SessionError::Handshake(format!("{e:#}")))?
        .ok_or_else(|| SessionError::Handshake("server closed during handshake".into()))?;
    if reply.event != events::WELCOME {
        return Err(SessionError::Handshake(format!(
            "expected welcome, got `{}`",
            reply.event
        )));
    }
    let welcome: Welcome = reply
        .decode()
        .map_err(|e| SessionError::Handshake(format!("bad welcome: {e}")))?;
    Ok(welcome.session_id)
}

async fn read_loop(mut reader: FrameReader, tx: mpsc::UnboundedSender<Envelope>) {
    loop {
        match reader.recv().await {
            Ok(Some(env)) => {
                if tx.send(env).is_err() {
                    break;
                }
            }
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Connection error");
                break;
            }
        }
    }
}

async fn write_loop(mut writer: FrameWriter, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(env) = rx.recv().await {
        if let Err(e) = writer.send(&env).await {
            warn!(event = %env.event, error = %format!("{e:#}"), "Send failed");
            break;
        }
    }
    debug!("Writer stopped");
}
