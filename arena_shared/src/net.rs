//! Networking primitives.
//!
//! Goals:
//! - Provide a reliable (TCP) framed channel carrying named events.
//! - Provide the payload records exchanged between client and authority.
//! - Keep serialization explicit and versionable.
//!
//! Every frame is a 4-byte big-endian length followed by a JSON [`Envelope`].
//! Payload field names are camelCase on the wire.

use std::{collections::HashMap, fmt, net::SocketAddr};

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on a single frame body.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Event names used on the wire.
pub mod events {
    // ─── Handshake ───
    pub const HELLO: &str = "hello";
    pub const WELCOME: &str = "welcome";

    // ─── Server -> client ───
    pub const CURRENT_PLAYERS: &str = "currentPlayers";
    pub const NEW_PLAYER: &str = "newPlayer";
    pub const DISCONNECTED: &str = "disconnected";
    pub const PLAYER_MOVED: &str = "playerMoved";
    pub const SCORE_UPDATE: &str = "scoreUpdate";
    pub const STAR_LOCATION: &str = "starLocation";

    // ─── Client -> server ───
    pub const PLAYER_MOVEMENT: &str = "playerMovement";
    pub const STAR_COLLECTED: &str = "starCollected";
}

/// Identifies a player. A session's own id is the player id the authority
/// assigned to it during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Team a player belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

/// Authoritative state of one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub player_id: PlayerId,
    pub team: Team,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

/// Initial roster: every player present when the session joined.
pub type Roster = HashMap<PlayerId, PlayerState>;

/// Server -> client: another player's new pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMoved {
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

/// Team scores. Replaced wholesale on every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreState {
    pub blue: u32,
    pub red: u32,
}

/// Server -> client: where the collectible star currently is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarLocation {
    pub x: f64,
    pub y: f64,
}

/// Client -> server: the local craft's pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerMovement {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

/// Client -> server handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub protocol: u32,
}

/// Server -> client handshake reply carrying the session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub session_id: PlayerId,
}

/// A named event with an untyped payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Builds an envelope from a typed payload.
    pub fn new<T: Serialize>(event: &str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(payload)?,
        })
    }

    /// Builds an envelope with no payload.
    pub fn bare(event: &str) -> Self {
        Self {
            event: event.to_string(),
            data: Value::Null,
        }
    }

    /// Parses the payload into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.data)
    }
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct FrameConn {
    stream: TcpStream,
}

impl FrameConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok(Self::new(stream))
    }

    pub async fn send(&mut self, env: &Envelope) -> anyhow::Result<()> {
        write_frame(&mut self.stream, env).await
    }

    /// Receives one frame. `None` means the peer closed at a frame boundary.
    pub async fn recv(&mut self) -> anyhow::Result<Option<Envelope>> {
        read_frame(&mut self.stream).await
    }

    /// Splits into independently owned read and write halves.
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        let (r, w) = self.stream.into_split();
        (FrameReader { half: r }, FrameWriter { half: w })
    }
}

/// Read half of a [`FrameConn`].
#[derive(Debug)]
pub struct FrameReader {
    half: OwnedReadHalf,
}

impl FrameReader {
    pub async fn recv(&mut self) -> anyhow::Result<Option<Envelope>> {
        read_frame(&mut self.half).await
    }
}

/// Write half of a [`FrameConn`].
#[derive(Debug)]
pub struct FrameWriter {
    half: OwnedWriteHalf,
}

impl FrameWriter {
    pub async fn send(&mut self, env: &Envelope) -> anyhow::Result<()> {
        write_frame(&mut self.half, env).await
    }
}

async fn write_frame<W>(w: &mut W, env: &Envelope) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode_frame(env)?;
    w.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

async fn read_frame<R>(r: &mut R) -> anyhow::Result<Option<Envelope>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match r.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("tcp read len"),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    anyhow::ensure!(len <= MAX_FRAME_LEN, "frame of {len} bytes exceeds limit");
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    let env = decode_from_bytes(&payload)?;
    Ok(Some(env))
}

/// TCP server listener.
pub struct FrameListener {
    listener: TcpListener,
}

impl FrameListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(FrameConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok((FrameConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Encodes an envelope as a length-prefixed frame.
pub fn encode_frame(env: &Envelope) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(env).context("serialize envelope")?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

/// Convenience codec helpers.
pub fn encode_to_bytes(env: &Envelope) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(env).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<Envelope> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn player_state_uses_camel_case_and_lowercase_team() {
        let state = PlayerState {
            player_id: PlayerId::new("abc"),
            team: Team::Blue,
            x: 10.0,
            y: 20.0,
            rotation: 0.5,
        };
        let v = serde_json::to_value(&state).unwrap();
        assert_eq!(
            v,
            json!({"playerId": "abc", "team": "blue", "x": 10.0, "y": 20.0, "rotation": 0.5})
        );
    }

    #[test]
    fn roster_decodes_from_id_keyed_object() {
        let env = Envelope {
            event: events::CURRENT_PLAYERS.to_string(),
            data: json!({
                "a": {"playerId": "a", "team": "red", "x": 1, "y": 2, "rotation": 0},
                "b": {"playerId": "b", "team": "blue", "x": 3, "y": 4, "rotation": 0}
            }),
        };
        let roster: Roster = env.decode().unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[&PlayerId::new("b")].team, Team::Blue);
    }

    #[test]
    fn missing_field_is_rejected() {
        let env = Envelope {
            event: events::PLAYER_MOVED.to_string(),
            data: json!({"playerId": "a", "x": 1.0, "rotation": 0.0}),
        };
        assert!(env.decode::<PlayerMoved>().is_err());
    }

    #[test]
    fn bare_envelope_has_null_data_and_tolerates_absence() {
        let env = decode_from_bytes(br#"{"event":"starCollected"}"#).unwrap();
        assert_eq!(env, Envelope::bare(events::STAR_COLLECTED));
    }

    #[test]
    fn disconnected_payload_is_a_plain_string() {
        let env = Envelope::new(events::DISCONNECTED, &PlayerId::new("gone")).unwrap();
        assert_eq!(env.data, json!("gone"));
        assert_eq!(env.decode::<PlayerId>().unwrap(), PlayerId::new("gone"));
    }

    #[test]
    fn frame_has_big_endian_length_prefix() {
        let env = Envelope::bare(events::STAR_COLLECTED);
        let frame = encode_frame(&env).unwrap();
        let body = encode_to_bytes(&env).unwrap();
        assert_eq!(&frame[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..], &body[..]);
    }

    #[tokio::test]
    async fn frames_cross_a_socket_in_order() -> anyhow::Result<()> {
        let listener = FrameListener::bind("127.0.0.1:0".parse()?).await?;
        let addr = listener.local_addr()?;
        let accept = tokio::spawn(async move { listener.accept().await });

        let mut client = FrameConn::connect(addr).await?;
        let (server, _) = accept.await??;
        let (mut reader, _writer) = server.into_split();

        client
            .send(&Envelope::new(events::HELLO, &Hello { protocol: PROTOCOL_VERSION })?)
            .await?;
        client.send(&Envelope::bare(events::STAR_COLLECTED)).await?;
        drop(client);

        assert_eq!(reader.recv().await?.map(|e| e.event), Some("hello".into()));
        assert_eq!(
            reader.recv().await?.map(|e| e.event),
            Some("starCollected".into())
        );
        assert!(reader.recv().await?.is_none());
        Ok(())
    }
}
