//! Wire protocol and framing.
//!
//! Goals:
//! - One typed enum per direction; the tagged-JSON encoding reproduces the
//!   relay's event contract exactly (`{"event": "...", "data": {...}}`).
//! - Length-prefixed frames over TCP give in-order, per-connection delivery.
//! - Keep serialization explicit and inspectable.

use anyhow::{bail, Context};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    time,
};

use crate::state::{ClientId, Color, EggState, PlayerState, SessionSnapshot};

/// Upper bound on a single frame; anything larger is treated as a protocol
/// violation (opaque audio payloads included).
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Initial pose for the announced-join variant. Every field is optional on
/// the wire; absent fields fall back to the origin / a server color.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JoinData {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

/// Pose update from a client. May carry a replacement color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveData {
    pub x: f32,
    pub z: f32,
    pub rotation: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

/// Client -> server events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Announced join (only meaningful to servers running the
    /// client-supplied variant; ignored once registered).
    PlayerJoined(JoinData),
    /// Pose update for the sender's own record.
    Move(MoveData),
    /// Creates the sender's egg; at most one per connection.
    CreateEgg(EggState),
    // Relay-only events; never stored server-side.
    KeyDown { key: String },
    KeyUp { key: String },
    StartAudio,
    StopAudio,
    /// Opaque audio payload, forwarded verbatim.
    AudioStream(serde_json::Value),
}

/// `init` payload: the joiner's own id plus the full current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitData {
    pub id: ClientId,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

/// `new_player` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerAnnounce {
    pub id: ClientId,
    #[serde(flatten)]
    pub state: PlayerState,
}

/// `new_egg` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EggAnnounce {
    pub id: ClientId,
    #[serde(flatten)]
    pub egg: EggState,
}

/// `state_update` payload. Which shape is sent depends on the server's sync
/// policy; the event name is the same either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateUpdate {
    /// Incremental: one mover's new pose.
    Delta {
        id: ClientId,
        x: f32,
        z: f32,
        rotation: f32,
    },
    /// Full: the complete player map, sent all-inclusive.
    Full {
        players: HashMap<ClientId, PlayerState>,
    },
}

/// Server -> client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Unicast to the joiner only.
    Init(InitData),
    /// All except the joiner.
    NewPlayer(PlayerAnnounce),
    /// All except the creator.
    NewEgg(EggAnnounce),
    /// All except the mover (delta) or all-inclusive (full).
    StateUpdate(StateUpdate),
    /// Periodic reconciling snapshot; all connections, every tick.
    StateUpdateAll(SessionSnapshot),
    /// All except the departed connection.
    PlayerDisconnected { id: ClientId },
    EggDisconnected { id: ClientId },
    // Relayed events, tagged with the sender's id; all except the sender.
    KeyDown { id: ClientId, key: String },
    KeyUp { id: ClientId, key: String },
    StartAudio { id: ClientId },
    StopAudio { id: ClientId },
    AudioStream { id: ClientId, data: serde_json::Value },
}

/// Encodes a message to its JSON frame payload.
pub fn encode_to_bytes<T: Serialize>(msg: &T) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

/// Decodes a message from a JSON frame payload.
pub fn decode_from_bytes<T: DeserializeOwned>(b: &[u8]) -> anyhow::Result<T> {
    serde_json::from_slice(b).context("deserialize")
}

async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, payload: &[u8]) -> anyhow::Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        bail!("frame too large: {} bytes", payload.len());
    }
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(payload);
    w.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> anyhow::Result<Bytes> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await.context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame too large: {len} bytes");
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).await.context("tcp read payload")?;
    Ok(Bytes::from(payload))
}

/// Bidirectional event connection over TCP with length-prefixed JSON frames.
#[derive(Debug)]
pub struct EventConn {
    stream: TcpStream,
}

impl EventConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        Ok(Self::new(stream))
    }

    pub async fn send<T: Serialize>(&mut self, msg: &T) -> anyhow::Result<()> {
        let payload = encode_to_bytes(msg)?;
        write_frame(&mut self.stream, &payload).await
    }

    pub async fn recv<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        let payload = read_frame(&mut self.stream).await?;
        decode_from_bytes(&payload)
    }

    /// Receives a message within the given timeout.
    pub async fn recv_timeout<T: DeserializeOwned>(
        &mut self,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Option<T>> {
        match time::timeout(timeout, self.recv()).await {
            Ok(Ok(msg)) => Ok(Some(msg)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Splits into independently owned read and write halves, so a reader
    /// task and a writer task can run per connection.
    pub fn into_split(self) -> (EventReader, EventWriter) {
        let (r, w) = self.stream.into_split();
        (EventReader { half: r }, EventWriter { half: w })
    }
}

/// Read half of a split [`EventConn`].
#[derive(Debug)]
pub struct EventReader {
    half: OwnedReadHalf,
}

impl EventReader {
    /// Reads one raw frame. Errors mean the connection is gone; a frame that
    /// fails to decode afterwards is the caller's call (typically dropped).
    pub async fn recv_frame(&mut self) -> anyhow::Result<Bytes> {
        read_frame(&mut self.half).await
    }

    pub async fn recv<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        let payload = self.recv_frame().await?;
        decode_from_bytes(&payload)
    }
}

/// Write half of a split [`EventConn`].
#[derive(Debug)]
pub struct EventWriter {
    half: OwnedWriteHalf,
}

impl EventWriter {
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> anyhow::Result<()> {
        let payload = encode_to_bytes(msg)?;
        write_frame(&mut self.half, &payload).await
    }
}

/// TCP server listener.
pub struct EventListener {
    listener: TcpListener,
}

impl EventListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(EventConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((EventConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
