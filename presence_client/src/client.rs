//! Client implementation.
//!
//! The client keeps one framed TCP connection to the relay. `connect` is for
//! implicit-join servers (the relay registers on transport connect and sends
//! `init` immediately); `join` announces a `player_joined` with an initial
//! pose first, for servers running the client-supplied variant. Either way
//! the constructor resolves once `init` arrives and the roster is seeded.

use std::net::SocketAddr;

use anyhow::Context;
use presence_shared::net::{ClientMsg, EventConn, JoinData, MoveData, ServerMsg};
use presence_shared::state::{ClientId, Color, EggState};
use tracing::{debug, info};

use crate::roster::Roster;

/// High-level relay client.
pub struct RelayClient {
    pub client_id: ClientId,
    pub roster: Roster,
    conn: EventConn,
}

impl RelayClient {
    /// Connects to an implicit-join relay and waits for `init`.
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let conn = EventConn::connect(addr).await?;
        Self::await_init(conn).await
    }

    /// Connects and announces a `player_joined` with the given initial pose,
    /// then waits for `init`.
    pub async fn join(addr: SocketAddr, join: JoinData) -> anyhow::Result<Self> {
        let mut conn = EventConn::connect(addr).await?;
        conn.send(&ClientMsg::PlayerJoined(join)).await?;
        Self::await_init(conn).await
    }

    async fn await_init(mut conn: EventConn) -> anyhow::Result<Self> {
        // Periodic snapshots may already be in flight for this connection;
        // skip anything that is not our init.
        loop {
            let msg: ServerMsg = conn.recv().await.context("await init")?;
            match msg {
                ServerMsg::Init(init) => {
                    info!(client_id = %init.id, players = init.snapshot.players.len(), "Joined session");
                    let mut roster = Roster::new();
                    roster.apply(&ServerMsg::Init(init.clone()));
                    return Ok(Self {
                        client_id: init.id,
                        roster,
                        conn,
                    });
                }
                other => debug!(?other, "Event before init"),
            }
        }
    }

    /// Reports this client's new pose, optionally recoloring.
    pub async fn send_move(
        &mut self,
        x: f32,
        z: f32,
        rotation: f32,
        color: Option<Color>,
    ) -> anyhow::Result<()> {
        self.conn
            .send(&ClientMsg::Move(MoveData {
                x,
                z,
                rotation,
                color,
            }))
            .await
    }

    /// Requests creation of this client's egg. The server ignores repeats.
    pub async fn send_create_egg(&mut self, x: f32, z: f32, rotation: f32) -> anyhow::Result<()> {
        self.conn
            .send(&ClientMsg::CreateEgg(EggState { x, z, rotation }))
            .await
    }

    pub async fn send_key_down(&mut self, key: &str) -> anyhow::Result<()> {
        self.conn
            .send(&ClientMsg::KeyDown { key: key.into() })
            .await
    }

    pub async fn send_key_up(&mut self, key: &str) -> anyhow::Result<()> {
        self.conn.send(&ClientMsg::KeyUp { key: key.into() }).await
    }

    pub async fn start_audio(&mut self) -> anyhow::Result<()> {
        self.conn.send(&ClientMsg::StartAudio).await
    }

    pub async fn stop_audio(&mut self) -> anyhow::Result<()> {
        self.conn.send(&ClientMsg::StopAudio).await
    }

    /// Sends an opaque audio payload for the relay to forward verbatim.
    pub async fn send_audio_stream(&mut self, data: serde_json::Value) -> anyhow::Result<()> {
        self.conn.send(&ClientMsg::AudioStream(data)).await
    }

    /// Receives the next server event and applies it to the roster.
    pub async fn recv_event(&mut self) -> anyhow::Result<ServerMsg> {
        let msg: ServerMsg = self.conn.recv().await?;
        self.roster.apply(&msg);
        Ok(msg)
    }

    /// Like [`recv_event`](Self::recv_event) but returns `None` on timeout.
    pub async fn recv_event_timeout(
        &mut self,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Option<ServerMsg>> {
        match self.conn.recv_timeout::<ServerMsg>(timeout).await? {
            Some(msg) => {
                self.roster.apply(&msg);
                Ok(Some(msg))
            }
            None => Ok(None),
        }
    }

    /// Returns the relay's address.
    pub fn server_peer(&self) -> anyhow::Result<SocketAddr> {
        self.conn.peer_addr()
    }
}
