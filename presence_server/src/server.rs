//! Relay server implementation.
//!
//! One hub task owns the session registry and a map of outbound handles.
//! Per-connection reader tasks feed inbound events into the hub over a
//! channel; per-connection writer tasks drain an outbound channel onto the
//! socket. The hub never awaits a send: a stalled receiver backs up on its
//! own writer task without delaying anyone else, and a failed send to a dead
//! connection is ignored per recipient.
//!
//! The periodic snapshot broadcaster is a plain interval on the hub loop.
//! Each tick does exactly one snapshot-and-send; missed ticks are delayed,
//! never coalesced into bursts.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use presence_shared::config::{RelayConfig, SyncPolicy};
use presence_shared::net::{
    decode_from_bytes, ClientMsg, EventConn, EventListener, EventReader, EventWriter, ServerMsg,
};
use presence_shared::state::ClientId;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::registry::SessionRegistry;
use crate::router::{self, Addressing, Outbound};

/// Inbound notifications from a connection's reader task.
enum HubEvent {
    /// A decoded client event.
    Msg(ClientMsg),
    /// The connection is gone (EOF or transport error). Sent exactly once.
    Closed,
}

type OutboundTx = mpsc::UnboundedSender<ServerMsg>;

/// The relay server: transport listener plus the state-owning hub.
pub struct RelayServer {
    cfg: RelayConfig,
    listener: EventListener,
}

impl RelayServer {
    /// Binds the listen address. This is the only fatal error path in
    /// steady-state operation.
    pub async fn bind(cfg: RelayConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.listen_addr.parse().context("parse listen_addr")?;
        let listener = EventListener::bind(addr).await?;
        Ok(Self { cfg, listener })
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the hub loop forever: accepts connections, routes events, and
    /// drives the periodic snapshot broadcaster.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self { cfg, listener } = self;

        let mut registry = SessionRegistry::new();
        let mut conns: HashMap<ClientId, OutboundTx> = HashMap::new();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<(ClientId, HubEvent)>();

        let periodic = cfg.sync_policy == SyncPolicy::Incremental;
        let mut ticker = interval(Duration::from_secs_f64(1.0 / f64::from(cfg.tick_hz.max(1))));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((conn, peer)) => {
                        admit(&mut registry, &mut conns, &cfg, &events_tx, conn, peer);
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                Some((id, ev)) = events_rx.recv() => match ev {
                    HubEvent::Msg(msg) => {
                        let out = router::on_message(&mut registry, &cfg, id, msg);
                        deliver(&conns, out);
                    }
                    HubEvent::Closed => {
                        info!(client_id = %id, "Client disconnected");
                        conns.remove(&id);
                        let out = router::on_disconnect(&mut registry, &cfg, id);
                        deliver(&conns, out);
                    }
                },
                _ = ticker.tick(), if periodic => {
                    deliver(&conns, vec![router::on_tick(&registry)]);
                }
            }
        }
    }
}

fn admit(
    registry: &mut SessionRegistry,
    conns: &mut HashMap<ClientId, OutboundTx>,
    cfg: &RelayConfig,
    events_tx: &mpsc::UnboundedSender<(ClientId, HubEvent)>,
    conn: EventConn,
    peer: SocketAddr,
) {
    let id = ClientId::new_unique();
    info!(client_id = %id, %peer, "Client connected");

    let (reader, writer) = conn.into_split();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    tokio::spawn(write_loop(writer, out_rx));
    tokio::spawn(read_loop(id, reader, events_tx.clone()));

    // The outbound handle must be in place before routing so the joiner's
    // own `init` has somewhere to land.
    conns.insert(id, out_tx);
    let out = router::on_connect(registry, cfg, id);
    deliver(conns, out);
}

/// Fans addressed messages out to their recipients. Sends are channel
/// pushes; a closed receiver is skipped and never aborts the loop.
fn deliver(conns: &HashMap<ClientId, OutboundTx>, outs: Vec<Outbound>) {
    for out in outs {
        match out.addressing {
            Addressing::To(id) => {
                if let Some(tx) = conns.get(&id) {
                    let _ = tx.send(out.msg);
                }
            }
            Addressing::Except(skip) => {
                for (id, tx) in conns {
                    if *id != skip {
                        let _ = tx.send(out.msg.clone());
                    }
                }
            }
            Addressing::All => {
                for tx in conns.values() {
                    let _ = tx.send(out.msg.clone());
                }
            }
        }
    }
}

/// Reads frames until the connection dies, then reports `Closed` exactly
/// once. A frame that fails to decode is dropped; the connection stays up.
async fn read_loop(
    id: ClientId,
    mut reader: EventReader,
    events_tx: mpsc::UnboundedSender<(ClientId, HubEvent)>,
) {
    loop {
        match reader.recv_frame().await {
            Ok(frame) => match decode_from_bytes::<ClientMsg>(&frame) {
                Ok(msg) => {
                    if events_tx.send((id, HubEvent::Msg(msg))).is_err() {
                        return;
                    }
                }
                Err(e) => debug!(client_id = %id, error = %e, "Dropping undecodable frame"),
            },
            Err(e) => {
                debug!(client_id = %id, error = %e, "Read loop ended");
                break;
            }
        }
    }
    let _ = events_tx.send((id, HubEvent::Closed));
}

/// Drains the outbound channel onto the socket. A write failure drops the
/// rest of the stream; the reader side reports the disconnect.
async fn write_loop(mut writer: EventWriter, mut out_rx: mpsc::UnboundedReceiver<ServerMsg>) {
    while let Some(msg) = out_rx.recv().await {
        if let Err(e) = writer.send(&msg).await {
            debug!(error = %e, "Write loop ended");
            break;
        }
    }
}

/// Helper for tests: bind to an ephemeral localhost port.
pub async fn bind_ephemeral(mut cfg: RelayConfig) -> anyhow::Result<(RelayServer, SocketAddr)> {
    cfg.listen_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).to_string();
    let server = RelayServer::bind(cfg).await?;
    let addr = server.local_addr()?;
    Ok((server, addr))
}
