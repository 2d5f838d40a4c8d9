//! Standalone relay server binary.
//!
//! Usage:
//!   cargo run -p presence_server -- [--addr 0.0.0.0:3000] [--tick-hz 60]
//!       [--sync incremental|full_on_move] [--color server_random|client_supplied]
//!
//! The `PORT` environment variable overrides the listen port (default 3000).

use std::env;

use anyhow::Context;
use presence_server::server::RelayServer;
use presence_shared::config::{ColorSource, RelayConfig, SyncPolicy};
use tracing::info;

fn parse_args() -> RelayConfig {
    let mut cfg = RelayConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.listen_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(60);
                i += 2;
            }
            "--sync" if i + 1 < args.len() => {
                cfg.sync_policy = match args[i + 1].as_str() {
                    "full_on_move" => SyncPolicy::FullOnMove,
                    _ => SyncPolicy::Incremental,
                };
                i += 2;
            }
            "--color" if i + 1 < args.len() => {
                cfg.color_source = match args[i + 1].as_str() {
                    "client_supplied" => ColorSource::ClientSupplied,
                    _ => ColorSource::ServerRandom,
                };
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut cfg = parse_args();
    cfg.apply_port_env();

    info!(
        addr = %cfg.listen_addr,
        tick_hz = cfg.tick_hz,
        sync_policy = ?cfg.sync_policy,
        color_source = ?cfg.color_source,
        "Starting relay"
    );

    let server = RelayServer::bind(cfg).await.context("bind relay")?;
    let local = server.local_addr()?;
    info!(%local, "Relay listening");

    server.run().await
}
