//! Standalone client binary: a wander bot.
//!
//! Usage:
//!   cargo run -p presence_client -- [--addr 127.0.0.1:3000] [--rate-hz 10]
//!
//! Connects to a relay, walks a small random path, and logs the roster as
//! other participants come and go. Handy for eyeballing a running relay.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use presence_client::RelayClient;
use rand::Rng;
use tracing::info;

struct BotConfig {
    addr: String,
    rate_hz: u32,
}

fn parse_args() -> BotConfig {
    let mut cfg = BotConfig {
        addr: "127.0.0.1:3000".to_string(),
        rate_hz: 10,
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.addr = args[i + 1].clone();
                i += 2;
            }
            "--rate-hz" if i + 1 < args.len() => {
                cfg.rate_hz = args[i + 1].parse().unwrap_or(10);
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

    let cfg = parse_args();
    let addr: SocketAddr = cfg.addr.parse().context("parse --addr")?;

    let mut client = RelayClient::connect(addr).await.context("connect relay")?;
    info!(client_id = %client.client_id, %addr, "Bot connected");

    let step = Duration::from_secs_f64(1.0 / f64::from(cfg.rate_hz.max(1)));
    let (mut x, mut z, mut rotation) = (0.0f32, 0.0f32, 0.0f32);
    let mut seen = client.roster.len();

    loop {
        {
            let mut rng = rand::thread_rng();
            x += rng.gen_range(-0.2..0.2);
            z += rng.gen_range(-0.2..0.2);
            rotation += rng.gen_range(-0.1..0.1);
        }
        client.send_move(x, z, rotation, None).await?;

        // Drain whatever arrived during this step.
        while let Some(_msg) = client.recv_event_timeout(Duration::from_millis(1)).await? {}

        if client.roster.len() != seen {
            seen = client.roster.len();
            info!(players = seen, eggs = client.roster.eggs.len(), "Roster changed");
        }

        tokio::time::sleep(step).await;
    }
}
