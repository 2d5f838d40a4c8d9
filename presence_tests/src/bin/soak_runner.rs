//! Soak runner: spins up an ephemeral relay plus a handful of wander bots
//! and reports what everyone saw.
//!
//! Usage:
//!   cargo run -p presence_tests --bin soak_runner -- [bots] [seconds]
//!
//! Useful for watching fan-out behavior under sustained load without wiring
//! up real clients.

use std::time::Duration;

use presence_client::RelayClient;
use presence_server::server::bind_ephemeral;
use presence_shared::config::RelayConfig;
use presence_shared::net::ServerMsg;
use rand::Rng;

struct BotReport {
    deltas: usize,
    ticks: usize,
    echoes: usize,
    final_roster: usize,
}

async fn run_bot(
    addr: std::net::SocketAddr,
    duration: Duration,
    move_hz: u32,
) -> anyhow::Result<BotReport> {
    let mut client = RelayClient::connect(addr).await?;
    let me = client.client_id;

    let step = Duration::from_secs_f64(1.0 / f64::from(move_hz));
    let deadline = tokio::time::Instant::now() + duration;
    let (mut x, mut z) = (0.0f32, 0.0f32);

    let mut report = BotReport {
        deltas: 0,
        ticks: 0,
        echoes: 0,
        final_roster: 0,
    };

    while tokio::time::Instant::now() < deadline {
        {
            let mut rng = rand::thread_rng();
            x += rng.gen_range(-0.2..0.2);
            z += rng.gen_range(-0.2..0.2);
        }
        client.send_move(x, z, 0.0, None).await?;

        while let Some(msg) = client.recv_event_timeout(Duration::from_millis(1)).await? {
            match msg {
                ServerMsg::StateUpdate(presence_shared::net::StateUpdate::Delta {
                    id, ..
                }) => {
                    report.deltas += 1;
                    if id == me {
                        report.echoes += 1;
                    }
                }
                ServerMsg::StateUpdateAll(_) => report.ticks += 1,
                _ => {}
            }
        }

        tokio::time::sleep(step).await;
    }

    report.final_roster = client.roster.len();
    Ok(report)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let bots: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(4);
    let seconds: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);
    let duration = Duration::from_secs(seconds);

    println!("Relay soak: {bots} bots for {seconds}s");

    let (server, addr) = bind_ephemeral(RelayConfig::default()).await?;
    let server_task = tokio::spawn(server.run());

    let mut handles = Vec::new();
    for _ in 0..bots {
        handles.push(tokio::spawn(run_bot(addr, duration, 20)));
    }

    let mut total_echoes = 0;
    for (i, handle) in handles.into_iter().enumerate() {
        let report = handle.await??;
        println!(
            "bot {i}: deltas={} ticks={} echoes={} roster={}",
            report.deltas, report.ticks, report.echoes, report.final_roster
        );
        total_echoes += report.echoes;
    }

    server_task.abort();

    if total_echoes > 0 {
        anyhow::bail!("{total_echoes} self-echo deltas observed");
    }
    println!("OK: no self-echoes");
    Ok(())
}
