use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use boundary_bridge::TcpInterface;
use boundary_daemon::config::NodeConfig;
use boundary_daemon::router::{BridgedCounters, CrossLink};
use clap::Parser;
use tokio::time::MissedTickBehavior;

/// Boundary node daemon: bridges a local mesh segment to a TCP backbone.
#[derive(Parser, Debug)]
#[command(name = "boundaryd", version, about)]
struct Args {
    /// Node configuration file
    #[arg(short, long, default_value = "boundary.toml")]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let node = NodeConfig::from_path(&args.config)
        .with_context(|| format!("load config {}", args.config.display()))?;
    anyhow::ensure!(node.has_interfaces(), "no interfaces configured");

    let now = Instant::now();
    let mut backbone = node.backbone.map(TcpInterface::new).transpose()?;
    let mut local = node.local.map(TcpInterface::new).transpose()?;

    if let Some(iface) = backbone.as_mut() {
        iface.start(now)?;
        log::info!("boundaryd: backbone interface up");
    }
    if let Some(iface) = local.as_mut() {
        iface.start(now)?;
        log::info!("boundaryd: local interface up");
    }

    let mut counters = BridgedCounters::default();
    let mut interval = tokio::time::interval(Duration::from_millis(node.poll_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let status_every = Duration::from_secs(node.status_secs);
    let mut last_status = Instant::now();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {
                let now = Instant::now();

                if let Some(iface) = backbone.as_mut() {
                    let mut link = CrossLink {
                        peer: local.as_mut(),
                        bridged: &mut counters.backbone_to_local,
                        repeat: false,
                    };
                    iface.tick(now, &mut link);
                }
                if let Some(iface) = local.as_mut() {
                    let mut link = CrossLink {
                        peer: backbone.as_mut(),
                        bridged: &mut counters.local_to_backbone,
                        repeat: true,
                    };
                    iface.tick(now, &mut link);
                }

                if now.duration_since(last_status) >= status_every {
                    last_status = now;
                    log::info!(
                        "boundaryd: backbone [{}] local [{}] bridged wan->lan {} lan->wan {}",
                        describe(backbone.as_ref()),
                        describe(local.as_ref()),
                        counters.backbone_to_local,
                        counters.local_to_backbone,
                    );
                }
            }
        }
    }

    log::info!("boundaryd: shutting down");
    if let Some(iface) = backbone.as_mut() {
        iface.stop();
    }
    if let Some(iface) = local.as_mut() {
        iface.stop();
    }

    Ok(())
}

fn describe(iface: Option<&TcpInterface>) -> String {
    match iface {
        Some(iface) => {
            let stats = iface.stats();
            format!(
                "{} clients, rx {}, tx {}, dropped {}",
                iface.client_count(),
                stats.rx_frames,
                stats.tx_frames,
                stats.oversize_dropped
            )
        }
        None => "disabled".to_string(),
    }
}
