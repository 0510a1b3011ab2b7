use anyhow::Context;
use clap::{Parser, Subcommand};
use gossip_membership::membership::config::ProtocolConfig;
use gossip_membership::membership::types::Endpoint;
use gossip_membership::node::handlers;
use gossip_membership::node::service::NodeService;
use gossip_membership::node::types::NodeOptions;
use gossip_membership::simulation::driver::Simulation;
use gossip_membership::simulation::types::{SimulationConfig, SimulationReport};
use gossip_membership::transport::udp::AddressPlan;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a whole group in-process over an emulated network
    Simulate {
        /// JSON file with a simulation config; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        nodes: Option<usize>,
        #[arg(long)]
        ticks: Option<i64>,
        /// Tick at which nodes crash
        #[arg(long)]
        crash_at: Option<i64>,
        #[arg(long)]
        crash_count: Option<usize>,
        /// Message loss probability
        #[arg(long)]
        drop: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
        /// Write the full report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Run one node over UDP
    Node {
        /// Node id; 1 is the introducer
        #[arg(long)]
        id: i32,
        /// Logical port carried in messages
        #[arg(long, default_value_t = 0)]
        port: i16,
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        /// Node `id` listens on base-port + id
        #[arg(long, default_value_t = 7000)]
        base_port: u16,
        #[arg(long, default_value_t = 200)]
        tick_ms: u64,
        /// Serve the status API on this address
        #[arg(long)]
        http: Option<SocketAddr>,
        /// JSON file with protocol settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Commands::Simulate {
            config,
            nodes,
            ticks,
            crash_at,
            crash_count,
            drop,
            seed,
            report,
        } => {
            let mut sim_config = match config {
                Some(path) => SimulationConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => SimulationConfig::default(),
            };
            if let Some(nodes) = nodes {
                sim_config.nodes = nodes;
            }
            if let Some(ticks) = ticks {
                sim_config.total_ticks = ticks;
            }
            if crash_at.is_some() {
                sim_config.crash_at = crash_at;
            }
            if let Some(count) = crash_count {
                sim_config.crash_count = count;
            }
            if let Some(drop) = drop {
                sim_config.drop_probability = drop;
            }
            if let Some(seed) = seed {
                sim_config.seed = seed;
            }

            let outcome = Simulation::new(sim_config)?.run()?;
            summarize(&outcome);

            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&outcome)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?;
                tracing::info!("Report written to {}", path.display());
            }
        }

        Commands::Node {
            id,
            port,
            host,
            base_port,
            tick_ms,
            http,
            config,
        } => {
            let protocol = match config {
                Some(path) => ProtocolConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => ProtocolConfig::default(),
            };

            let mut options =
                NodeOptions::new(Endpoint::new(id, port), AddressPlan::new(host, base_port));
            options.tick_interval = Duration::from_millis(tick_ms.max(1));
            options.protocol = protocol;

            let service = NodeService::bind(options)?;
            tracing::info!("Node {} listening on {}", id, service.local_addr());

            if let Some(addr) = http {
                let snapshots = service.subscribe();
                tokio::spawn(async move {
                    if let Err(e) = handlers::serve(addr, snapshots).await {
                        tracing::error!("Status API stopped: {}", e);
                    }
                });
            }

            tracing::info!("Press Ctrl+C to shutdown");
            service
                .run(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
    }

    Ok(())
}

fn summarize(report: &SimulationReport) {
    tracing::info!(
        "{} ticks, {} live nodes, {} crashed, {} messages ({} dropped)",
        report.ticks,
        report.live().count(),
        report.crashed.len(),
        report.messages_sent,
        report.messages_dropped
    );

    for node in &report.nodes {
        tracing::info!(
            "  - {} {:?} heartbeat={} table={}",
            node.endpoint,
            node.state,
            node.heartbeat,
            node.table.len()
        );
    }

    for crashed in &report.crashed {
        tracing::info!(
            "Crashed {} removed by {} node(s)",
            crashed,
            report.removals_of(crashed).len()
        );
    }
    tracing::info!(
        "Failures detected: {}, group complete: {}",
        report.failures_detected(),
        report.is_complete()
    );
}
