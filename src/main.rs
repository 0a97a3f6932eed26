//! cluster-balancer operator CLI.
//!
//! ```text
//! check-keys <TEXT>     parse a placement preference, print its tiers
//! parse-url <URL>       print the config derived from a connection URL
//! simulate              run the connection factory against an in-memory cluster
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::json;

use cluster_balancer::config::{load_config, parse_connection_url, ObservabilityConfig};
use cluster_balancer::load_balancer::BalancerRegistry;
use cluster_balancer::net::memory::{MemoryCluster, MemoryNode};
use cluster_balancer::observability::{logging, metrics};
use cluster_balancer::{BalancerError, ConnectMode, ConnectionFactory, PlacementPreference};

#[derive(Parser)]
#[command(name = "cluster-balancer")]
#[command(about = "Inspect and simulate cluster connection balancing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse topology keys and print the preference tiers
    CheckKeys {
        /// e.g. "aws.us-west.us-west-2a:1,aws.us-west.*:2"
        text: String,
    },
    /// Print the balancer config derived from a connection URL
    ParseUrl { url: String },
    /// Open connections against a simulated cluster and print the balancer state
    Simulate {
        /// Balancer config (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Cluster description with [[nodes]] entries (TOML)
        #[arg(short, long)]
        topology: PathBuf,

        /// Number of connections to open
        #[arg(short = 'n', long, default_value_t = 10)]
        connections: usize,

        /// Open all connections concurrently
        #[arg(long)]
        concurrent: bool,

        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },
}

#[derive(Deserialize)]
struct TopologyFile {
    nodes: Vec<MemoryNode>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckKeys { text } => {
            logging::init_logging(&ObservabilityConfig::default())?;
            let preference = PlacementPreference::parse(&text)?;
            let tiers: Vec<_> = preference
                .tiers()
                .map(|(rank, patterns)| {
                    json!({
                        "rank": rank,
                        "patterns": patterns.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "tiers": tiers }))?);
        }
        Commands::ParseUrl { url } => {
            logging::init_logging(&ObservabilityConfig::default())?;
            let config = parse_connection_url(&url)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Simulate {
            config,
            topology,
            connections,
            concurrent,
            metrics: show_metrics,
        } => {
            let config = load_config(&config)?;
            logging::init_logging(&config.observability)?;
            let handle = if show_metrics || config.observability.metrics_enabled {
                Some(metrics::install_recorder()?)
            } else {
                None
            };

            let topology: TopologyFile = toml::from_str(&std::fs::read_to_string(&topology)?)?;
            tracing::info!(nodes = topology.nodes.len(), "Simulated cluster loaded");
            let cluster = Arc::new(MemoryCluster::new(topology.nodes));

            let registry = BalancerRegistry::new();
            let factory = ConnectionFactory::new(Arc::clone(&cluster), &config, &registry)?;

            let results = if concurrent {
                join_all((0..connections).map(|_| factory.connect())).await
            } else {
                let mut results = Vec::with_capacity(connections);
                for _ in 0..connections {
                    results.push(factory.connect().await);
                }
                results
            };

            let mut open = Vec::new();
            let mut failures: Vec<String> = Vec::new();
            for result in results {
                match result {
                    Ok(conn) => open.push(conn),
                    Err(e) => failures.push(e.to_string()),
                }
            }

            let report = json!({
                "opened": open.len(),
                "failed": failures,
                "single_host": open.iter().filter(|c| c.mode() == ConnectMode::SingleHost).count(),
                "balancer": factory.balancer().map(|b| b.snapshot()),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);

            for conn in open {
                conn.close().await?;
            }
            factory.shutdown().await;

            if let Some(handle) = handle {
                println!("{}", handle.render());
            }
            if !failures.is_empty() {
                return Err(BalancerError::cluster_unavailable(format!(
                    "{} of {} connections failed",
                    failures.len(),
                    connections
                ))
                .into());
            }
        }
    }

    Ok(())
}
