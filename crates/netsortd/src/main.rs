//! netsortd — distributed sort node.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use netsort_core::ClusterConfig;
use netsortd::Node;

#[derive(Parser, Debug)]
#[command(name = "netsortd", about = "Shuffle and sort one shard of a distributed dataset")]
struct Args {
    /// This node's server id in the cluster descriptor.
    server_id: u32,
    /// Flat file of fixed-length records to partition.
    input: PathBuf,
    /// Destination for this node's sorted partition.
    output: PathBuf,
    /// Cluster descriptor (TOML).
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::info!(server_id = args.server_id, "netsortd starting");

    let config = ClusterConfig::load(&args.config)
        .with_context(|| format!("failed to load cluster descriptor {}", args.config.display()))?;

    let node = Node::bind(args.server_id, &config)
        .await
        .context("failed to start node")?;
    if let Some(addr) = node.local_addr() {
        tracing::info!(%addr, "listening for peers");
    }

    let report = node
        .run(&args.input, &args.output)
        .await
        .context("sort run failed")?;

    tracing::info!(
        node = report.node,
        records_read = report.send.records_read,
        kept = report.send.kept,
        sent = report.send.total_sent(),
        received = report.received,
        written = report.written,
        "sort run finished"
    );
    Ok(())
}
