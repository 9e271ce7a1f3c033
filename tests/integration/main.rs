//! netsort integration test harness.
//!
//! Every test builds a cluster of in-process nodes listening on loopback
//! ports chosen by the OS, writes one input shard per node into a temp
//! directory, runs all nodes concurrently and inspects the output files.
//! Nothing outside the temp directory is touched, so tests run in parallel.

mod shuffle;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tempfile::TempDir;
use tokio::net::TcpListener;

use netsort_core::config::ServerEntry;
use netsort_core::{ClusterConfig, Partitioner, RecordLayout};
use netsortd::{Node, NodeReport};

// ── Harness ───────────────────────────────────────────────────────────────────

/// Layout used by the compact scenarios: 1 key byte, 3 payload bytes.
pub const SMALL: RecordLayout = RecordLayout {
    key_len: 1,
    record_len: 4,
};

/// A cluster whose listeners are already bound, ready to run.
pub struct TestCluster {
    pub config: ClusterConfig,
    pub listeners: Vec<TcpListener>,
    pub dir: TempDir,
}

impl TestCluster {
    pub async fn new(nodes: usize, layout: RecordLayout) -> Result<Self> {
        let mut listeners = Vec::with_capacity(nodes);
        let mut servers = Vec::with_capacity(nodes);
        for id in 0..nodes {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            servers.push(ServerEntry {
                server_id: id as u32,
                host: "127.0.0.1".to_string(),
                port: listener.local_addr()?.port(),
            });
            listeners.push(listener);
        }

        let mut config = ClusterConfig {
            records: layout,
            servers,
            ..ClusterConfig::default()
        };
        config.shuffle.queue_capacity = 64;
        config.shuffle.dial_attempts = 10;
        config.shuffle.dial_backoff_ms = 10;

        Ok(Self {
            config,
            listeners,
            dir: tempfile::tempdir()?,
        })
    }

    pub fn input_path(&self, id: usize) -> PathBuf {
        self.dir.path().join(format!("input-{id}.bin"))
    }

    pub fn output_path(&self, id: usize) -> PathBuf {
        self.dir.path().join(format!("output-{id}.bin"))
    }

    /// Write the shards, run every node to completion, return reports and
    /// output bytes in node order.
    pub async fn run(self, shards: &[Vec<u8>]) -> Result<Vec<(NodeReport, Vec<u8>)>> {
        assert_eq!(shards.len(), self.listeners.len(), "one shard per node");
        for (id, shard) in shards.iter().enumerate() {
            std::fs::write(self.input_path(id), shard)?;
        }

        let mut tasks = Vec::new();
        for (id, listener) in self.listeners.into_iter().enumerate() {
            let node = Node::with_listener(id as u32, &self.config, listener)?;
            let input = self.dir.path().join(format!("input-{id}.bin"));
            let output = self.dir.path().join(format!("output-{id}.bin"));
            tasks.push(tokio::spawn(async move { node.run(&input, &output).await }));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for (id, task) in tasks.into_iter().enumerate() {
            let report = task
                .await?
                .with_context(|| format!("node {id} failed"))?;
            let output = std::fs::read(self.dir.path().join(format!("output-{id}.bin")))?;
            reports.push((report, output));
        }
        Ok(reports)
    }
}

/// Split a flat buffer into records of `layout`.
pub fn records(bytes: &[u8], layout: RecordLayout) -> Vec<&[u8]> {
    bytes.chunks_exact(layout.record_len).collect()
}

/// Deterministic pseudo-random records (xorshift64*), so failures reproduce.
pub fn generate(count: usize, layout: RecordLayout, seed: u64) -> Vec<u8> {
    let mut state = seed.max(1);
    let mut out = Vec::with_capacity(count * layout.record_len);
    for _ in 0..count * layout.record_len {
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        out.push((state.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 56) as u8);
    }
    out
}

/// Assert ownership and order for one node's output.
pub fn assert_owned_and_sorted(node: usize, output: &[u8], layout: RecordLayout, nodes: usize) {
    let partitioner = Partitioner::new(nodes).unwrap();
    let recs = records(output, layout);
    assert_eq!(output.len() % layout.record_len, 0, "node {node}: partial record in output");
    for r in &recs {
        assert_eq!(
            partitioner.owner_of_byte(r[0]) as usize,
            node,
            "node {node} holds a record it does not own: {r:02x?}"
        );
    }
    for pair in recs.windows(2) {
        assert!(
            pair[0][..layout.key_len] <= pair[1][..layout.key_len],
            "node {node}: keys out of order: {:02x?} then {:02x?}",
            pair[0],
            pair[1]
        );
    }
}

/// Sorted multiset of records, for conservation checks.
pub fn multiset(chunks: impl IntoIterator<Item = Vec<u8>>) -> Vec<Vec<u8>> {
    let mut all: Vec<Vec<u8>> = chunks.into_iter().collect();
    all.sort();
    all
}
