//! One participant of a sort run: wires the receiver, sender, tracker and
//! emitter together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use netsort_core::{
    ClusterConfig, ClusterView, ConfigError, FrameCodec, NodeId, RecordLayout, ShuffleSettings,
};

use crate::emit::sort_and_emit;
use crate::error::Result;
use crate::input::RecordReader;
use crate::shuffle::{
    ingest_queue, CompletionTracker, SendSummary, ShuffleReceiver, ShuffleSender,
};

/// The accept loop runs until its node is done with it, on every exit path.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Outcome of a completed run on one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub node: NodeId,
    pub send: SendSummary,
    /// Records that arrived from peers.
    pub received: u64,
    /// Records written to the output file.
    pub written: u64,
}

pub struct Node {
    id: NodeId,
    cluster: Arc<ClusterView>,
    layout: RecordLayout,
    settings: ShuffleSettings,
    /// `None` for a single-node cluster, which never touches the network.
    listener: Option<TcpListener>,
}

impl Node {
    /// Validate `config` and bind this node's endpoint.
    pub async fn bind(id: u32, config: &ClusterConfig) -> Result<Self> {
        let mut node = Self::unbound(id, config)?;
        if node.cluster.len() > 1 {
            let endpoint = node
                .cluster
                .endpoint(node.id)
                .ok_or(ConfigError::UnknownServer(id))?;
            node.listener = Some(ShuffleReceiver::bind(endpoint).await?);
        }
        Ok(node)
    }

    /// Use an already-bound listener instead of binding the configured endpoint.
    pub fn with_listener(id: u32, config: &ClusterConfig, listener: TcpListener) -> Result<Self> {
        let mut node = Self::unbound(id, config)?;
        if node.cluster.len() > 1 {
            node.listener = Some(listener);
        }
        Ok(node)
    }

    fn unbound(id: u32, config: &ClusterConfig) -> Result<Self> {
        let cluster = config.cluster_view()?;
        let id = config.node_id(id)?;
        Ok(Self {
            id,
            cluster: Arc::new(cluster),
            layout: config.records,
            settings: config.shuffle.clone(),
            listener: None,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Shuffle `input` across the cluster and write this node's sorted
    /// partition to `output`.
    pub async fn run(self, input: &Path, output: &Path) -> Result<NodeReport> {
        tracing::info!(
            node = self.id,
            nodes = self.cluster.len(),
            partition_bits = self.cluster.partitioner().bits(),
            "node starting"
        );

        let codec = FrameCodec::new(self.layout);
        let reader = RecordReader::open(input, self.layout).await?;
        let (tx, mut rx) = ingest_queue(self.settings.queue_capacity);

        let _receiver = self.listener.map(|listener| {
            AbortOnDrop(tokio::spawn(
                ShuffleReceiver::new(listener, codec, tx.clone()).run(),
            ))
        });

        if self.settings.startup_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.startup_delay_ms)).await;
        }

        let sender = ShuffleSender::new(self.id, self.cluster.clone(), codec, self.settings, tx);
        let mut sender_task = tokio::spawn(sender.run(reader));

        // Watch the sender while ingesting so that a failed dial or write
        // ends the run instead of leaving the tracker waiting forever.
        let tracker = CompletionTracker::new(self.id, self.cluster.len());
        let ingest = tracker.run(&mut rx);
        tokio::pin!(ingest);

        let mut send_summary = None;
        let owned = loop {
            tokio::select! {
                owned = &mut ingest => break owned,
                joined = &mut sender_task, if send_summary.is_none() => {
                    send_summary = Some(joined??);
                }
            }
        };

        let owned = owned?;
        let send = match send_summary {
            Some(summary) => summary,
            None => sender_task.await??,
        };
        let received = owned.received();

        let written = sort_and_emit(owned, &self.layout, output).await?;
        Ok(NodeReport {
            node: self.id,
            send,
            received,
            written,
        })
    }
}
