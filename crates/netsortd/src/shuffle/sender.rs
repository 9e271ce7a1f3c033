//! Outbound side of the shuffle.
//!
//! Holds one persistent connection per peer, classifies every local record
//! by owner, and finishes each link with a single `Done` frame.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use netsort_core::{
    ClusterView, ConfigError, Endpoint, FrameCodec, NodeId, Record, ShuffleSettings,
};

use super::{Ingest, IngestTx};
use crate::error::{Result, ShuffleError};
use crate::input::RecordReader;

/// Per-run counters reported by the sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendSummary {
    pub records_read: u64,
    pub kept: u64,
    /// Records written to each peer, by node id.
    pub sent: BTreeMap<NodeId, u64>,
}

impl SendSummary {
    pub fn total_sent(&self) -> u64 {
        self.sent.values().sum()
    }
}

/// One outbound peer connection.
struct PeerLink<W> {
    peer: NodeId,
    writer: BufWriter<W>,
    frame: BytesMut,
    sent: u64,
}

impl<W: AsyncWrite + Unpin> PeerLink<W> {
    fn new(peer: NodeId, stream: W, frame_len: usize) -> Self {
        Self {
            peer,
            writer: BufWriter::new(stream),
            frame: BytesMut::with_capacity(frame_len),
            sent: 0,
        }
    }

    async fn send_record(&mut self, codec: &FrameCodec, record: &Record) -> Result<()> {
        self.frame.clear();
        codec.encode_data(record, &mut self.frame)?;
        self.write_frame().await?;
        self.sent += 1;
        Ok(())
    }

    /// Write `Done`, flush and close the write half. Last thing on the link.
    async fn finish(&mut self, codec: &FrameCodec, self_id: NodeId) -> Result<()> {
        self.frame.clear();
        codec.encode_done(self_id, &mut self.frame);
        self.write_frame().await?;
        self.writer
            .shutdown()
            .await
            .map_err(|source| ShuffleError::PeerWrite {
                peer: self.peer,
                source,
            })
    }

    async fn write_frame(&mut self) -> Result<()> {
        self.writer
            .write_all(&self.frame)
            .await
            .map_err(|source| ShuffleError::PeerWrite {
                peer: self.peer,
                source,
            })
    }
}

pub struct ShuffleSender {
    self_id: NodeId,
    cluster: Arc<ClusterView>,
    codec: FrameCodec,
    settings: ShuffleSettings,
    queue: IngestTx,
}

impl ShuffleSender {
    pub fn new(
        self_id: NodeId,
        cluster: Arc<ClusterView>,
        codec: FrameCodec,
        settings: ShuffleSettings,
        queue: IngestTx,
    ) -> Self {
        Self {
            self_id,
            cluster,
            codec,
            settings,
            queue,
        }
    }

    /// Dial every peer, then stream `input` through the partitioner.
    pub async fn run<R: AsyncRead + Unpin>(self, input: RecordReader<R>) -> Result<SendSummary> {
        let mut links = Vec::with_capacity(self.cluster.peer_count());
        for (peer, endpoint) in self.cluster.peers(self.self_id) {
            let stream = dial(peer, endpoint, &self.settings).await?;
            links.push(PeerLink::new(peer, stream, self.codec.frame_len()));
        }
        tracing::info!(peers = links.len(), "connected to all peers");

        self.stream(input, links).await
    }

    /// Classify and forward every record, then close every link.
    /// `links` must hold exactly one entry per peer.
    async fn stream<R, W>(
        &self,
        mut input: RecordReader<R>,
        mut links: Vec<PeerLink<W>>,
    ) -> Result<SendSummary>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let partitioner = self.cluster.partitioner();
        let key_len = self.codec.layout().key_len;
        let mut summary = SendSummary::default();

        while let Some(record) = input.next_record().await? {
            let owner = partitioner.owner(&record);
            if owner == self.self_id {
                summary.kept += 1;
                self.enqueue(Ingest::Kept(record)).await?;
                continue;
            }

            tracing::trace!(owner, key = %record.key_hex(key_len), "forwarding record");
            let link = links
                .iter_mut()
                .find(|l| l.peer == owner)
                .ok_or_else(|| ConfigError::UnknownServer(u32::from(owner)))?;
            link.send_record(&self.codec, &record).await?;
        }
        summary.records_read = input.records_read();

        for link in &mut links {
            link.finish(&self.codec, self.self_id).await?;
            summary.sent.insert(link.peer, link.sent);
            tracing::debug!(peer = link.peer, records = link.sent, "link finished");
        }

        self.enqueue(Ingest::LocalSendComplete).await?;
        tracing::info!(
            records_read = summary.records_read,
            kept = summary.kept,
            sent = summary.total_sent(),
            "local send complete"
        );
        Ok(summary)
    }

    async fn enqueue(&self, item: Ingest) -> Result<()> {
        self.queue
            .send(item)
            .await
            .map_err(|_| ShuffleError::QueueClosed)
    }
}

/// Connect to a peer, retrying with exponential backoff while it comes up.
pub async fn dial(
    peer: NodeId,
    endpoint: &Endpoint,
    settings: &ShuffleSettings,
) -> Result<TcpStream> {
    let attempts = settings.dial_attempts.max(1);
    let max_delay = Duration::from_millis(settings.max_dial_backoff_ms);
    let mut delay = Duration::from_millis(settings.dial_backoff_ms);
    let mut attempt = 1;

    loop {
        match TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await {
            Ok(stream) => {
                tracing::debug!(peer, addr = %endpoint, attempt, "connected to peer");
                return Ok(stream);
            }
            Err(source) if attempt >= attempts => {
                return Err(ShuffleError::Dial {
                    peer,
                    addr: endpoint.to_string(),
                    attempts,
                    source,
                });
            }
            Err(e) => {
                tracing::debug!(
                    peer,
                    addr = %endpoint,
                    attempt,
                    error = %e,
                    "peer not reachable yet, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(max_delay);
                attempt += 1;
            }
        }
    }
}
