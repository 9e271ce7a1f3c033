//! The shuffle — all-to-all exchange of records between nodes.
//!
//! Every producer (one handler per inbound peer connection, plus the local
//! sender's fast path) feeds a single bounded queue of [`Ingest`] items.
//! The [`tracker::CompletionTracker`] is the only consumer and the only owner
//! of the records collected for output.

pub mod receiver;
pub mod sender;
pub mod tracker;

use netsort_core::{NodeId, Record};
use tokio::sync::mpsc;

pub use receiver::ShuffleReceiver;
pub use sender::{SendSummary, ShuffleSender};
pub use tracker::{CompletionTracker, OwnedSet};

/// One item on the ingest queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingest {
    /// A record from the local input that this node owns.
    Kept(Record),
    /// A record owned by this node, received from a peer.
    Received(Record),
    /// A peer has sent its last record to this node.
    PeerDone(NodeId),
    /// The local sender has classified its whole input.
    LocalSendComplete,
}

pub type IngestTx = mpsc::Sender<Ingest>;
pub type IngestRx = mpsc::Receiver<Ingest>;

/// Bounded ingest queue. Producers wait for capacity; nothing is dropped.
pub fn ingest_queue(capacity: usize) -> (IngestTx, IngestRx) {
    mpsc::channel(capacity)
}
