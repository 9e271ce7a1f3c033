//! Completion tracking — decides when the shuffle is over.
//!
//! The shuffle is complete exactly when every remote peer has sent `Done`
//! and the local sender has finished its pass. Record counts and timeouts
//! are never used as a substitute.

use netsort_core::{NodeId, Record, RecordLayout};

use super::{Ingest, IngestRx};
use crate::error::{Result, ShuffleError};

/// Records held for output, in arrival order.
#[derive(Debug, Default)]
pub struct OwnedSet {
    records: Vec<Record>,
    received: u64,
}

impl OwnedSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records that arrived over the network rather than from local input.
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consume the set, returning records sorted by key ascending.
    /// The sort is stable: equal keys keep their arrival order.
    ///
    /// Arrival order across different peer connections is not fixed, so
    /// records with equal keys but different payloads may come out in a
    /// different order from one run to the next. Output is byte-identical
    /// across runs only when equal keys carry equal payloads.
    pub fn into_sorted(self, layout: &RecordLayout) -> Vec<Record> {
        let mut records = self.records;
        records.sort_by(|a, b| layout.compare(a, b));
        records
    }
}

/// What an observed item did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Pending,
    Complete,
}

pub struct CompletionTracker {
    self_id: NodeId,
    /// `done[id]` is set once node `id` has sent `Done`.
    done: Vec<bool>,
    done_count: usize,
    local_complete: bool,
    owned: OwnedSet,
}

impl CompletionTracker {
    pub fn new(self_id: NodeId, nodes: usize) -> Self {
        Self {
            self_id,
            done: vec![false; nodes],
            done_count: 0,
            local_complete: false,
            owned: OwnedSet::default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.local_complete && self.done_count + 1 == self.done.len()
    }

    pub fn peers_done(&self) -> usize {
        self.done_count
    }

    pub fn local_complete(&self) -> bool {
        self.local_complete
    }

    pub fn owned(&self) -> &OwnedSet {
        &self.owned
    }

    /// Seal and hand over the collected records.
    pub fn into_owned(self) -> OwnedSet {
        self.owned
    }

    /// Fold one queue item into the tracker state.
    pub fn observe(&mut self, item: Ingest) -> Progress {
        match item {
            Ingest::Kept(record) => self.owned.records.push(record),
            Ingest::Received(record) => {
                self.owned.records.push(record);
                self.owned.received += 1;
            }
            Ingest::PeerDone(peer) => self.mark_peer_done(peer),
            Ingest::LocalSendComplete => {
                self.local_complete = true;
                tracing::debug!(peers_done = self.done_count, "local send complete");
            }
        }

        if self.is_complete() {
            Progress::Complete
        } else {
            Progress::Pending
        }
    }

    fn mark_peer_done(&mut self, peer: NodeId) {
        if peer == self.self_id {
            tracing::warn!(peer, "done signal carries our own id, ignoring");
            return;
        }
        match self.done.get_mut(peer as usize) {
            None => tracing::warn!(peer, "done signal from unknown node, ignoring"),
            Some(true) => tracing::warn!(peer, "duplicate done signal, ignoring"),
            Some(flag) => {
                *flag = true;
                self.done_count += 1;
                tracing::debug!(
                    peer,
                    peers_done = self.done_count,
                    peers = self.done.len() - 1,
                    "peer finished sending"
                );
            }
        }
    }

    /// Drain the queue until the shuffle is complete, then seal the set.
    pub async fn run(mut self, rx: &mut IngestRx) -> Result<OwnedSet> {
        while !self.is_complete() {
            let item = rx.recv().await.ok_or(ShuffleError::QueueClosed)?;
            self.observe(item);
        }
        tracing::info!(
            records = self.owned.len(),
            received = self.owned.received,
            "shuffle complete"
        );
        Ok(self.into_owned())
    }
}
