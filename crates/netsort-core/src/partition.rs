//! Range partitioning on the high bits of the first key byte.
//!
//! With `M = 2^b` nodes, node `n` owns every record whose first key byte has
//! `n` as its top `b` bits. Buckets are contiguous key ranges, so the
//! concatenation of node outputs in id order is globally sorted.

use crate::config::ConfigError;
use crate::record::Record;
use crate::NodeId;

/// Largest cluster a single key byte can address.
pub const MAX_NODES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    nodes: usize,
    bits: u32,
}

impl Partitioner {
    /// Build a partitioner for `nodes` nodes.
    /// Zero, non-power-of-two and over-256 sizes are configuration errors.
    pub fn new(nodes: usize) -> Result<Self, ConfigError> {
        if nodes == 0 {
            return Err(ConfigError::EmptyCluster);
        }
        if nodes > MAX_NODES {
            return Err(ConfigError::TooManyNodes(nodes));
        }
        if !nodes.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo(nodes));
        }
        Ok(Self {
            nodes,
            bits: nodes.trailing_zeros(),
        })
    }

    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// `log2(M)`.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Owner of a record with the given first key byte.
    pub fn owner_of_byte(&self, first: u8) -> NodeId {
        // Widened so that bits == 0 shifts by 8 without overflow.
        (u32::from(first) >> (8 - self.bits)) as NodeId
    }

    pub fn owner(&self, record: &Record) -> NodeId {
        self.owner_of_byte(record.first_byte())
    }
}
