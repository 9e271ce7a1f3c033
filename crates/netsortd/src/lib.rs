//! netsortd — one node of a distributed shuffle-sort.
//!
//! Each node reads its shard, forwards records to the peers that own them,
//! collects the records it owns, and writes them out sorted by key.

pub mod emit;
pub mod error;
pub mod input;
pub mod node;
pub mod shuffle;

pub use error::ShuffleError;
pub use node::{Node, NodeReport};
