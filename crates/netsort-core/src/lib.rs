//! netsort-core — shared types, wire format, and cluster configuration.
//! The node daemon and the integration tests depend on this crate.

pub mod config;
pub mod partition;
pub mod record;
pub mod wire;

pub use config::{ClusterConfig, ClusterView, ConfigError, Endpoint, ShuffleSettings};
pub use partition::Partitioner;
pub use record::{Record, RecordLayout};
pub use wire::{Frame, FrameCodec, WireError};

/// Node identity. Clusters hold at most 256 nodes, and the `Done` frame
/// carries the sender id in a single byte.
pub type NodeId = u8;
