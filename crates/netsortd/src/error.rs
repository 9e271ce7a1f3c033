//! Errors surfaced by a node run.

use std::path::PathBuf;

use netsort_core::{ConfigError, NodeId};

#[derive(Debug, thiserror::Error)]
pub enum ShuffleError {
    #[error("invalid cluster configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to node {peer} at {addr} after {attempts} attempts: {source}")]
    Dial {
        peer: NodeId,
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("write to node {peer} failed: {source}")]
    PeerWrite {
        peer: NodeId,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record rejected by frame codec: {0}")]
    Wire(#[from] netsort_core::WireError),

    #[error("ingest queue closed before the shuffle completed")]
    QueueClosed,

    #[error("sender task failed: {0}")]
    SenderTask(#[from] tokio::task::JoinError),
}

pub type Result<T, E = ShuffleError> = std::result::Result<T, E>;
