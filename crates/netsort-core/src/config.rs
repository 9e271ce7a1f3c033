//! Cluster configuration for netsort.
//!
//! Resolution order: cluster descriptor file → environment overrides → defaults.
//!
//! The descriptor lists every node plus optional `records` and `shuffle`
//! tables. `.yaml`/`.yml` files are read as YAML (the `servers:` list with
//! `serverId`/`host`/`port`, ports as strings or integers); anything else is
//! read as TOML. Every node of a run must load the same
//! descriptor; nothing checks that across the network.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::partition::Partitioner;
use crate::record::RecordLayout;
use crate::NodeId;

/// Top-level cluster descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub records: RecordLayout,
    pub shuffle: ShuffleSettings,
    pub servers: Vec<ServerEntry>,
}

/// One node of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    #[serde(alias = "serverId")]
    pub server_id: u32,
    pub host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
}

/// Ports appear as integers in TOML and as quoted strings in YAML descriptors.
fn deserialize_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {text:?}"))),
    }
}

/// Largest accepted ingest queue. Records are held in memory while queued,
/// and the channel itself refuses capacities near `usize::MAX`.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuffleSettings {
    /// Capacity of the ingest queue. Producers wait when it is full.
    pub queue_capacity: usize,
    /// Connection attempts per peer before the run is aborted.
    pub dial_attempts: u32,
    /// Delay before the second attempt; doubles on each retry.
    pub dial_backoff_ms: u64,
    /// Upper bound on the retry delay.
    pub max_dial_backoff_ms: u64,
    /// Pause between starting the listener and dialing peers. 0 = none.
    pub startup_delay_ms: u64,
}

impl Default for ShuffleSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            dial_attempts: 20,
            dial_backoff_ms: 50,
            max_dial_backoff_ms: 2000,
            startup_delay_ms: 0,
        }
    }
}

// ── Cluster view ──────────────────────────────────────────────────────────────

/// Network endpoint of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Validated node table. Index `i` is the endpoint of node `i`.
#[derive(Debug, Clone)]
pub struct ClusterView {
    endpoints: Vec<Endpoint>,
    partitioner: Partitioner,
}

impl ClusterView {
    /// Build from endpoints already ordered by node id.
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, ConfigError> {
        let partitioner = Partitioner::new(endpoints.len())?;
        Ok(Self {
            endpoints,
            partitioner,
        })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    pub fn endpoint(&self, id: NodeId) -> Option<&Endpoint> {
        self.endpoints.get(id as usize)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        (id as usize) < self.endpoints.len()
    }

    /// Every node except `self_id`, in id order.
    pub fn peers(&self, self_id: NodeId) -> impl Iterator<Item = (NodeId, &Endpoint)> {
        self.endpoints
            .iter()
            .enumerate()
            .map(|(i, e)| (i as NodeId, e))
            .filter(move |(id, _)| *id != self_id)
    }

    /// Number of remote peers, `M - 1`.
    pub fn peer_count(&self) -> usize {
        self.endpoints.len() - 1
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to parse {0}: {1}")]
    ParseYamlFailed(PathBuf, serde_yaml::Error),
    #[error("cluster has no servers")]
    EmptyCluster,
    #[error("cluster size {0} is not a power of two")]
    NotPowerOfTwo(usize),
    #[error("cluster size {0} exceeds the 256 nodes a key byte can address")]
    TooManyNodes(usize),
    #[error("server id {0} appears more than once")]
    DuplicateServer(u32),
    #[error("server ids must be 0..{count}, found {id}")]
    NonContiguousIds { id: u32, count: usize },
    #[error("server id {0} is not in the cluster")]
    UnknownServer(u32),
    #[error("invalid record layout: key_len {key_len}, record_len {record_len}")]
    InvalidLayout { key_len: usize, record_len: usize },
    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,
    #[error("queue_capacity {0} exceeds the maximum of {max}", max = MAX_QUEUE_CAPACITY)]
    QueueCapacityTooLarge(usize),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ClusterConfig {
    /// Load a descriptor from disk and apply NETSORT_* env overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let mut config: ClusterConfig = if is_yaml(path) {
            serde_yaml::from_str(&text)
                .map_err(|e| ConfigError::ParseYamlFailed(path.to_path_buf(), e))?
        } else {
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply NETSORT_* env var overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("NETSORT_SHUFFLE__QUEUE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.shuffle.queue_capacity = v;
        }
        if let Some(v) = lookup("NETSORT_SHUFFLE__DIAL_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.shuffle.dial_attempts = v;
        }
        if let Some(v) = lookup("NETSORT_SHUFFLE__DIAL_BACKOFF_MS").and_then(|v| v.parse().ok()) {
            self.shuffle.dial_backoff_ms = v;
        }
        if let Some(v) =
            lookup("NETSORT_SHUFFLE__MAX_DIAL_BACKOFF_MS").and_then(|v| v.parse().ok())
        {
            self.shuffle.max_dial_backoff_ms = v;
        }
        if let Some(v) = lookup("NETSORT_SHUFFLE__STARTUP_DELAY_MS").and_then(|v| v.parse().ok())
        {
            self.shuffle.startup_delay_ms = v;
        }
    }

    /// Validate the descriptor and resolve it into a node table.
    pub fn cluster_view(&self) -> Result<ClusterView, ConfigError> {
        if !self.records.is_valid() {
            return Err(ConfigError::InvalidLayout {
                key_len: self.records.key_len,
                record_len: self.records.record_len,
            });
        }
        if self.shuffle.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.shuffle.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::QueueCapacityTooLarge(
                self.shuffle.queue_capacity,
            ));
        }
        if self.servers.is_empty() {
            return Err(ConfigError::EmptyCluster);
        }

        let count = self.servers.len();
        let mut slots: Vec<Option<Endpoint>> = vec![None; count];
        for server in &self.servers {
            let slot = slots
                .get_mut(server.server_id as usize)
                .ok_or(ConfigError::NonContiguousIds {
                    id: server.server_id,
                    count,
                })?;
            if slot.is_some() {
                return Err(ConfigError::DuplicateServer(server.server_id));
            }
            *slot = Some(Endpoint::new(server.host.clone(), server.port));
        }

        // Every id is below `count` and none repeats, so every slot is filled.
        let endpoints = slots.into_iter().flatten().collect();
        ClusterView::new(endpoints)
    }

    /// Check that `id` names a node of this cluster.
    pub fn node_id(&self, id: u32) -> Result<NodeId, ConfigError> {
        self.servers
            .iter()
            .any(|s| s.server_id == id)
            .then_some(id)
            .and_then(|id| NodeId::try_from(id).ok())
            .ok_or(ConfigError::UnknownServer(id))
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}
