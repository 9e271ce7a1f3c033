//! Fixed-length records.
//!
//! A record is `record_len` bytes. The first `key_len` bytes are the key,
//! compared as a big-endian unsigned integer; the rest is opaque payload.
//! Comparing two equal-length byte slices lexicographically gives the same
//! order as comparing them as big-endian integers, so keys are never decoded.

use std::cmp::Ordering;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

/// Key length of the reference record format.
pub const DEFAULT_KEY_LEN: usize = 10;

/// Total record length of the reference record format.
pub const DEFAULT_RECORD_LEN: usize = 100;

const_assert!(DEFAULT_KEY_LEN >= 1);
const_assert!(DEFAULT_KEY_LEN <= DEFAULT_RECORD_LEN);

/// Shape of every record in a run. Identical on all nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordLayout {
    /// Leading bytes that form the sort key.
    pub key_len: usize,
    /// Key plus payload.
    pub record_len: usize,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            key_len: DEFAULT_KEY_LEN,
            record_len: DEFAULT_RECORD_LEN,
        }
    }
}

impl RecordLayout {
    pub fn new(key_len: usize, record_len: usize) -> Self {
        Self {
            key_len,
            record_len,
        }
    }

    /// A layout is usable when the key is non-empty and fits in the record.
    pub fn is_valid(&self) -> bool {
        self.key_len >= 1 && self.key_len <= self.record_len
    }

    /// Bytes of one frame on the wire: control tag plus record.
    pub fn frame_len(&self) -> usize {
        1 + self.record_len
    }

    pub fn payload_len(&self) -> usize {
        self.record_len - self.key_len
    }

    /// Key-only ordering between two records of this layout.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        a.key(self.key_len).cmp(b.key(self.key_len))
    }
}

/// One raw record. Cheap to clone; the bytes are shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record(Bytes);

impl Record {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First key byte. Empty records are rejected before they reach the
    /// partitioner, so zero here only ever means a zero byte.
    pub fn first_byte(&self) -> u8 {
        self.0.first().copied().unwrap_or(0)
    }

    pub fn key(&self, key_len: usize) -> &[u8] {
        &self.0[..key_len.min(self.0.len())]
    }

    /// Hex rendering of the key, for log fields.
    pub fn key_hex(&self, key_len: usize) -> String {
        hex::encode(self.key(key_len))
    }
}

impl AsRef<[u8]> for Record {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
