//! netsort wire format — the frames exchanged on every peer link.
//!
//! Every frame is exactly `1 + record_len` bytes. There is no length prefix,
//! no version negotiation and no acknowledgement: the receiver reconstructs
//! frame boundaries purely from the fixed size. Changing a tag value or the
//! `Done` layout breaks compatibility between nodes.
//!
//!   Data:  [0x00][record bytes ...............]
//!   Done:  [0x01][sender id][0x00 padding .....]

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::const_assert_ne;

use crate::record::{Record, RecordLayout};
use crate::NodeId;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Control tag of a frame carrying one record.
pub const TAG_DATA: u8 = 0x00;

/// Control tag of a frame signalling that the sender has nothing more to send.
pub const TAG_DONE: u8 = 0x01;

/// Fill byte for the unused tail of a `Done` frame. Never read.
pub const DONE_PADDING: u8 = 0x00;

const_assert_ne!(TAG_DATA, TAG_DONE);

// ── Frame ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A record owned by the receiving node.
    Data(Record),
    /// The named sender has written every record it owes this link.
    Done(NodeId),
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Encodes and decodes frames for one record layout.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    layout: RecordLayout,
}

impl FrameCodec {
    pub fn new(layout: RecordLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn frame_len(&self) -> usize {
        self.layout.frame_len()
    }

    /// Append a `Data` frame for `record` to `dst`.
    pub fn encode_data(&self, record: &Record, dst: &mut BytesMut) -> Result<(), WireError> {
        if record.len() != self.layout.record_len {
            return Err(WireError::RecordLength {
                expected: self.layout.record_len,
                actual: record.len(),
            });
        }
        dst.reserve(self.frame_len());
        dst.put_u8(TAG_DATA);
        dst.put_slice(record.as_bytes());
        Ok(())
    }

    /// Append a `Done` frame for `sender` to `dst`.
    pub fn encode_done(&self, sender: NodeId, dst: &mut BytesMut) {
        dst.reserve(self.frame_len());
        dst.put_u8(TAG_DONE);
        dst.put_u8(sender);
        dst.put_bytes(DONE_PADDING, self.frame_len() - 2);
    }

    pub fn encode(&self, frame: &Frame, dst: &mut BytesMut) -> Result<(), WireError> {
        match frame {
            Frame::Data(record) => self.encode_data(record, dst),
            Frame::Done(sender) => {
                self.encode_done(*sender, dst);
                Ok(())
            }
        }
    }

    /// Decode one complete frame. `buf` must be exactly one frame long.
    /// Only the tag byte is inspected to classify; `Done` padding is ignored.
    pub fn decode(&self, buf: &[u8]) -> Result<Frame, WireError> {
        if buf.len() != self.frame_len() {
            return Err(WireError::FrameLength {
                expected: self.frame_len(),
                actual: buf.len(),
            });
        }
        match buf[0] {
            TAG_DATA => Ok(Frame::Data(Record::new(Bytes::copy_from_slice(&buf[1..])))),
            TAG_DONE => Ok(Frame::Done(buf[1])),
            other => Err(WireError::UnknownTag(other)),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when producing or interpreting frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown frame tag: 0x{0:02x}")]
    UnknownTag(u8),

    #[error("frame is {actual} bytes, expected {expected}")]
    FrameLength { expected: usize, actual: usize },

    #[error("record is {actual} bytes, expected {expected}")]
    RecordLength { expected: usize, actual: usize },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
