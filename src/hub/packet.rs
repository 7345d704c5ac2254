//! Packet types moved through the hub
//!
//! Field widths follow RTP: a 16-bit wrapping sequence number and a 32-bit
//! sample clock, so packets pass between the peer connection and the voice
//! connection without transcoding.

use bytes::Bytes;

/// One frame of real-time audio plus relay sequencing metadata
///
/// Cheap to clone: the payload is reference counted, so every subscriber of a
/// broadcast shares the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimePacket {
    /// Encoded audio (Opus) bytes
    pub payload: Bytes,
    /// Sequence number of the current output leg
    pub sequence_number: u16,
    /// Capture clock of the source
    pub timestamp: u32,
}

impl RealtimePacket {
    /// Create a new packet
    pub fn new(payload: Bytes, sequence_number: u16, timestamp: u32) -> Self {
        Self {
            payload,
            sequence_number,
            timestamp,
        }
    }

    /// Copy of this packet carrying a different sequence number
    pub fn renumbered(&self, sequence_number: u16) -> Self {
        Self {
            payload: self.payload.clone(),
            sequence_number,
            timestamp: self.timestamp,
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Wrapping per-leg sequence counter starting at zero
#[derive(Debug, Default, Clone)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next `advance` will return
    pub fn peek(&self) -> u16 {
        self.next
    }

    /// Take the next sequence number
    pub fn advance(&mut self) -> u16 {
        let current = self.next;
        self.next = self.next.wrapping_add(1);
        current
    }
}
