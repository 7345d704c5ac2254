//! Inbound media track boundary

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// One RTP frame as delivered by the negotiation library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFrame {
    /// Encoded audio payload
    pub payload: Bytes,
    /// Sequence number on the inbound leg (not carried over)
    pub sequence_number: u16,
    /// RTP timestamp (48 kHz sample clock for Opus)
    pub timestamp: u32,
}

impl MediaFrame {
    /// Create a new frame
    pub fn new(payload: impl Into<Bytes>, sequence_number: u16, timestamp: u32) -> Self {
        Self {
            payload: payload.into(),
            sequence_number,
            timestamp,
        }
    }
}

/// A negotiated inbound media track
#[async_trait]
pub trait InboundTrack: Send + 'static {
    /// Track identifier, for logs
    fn id(&self) -> &str;

    /// Codec MIME type (e.g. `audio/opus`)
    fn codec(&self) -> &str;

    /// Read the next frame; `Ok(None)` when the track has ended
    async fn read_frame(&mut self) -> Result<Option<MediaFrame>>;
}
