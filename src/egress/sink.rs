//! Outbound audio sink

use async_trait::async_trait;

use crate::error::SinkError;
use crate::hub::RealtimePacket;

/// Ingestion point of an outbound voice connection
///
/// Implemented by whatever wraps the voice platform's connection. A sink may
/// exist before its connection is finalized; `is_ready` reports that and
/// `ready` resolves once it flips.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    /// Whether the connection currently accepts audio
    fn is_ready(&self) -> bool;

    /// Resolve once the connection accepts audio
    async fn ready(&self);

    /// Hand one packet to the connection
    ///
    /// `SinkError::Closed` means the connection is gone for good and the
    /// caller should stop sending.
    async fn send(&self, packet: RealtimePacket) -> Result<(), SinkError>;
}
