//! Egress worker
//!
//! Drains one subscription into one audio sink. Packets are renumbered with
//! the worker's own counter, so the sink always sees 0, 1, 2, ... whatever the
//! hub dropped upstream. Every wait on the sink is bounded: a sink that is not
//! ready, or a send that stalls, costs at most one timeout per packet and the
//! packet is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SinkError;
use crate::hub::{RealtimePacket, SequenceCounter, Subscription};
use crate::stats::EgressStats;
use crate::voice::Destination;

use super::sink::AudioSink;

/// Egress worker configuration
#[derive(Debug, Clone)]
pub struct EgressConfig {
    /// How long to wait for an unready sink before dropping a packet
    pub ready_timeout: Duration,

    /// How long a single send may take before the packet is dropped
    pub send_timeout: Duration,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            // One Opus frame
            ready_timeout: Duration::from_millis(20),
            send_timeout: Duration::from_millis(100),
        }
    }
}

impl EgressConfig {
    /// Set the sink readiness timeout
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Set the per-send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}

enum Forward {
    Sent,
    Dropped,
    Cancelled,
}

/// Forwards one subscription to one sink
pub struct EgressAdapter {
    destination: Destination,
    subscription: Subscription,
    sink: Arc<dyn AudioSink>,
    config: EgressConfig,
    cancel: CancellationToken,
    sequence: SequenceCounter,
    stats: EgressStats,
}

impl EgressAdapter {
    /// Create an adapter for `destination`
    pub fn new(
        destination: Destination,
        subscription: Subscription,
        sink: Arc<dyn AudioSink>,
        config: EgressConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            destination,
            subscription,
            sink,
            config,
            cancel,
            sequence: SequenceCounter::new(),
            stats: EgressStats::default(),
        }
    }

    /// Run the adapter on its own task
    pub fn spawn(self) -> JoinHandle<EgressStats> {
        tokio::spawn(self.run())
    }

    /// Forward packets until the subscription closes, the sink closes or cancellation
    pub async fn run(mut self) -> EgressStats {
        tracing::debug!(
            channel = %self.destination,
            subscription = %self.subscription.id(),
            "Egress worker started"
        );

        loop {
            let packet = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                packet = self.subscription.recv() => match packet {
                    Some(packet) => packet,
                    None => break,
                },
            };

            match self.forward(packet).await {
                Ok(Forward::Sent) | Ok(Forward::Dropped) => {}
                Ok(Forward::Cancelled) => break,
                Err(SinkError::Closed) => {
                    tracing::info!(channel = %self.destination, "Voice connection closed, stopping egress");
                    break;
                }
                Err(SinkError::Failed(reason)) => {
                    self.stats.send_errors += 1;
                    tracing::warn!(channel = %self.destination, error = %reason, "Audio send failed");
                }
            }
        }

        tracing::debug!(
            channel = %self.destination,
            forwarded = self.stats.forwarded,
            dropped = self.stats.dropped(),
            "Egress worker stopped"
        );
        self.stats
    }

    async fn forward(&mut self, packet: RealtimePacket) -> Result<Forward, SinkError> {
        if !self.sink.is_ready() {
            let ready = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Forward::Cancelled),
                ready = tokio::time::timeout(self.config.ready_timeout, self.sink.ready()) => ready.is_ok(),
            };
            if !ready {
                self.stats.dropped_not_ready += 1;
                tracing::trace!(channel = %self.destination, "Sink not ready, packet dropped");
                return Ok(Forward::Dropped);
            }
        }

        // Only consume a sequence number once the sink has taken the packet
        let outbound = packet.renumbered(self.sequence.peek());
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Forward::Cancelled),
            sent = tokio::time::timeout(self.config.send_timeout, self.sink.send(outbound)) => sent,
        };

        match sent {
            Ok(Ok(())) => {
                self.sequence.advance();
                self.stats.forwarded += 1;
                Ok(Forward::Sent)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                self.stats.dropped_timeout += 1;
                tracing::trace!(channel = %self.destination, "Audio send timed out, packet dropped");
                Ok(Forward::Dropped)
            }
        }
    }
}
