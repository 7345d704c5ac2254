//! Ingress worker
//!
//! Reads frames from one inbound track, numbers them with a local counter and
//! pushes them into the hub source. Sequence numbers restart at zero for each
//! track and skip nothing, whatever gaps the inbound RTP sequence has.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::{PacketSender, RealtimePacket, SequenceCounter};
use crate::stats::IngressStats;

use super::track::InboundTrack;

/// Converts one inbound track into hub packets
pub struct IngressAdapter {
    track: Box<dyn InboundTrack>,
    source: PacketSender,
    cancel: CancellationToken,
    sequence: SequenceCounter,
    stats: IngressStats,
}

impl IngressAdapter {
    /// Create an adapter feeding `source`
    pub fn new(track: Box<dyn InboundTrack>, source: PacketSender, cancel: CancellationToken) -> Self {
        let stats = IngressStats::new(track.id());
        Self {
            track,
            source,
            cancel,
            sequence: SequenceCounter::new(),
            stats,
        }
    }

    /// Run the adapter on its own task
    pub fn spawn(self) -> JoinHandle<IngressStats> {
        tokio::spawn(self.run())
    }

    /// Pump frames until the track ends, the hub goes away or cancellation
    pub async fn run(mut self) -> IngressStats {
        tracing::info!(
            track = self.track.id(),
            codec = self.track.codec(),
            "Inbound track started"
        );

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                frame = self.track.read_frame() => frame,
            };

            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!(track = self.track.id(), "Inbound track ended");
                    break;
                }
                Err(e) => {
                    tracing::warn!(track = self.track.id(), error = %e, "Inbound track read failed");
                    break;
                }
            };

            self.stats.frames_read += 1;
            if frame.payload.is_empty() {
                self.stats.empty_frames += 1;
                continue;
            }

            let packet = RealtimePacket::new(frame.payload, self.sequence.advance(), frame.timestamp);
            let size = packet.len() as u64;

            tracing::trace!(
                track = self.track.id(),
                seq = packet.sequence_number,
                ts = packet.timestamp,
                "Packet in"
            );

            // The source is bounded; waiting for room must not outlive cancellation
            let sent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                sent = self.source.send(packet) => sent,
            };
            if sent.is_err() {
                tracing::debug!(track = self.track.id(), "Hub closed, stopping ingress");
                break;
            }

            self.stats.packets_sent += 1;
            self.stats.bytes_sent += size;
        }

        tracing::debug!(
            track = %self.stats.track_id,
            frames = self.stats.frames_read,
            packets = self.stats.packets_sent,
            empty = self.stats.empty_frames,
            "Ingress worker stopped"
        );
        self.stats
    }
}
