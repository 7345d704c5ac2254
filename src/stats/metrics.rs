//! Statistics for the relay pipeline

use std::time::{Duration, Instant};

/// Hub-wide delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Packets taken from the inbound source
    pub packets_received: u64,
    /// Successful enqueues across all subscribers
    pub deliveries: u64,
    /// Packets dropped on full subscriber queues
    pub drops: u64,
    /// Subscribers removed because their handle was dropped
    pub pruned: u64,
    /// Currently registered subscribers
    pub subscribers: usize,
}

impl HubStats {
    /// Fraction of delivery attempts that were dropped
    pub fn drop_ratio(&self) -> f64 {
        let attempts = self.deliveries + self.drops;
        if attempts > 0 {
            self.drops as f64 / attempts as f64
        } else {
            0.0
        }
    }
}

/// Counters for one ingress worker
#[derive(Debug, Clone)]
pub struct IngressStats {
    /// Track identifier
    pub track_id: String,
    /// When the worker started
    pub started_at: Instant,
    /// Frames read from the track
    pub frames_read: u64,
    /// Frames discarded for carrying no payload
    pub empty_frames: u64,
    /// Packets pushed into the hub
    pub packets_sent: u64,
    /// Payload bytes pushed into the hub
    pub bytes_sent: u64,
}

impl IngressStats {
    pub fn new(track_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            started_at: Instant::now(),
            frames_read: 0,
            empty_frames: 0,
            packets_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Time since the worker started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Payload bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}

/// Counters for one egress worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EgressStats {
    /// Packets handed to the sink
    pub forwarded: u64,
    /// Packets dropped because the sink was not ready in time
    pub dropped_not_ready: u64,
    /// Packets dropped because a send did not finish in time
    pub dropped_timeout: u64,
    /// Sends the sink rejected
    pub send_errors: u64,
}

impl EgressStats {
    /// All packets that never reached the sink
    pub fn dropped(&self) -> u64 {
        self.dropped_not_ready + self.dropped_timeout + self.send_errors
    }
}
