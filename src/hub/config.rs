//! Hub configuration

/// Default per-subscriber queue capacity (packets)
///
/// Eight 20 ms Opus frames, so a stalled consumer holds at most 160 ms of
/// audio before it starts losing packets.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Configuration for a [`BroadcastHub`](super::BroadcastHub)
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each subscriber's delivery queue
    pub queue_capacity: usize,

    /// Capacity of the control channel (subscribe/unsubscribe requests)
    pub control_capacity: usize,

    /// Capacity of the inbound source channel
    pub source_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            control_capacity: 32,
            source_capacity: 64,
        }
    }
}

impl HubConfig {
    /// Set the per-subscriber queue capacity (minimum 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the control channel capacity (minimum 1)
    pub fn control_capacity(mut self, capacity: usize) -> Self {
        self.control_capacity = capacity.max(1);
        self
    }

    /// Set the inbound source capacity (minimum 1)
    pub fn source_capacity(mut self, capacity: usize) -> Self {
        self.source_capacity = capacity.max(1);
        self
    }
}
