//! Subscription handles and the hub-side member state
//!
//! A subscription is the receiving half of a bounded `mpsc` queue. The hub
//! keeps the sending half in a [`Member`]; dropping that sender is how a
//! subscription is terminated, so a consumer sees `None` from `recv` once it
//! has drained whatever was already queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::packet::RealtimePacket;

/// Opaque identifier of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(super) u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Delivery counters shared between the hub and the subscription handle
#[derive(Debug, Default)]
pub(super) struct DeliveryCounters {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of one subscription's delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Packets enqueued for this subscriber
    pub delivered: u64,
    /// Packets dropped because the queue was full
    pub dropped: u64,
}

/// Result of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Delivery {
    Delivered,
    /// Queue full, packet dropped for this subscriber only
    Dropped,
    /// Receiver gone, member should be pruned
    Gone,
}

/// Hub-side state of a registered subscription
#[derive(Debug)]
pub(super) struct Member {
    tx: mpsc::Sender<RealtimePacket>,
    counters: Arc<DeliveryCounters>,
}

impl Member {
    /// Non-blocking delivery with drop-newest on a full queue
    pub(super) fn deliver(&self, packet: &RealtimePacket) -> Delivery {
        match self.tx.try_send(packet.clone()) {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                Delivery::Delivered
            }
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Gone,
        }
    }

    pub(super) fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

/// A consumer's registered interest in the broadcast
///
/// Returned by [`BroadcastHub::subscribe`](super::BroadcastHub::subscribe).
/// Once the hub removes it (unsubscribe or shutdown) the handle is inert:
/// `recv` drains any queued packets and then returns `None`.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<RealtimePacket>,
    counters: Arc<DeliveryCounters>,
}

impl Subscription {
    /// Create a subscription and the member the hub keeps for it
    pub(super) fn pair(id: SubscriptionId, capacity: usize) -> (Self, Member) {
        let (tx, rx) = mpsc::channel(capacity);
        let counters = Arc::new(DeliveryCounters::default());

        let subscription = Self {
            id,
            rx,
            counters: Arc::clone(&counters),
        };
        (subscription, Member { tx, counters })
    }

    /// Identifier to pass to `unsubscribe`
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next packet; `None` once the subscription is terminated
    pub async fn recv(&mut self) -> Option<RealtimePacket> {
        self.rx.recv().await
    }

    /// Take a queued packet without waiting
    pub fn try_recv(&mut self) -> Option<RealtimePacket> {
        self.rx.try_recv().ok()
    }

    /// Delivery counters for this subscription
    pub fn stats(&self) -> SubscriptionStats {
        SubscriptionStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}
