//! Broadcast hub implementation
//!
//! The hub is a single tokio task (the control loop) that owns the subscriber
//! set. Subscribe and unsubscribe requests arrive on a control channel, audio
//! arrives on the inbound source channel, and the loop handles exactly one of
//! them at a time. Membership is therefore never read while it is being
//! mutated, and there is no lock around it.
//!
//! Delivery uses `try_send` on each member's bounded queue: a full queue drops
//! the packet for that member only, a closed queue gets the member pruned in
//! the same step. Nothing in the loop waits on a consumer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::{Error, Result};
use crate::stats::HubStats;

use super::config::HubConfig;
use super::packet::RealtimePacket;
use super::subscription::{Delivery, Member, Subscription, SubscriptionId};

/// Create the inbound source channel feeding a hub
pub fn source_channel(capacity: usize) -> (PacketSender, PacketSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PacketSender { tx }, PacketSource { rx })
}

/// Producer side of the hub's inbound source
///
/// Cloned into every ingress worker. The hub treats the source as exhausted
/// once every sender is dropped.
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: mpsc::Sender<RealtimePacket>,
}

impl PacketSender {
    /// Push a packet into the hub, waiting for source capacity
    pub async fn send(&self, packet: RealtimePacket) -> Result<()> {
        self.tx.send(packet).await.map_err(|_| Error::HubClosed)
    }

    /// Whether the hub has stopped consuming the source
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the inbound source, owned by the control loop
#[derive(Debug)]
pub struct PacketSource {
    rx: mpsc::Receiver<RealtimePacket>,
}

enum Command {
    Subscribe(SubscriptionId, Member),
    Unsubscribe(SubscriptionId),
}

#[derive(Debug, Default)]
struct HubCounters {
    packets_received: AtomicU64,
    deliveries: AtomicU64,
    drops: AtomicU64,
    pruned: AtomicU64,
    subscribers: AtomicUsize,
}

/// Single-producer, multi-consumer fan-out engine
///
/// Shared between the session coordinator and the control surface through an
/// `Arc`. All methods take `&self`.
pub struct BroadcastHub {
    control_tx: mpsc::Sender<Command>,
    next_id: AtomicU64,
    config: HubConfig,
    counters: Arc<HubCounters>,
    cancel: CancellationToken,
    /// Fired by the control loop as it exits
    stopped: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastHub {
    /// Start a hub consuming `source`
    ///
    /// The hub stops when `cancel` (or the hub's own shutdown) fires, or when
    /// the source is exhausted. Either way every live subscription is closed.
    pub fn spawn(config: HubConfig, source: PacketSource, cancel: CancellationToken) -> Self {
        let (control_tx, control_rx) = mpsc::channel(config.control_capacity.max(1));
        let counters = Arc::new(HubCounters::default());
        let cancel = cancel.child_token();
        let stopped = CancellationToken::new();

        let control_loop = ControlLoop {
            members: HashMap::new(),
            control_rx,
            source,
            counters: Arc::clone(&counters),
            cancel: cancel.clone(),
            _stopped: stopped.clone().drop_guard(),
        };
        let task = tokio::spawn(control_loop.run());

        Self {
            control_tx,
            next_id: AtomicU64::new(1),
            config,
            counters,
            cancel,
            stopped,
            task: Mutex::new(Some(task)),
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a new subscriber
    ///
    /// Takes effect before any packet that enters the source after this call
    /// returns. Fails with [`Error::HubClosed`] once the control loop has exited.
    pub async fn subscribe(&self) -> Result<Subscription> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (subscription, member) = Subscription::pair(id, self.config.queue_capacity);

        self.control_tx
            .send(Command::Subscribe(id, member))
            .await
            .map_err(|_| Error::HubClosed)?;

        Ok(subscription)
    }

    /// Remove and terminate a subscriber
    ///
    /// Unknown or already removed ids are ignored, as is a hub that has
    /// already shut down (its subscriptions are closed anyway).
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        if self.control_tx.send(Command::Unsubscribe(id)).await.is_err() {
            tracing::trace!(subscription = %id, "Unsubscribe after hub shutdown");
        }
    }

    /// Stop the control loop and close every live subscription
    ///
    /// Waits for the loop to exit, including when another caller is
    /// already shutting the hub down. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Hub control loop failed");
            }
        }
        self.stopped.cancelled().await;
    }

    /// Whether the control loop is still accepting requests
    pub fn is_running(&self) -> bool {
        !self.control_tx.is_closed()
    }

    /// Snapshot of the hub counters
    pub fn stats(&self) -> HubStats {
        HubStats {
            packets_received: self.counters.packets_received.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            drops: self.counters.drops.load(Ordering::Relaxed),
            pruned: self.counters.pruned.load(Ordering::Relaxed),
            subscribers: self.counters.subscribers.load(Ordering::Relaxed),
        }
    }
}

struct ControlLoop {
    members: HashMap<SubscriptionId, Member>,
    control_rx: mpsc::Receiver<Command>,
    source: PacketSource,
    counters: Arc<HubCounters>,
    cancel: CancellationToken,
    /// Dropped with the loop, after `close_all`, even on panic
    _stopped: DropGuard,
}

impl ControlLoop {
    async fn run(mut self) {
        tracing::info!("Broadcast hub started");

        loop {
            // Cancellation first, then membership, then audio: a subscribe that
            // returned before a packet was pushed is applied before that packet.
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::debug!("Hub cancelled");
                    break;
                }
                command = self.control_rx.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        tracing::debug!("All hub handles dropped");
                        break;
                    }
                },
                packet = self.source.rx.recv() => match packet {
                    Some(packet) => self.broadcast(packet),
                    None => {
                        tracing::debug!("Inbound source exhausted");
                        break;
                    }
                },
            }
        }

        self.close_all();
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Subscribe(id, member) => {
                self.members.insert(id, member);
                tracing::debug!(
                    subscription = %id,
                    subscribers = self.members.len(),
                    "Subscriber added"
                );
            }
            Command::Unsubscribe(id) => {
                // Dropping the member drops its sender, which closes the queue
                if self.members.remove(&id).is_some() {
                    tracing::debug!(
                        subscription = %id,
                        subscribers = self.members.len(),
                        "Subscriber removed"
                    );
                } else {
                    tracing::trace!(subscription = %id, "Unsubscribe of unknown subscriber");
                }
            }
        }
        self.counters
            .subscribers
            .store(self.members.len(), Ordering::Relaxed);
    }

    fn broadcast(&mut self, packet: RealtimePacket) {
        self.counters.packets_received.fetch_add(1, Ordering::Relaxed);

        let counters = &self.counters;
        self.members.retain(|id, member| match member.deliver(&packet) {
            Delivery::Delivered => {
                counters.deliveries.fetch_add(1, Ordering::Relaxed);
                true
            }
            Delivery::Dropped => {
                counters.drops.fetch_add(1, Ordering::Relaxed);
                let dropped = member.dropped();
                if dropped == 1 || dropped % 500 == 0 {
                    tracing::warn!(
                        subscription = %id,
                        dropped = dropped,
                        "Subscriber queue full, dropping packets"
                    );
                } else {
                    tracing::trace!(subscription = %id, seq = packet.sequence_number, "Packet dropped");
                }
                true
            }
            Delivery::Gone => {
                counters.pruned.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(subscription = %id, "Subscriber went away, pruned");
                false
            }
        });

        self.counters
            .subscribers
            .store(self.members.len(), Ordering::Relaxed);
    }

    fn close_all(&mut self) {
        // Abandon the source before closing queues, so producers see the hub
        // as gone no later than subscribers do
        self.source.rx.close();

        let closed = self.members.len();
        self.members.clear();
        self.counters.subscribers.store(0, Ordering::Relaxed);
        // Stop accepting further subscribe requests; anything still queued is
        // dropped with the receiver, closing those subscriptions too.
        self.control_rx.close();

        tracing::info!(closed_subscriptions = closed, "Broadcast hub stopped");
    }
}
