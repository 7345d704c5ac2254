//! Session coordinator
//!
//! Maps join/leave intents onto hub subscriptions and egress workers. Each
//! destination has its own slot behind an async mutex, held for the whole of a
//! join or leave including the calls out to the voice client. Two calls for
//! the same channel can therefore never interleave into two live subscriptions,
//! while a slow voice server only holds up its own channel.
//!
//! Every join, leave and leave-all runs on a spawned task that the caller
//! awaits. Dropping the caller's future (an HTTP client hanging up) leaves the
//! operation running to completion, so the registry and the voice platform
//! never disagree about what is joined.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::egress::EgressAdapter;
use crate::error::{ConnectionError, Error, Result};
use crate::hub::BroadcastHub;
use crate::voice::{Destination, VoiceClient};

use super::state::{Binding, CoordinatorConfig, DestinationState, JoinPolicy, LeaveOutcome};

/// Binding slot of one destination; `None` while unjoined
type Slot = Arc<Mutex<Option<Binding>>>;

/// Binds destinations to hub subscriptions, one per destination
pub struct SessionCoordinator {
    shared: Arc<Shared>,
}

struct Shared {
    client: Arc<dyn VoiceClient>,
    hub: Arc<BroadcastHub>,
    config: CoordinatorConfig,
    cancel: CancellationToken,
    /// Keyed by voice channel id. Slots are never removed, so every caller
    /// for a channel contends on the same lock.
    slots: Mutex<HashMap<String, Slot>>,
}

impl SessionCoordinator {
    /// Create a coordinator; egress workers get children of `cancel`
    pub fn new(
        client: Arc<dyn VoiceClient>,
        hub: Arc<BroadcastHub>,
        config: CoordinatorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                hub,
                config,
                cancel,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Get the coordinator configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Join a voice channel and start relaying into it
    ///
    /// Under [`JoinPolicy::Reject`] a second join fails with
    /// [`Error::AlreadyJoined`]; under [`JoinPolicy::Replace`] the old binding
    /// is fully torn down first. A binding whose egress worker already stopped
    /// (its connection closed) is replaced under either policy.
    pub async fn join(&self, destination: Destination) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        detached(async move { shared.join(destination).await }).await
    }

    /// Stop relaying into a voice channel and disconnect from it
    ///
    /// Leaving a channel that is not joined does nothing. The binding is
    /// removed even if the voice client fails to disconnect; that failure is
    /// still returned.
    pub async fn leave(&self, destination: &Destination) -> Result<LeaveOutcome> {
        let shared = Arc::clone(&self.shared);
        let destination = destination.clone();
        detached(async move { shared.leave(&destination).await }).await
    }

    /// Tear down every binding, returning how many there were
    pub async fn leave_all(&self) -> usize {
        let shared = Arc::clone(&self.shared);
        match tokio::spawn(async move { shared.leave_all().await }).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Leave-all task failed");
                0
            }
        }
    }

    /// State of a destination
    ///
    /// Waits for a join or leave in progress on that destination.
    pub async fn state(&self, channel_id: &str) -> DestinationState {
        let slot = self.shared.slots.lock().await.get(channel_id).cloned();
        let Some(slot) = slot else {
            return DestinationState::Unjoined;
        };

        let binding = slot.lock().await;
        if binding.is_some() {
            DestinationState::Joined
        } else {
            DestinationState::Unjoined
        }
    }

    /// Whether a destination is joined
    pub async fn is_joined(&self, channel_id: &str) -> bool {
        self.state(channel_id).await == DestinationState::Joined
    }

    /// All joined destinations
    pub async fn joined(&self) -> Vec<Destination> {
        let mut joined = Vec::new();
        for slot in self.shared.all_slots().await {
            let binding = slot.lock().await;
            if let Some(binding) = binding.as_ref() {
                joined.push(binding.destination.clone());
            }
        }
        joined
    }
}

/// Run `operation` on its own task and wait for it
async fn detached<T>(operation: impl Future<Output = Result<T>> + Send + 'static) -> Result<T>
where
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| Error::Task(e.to_string()))?
}

impl Shared {
    async fn slot(&self, channel_id: &str) -> Slot {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(channel_id.to_string()).or_default())
    }

    async fn all_slots(&self) -> Vec<Slot> {
        self.slots.lock().await.values().cloned().collect()
    }

    async fn join(&self, destination: Destination) -> Result<()> {
        let slot = self.slot(&destination.channel_id).await;
        let mut slot = slot.lock().await;

        if let Some(existing) = slot.as_ref() {
            if !existing.is_stale() && self.config.join_policy == JoinPolicy::Reject {
                return Err(Error::AlreadyJoined(existing.destination.clone()));
            }
        }
        if let Some(old) = slot.take() {
            tracing::debug!(channel = %old.destination, stale = old.is_stale(), "Replacing binding");
            if let Err(e) = self.teardown(old).await {
                tracing::warn!(error = %e, "Leaving replaced voice connection failed");
            }
        }

        let sink = self.client.join(&destination).await.map_err(|e| {
            tracing::warn!(channel = %destination, error = %e, "Voice join failed");
            e
        })?;

        let subscription = match self.hub.subscribe().await {
            Ok(subscription) => subscription,
            Err(e) => {
                // Roll back the external connection; nothing was registered
                if let Err(leave_err) = self.client.leave(&destination).await {
                    tracing::warn!(channel = %destination, error = %leave_err, "Join rollback failed");
                }
                return Err(e);
            }
        };

        let cancel = self.cancel.child_token();
        let subscription_id = subscription.id();
        let worker = EgressAdapter::new(
            destination.clone(),
            subscription,
            sink,
            self.config.egress.clone(),
            cancel.clone(),
        )
        .spawn();

        tracing::info!(
            channel = %destination,
            subscription = %subscription_id,
            "Joined voice channel"
        );

        *slot = Some(Binding {
            destination,
            subscription: subscription_id,
            cancel,
            worker,
            joined_at: Instant::now(),
        });

        Ok(())
    }

    async fn leave(&self, destination: &Destination) -> Result<LeaveOutcome> {
        let slot = self.slots.lock().await.get(&destination.channel_id).cloned();
        let Some(slot) = slot else {
            tracing::debug!(channel = %destination, "Leave without active subscription");
            return Ok(LeaveOutcome::NotJoined);
        };

        let mut slot = slot.lock().await;
        let Some(binding) = slot.take() else {
            tracing::debug!(channel = %destination, "Leave without active subscription");
            return Ok(LeaveOutcome::NotJoined);
        };

        let channel = binding.destination.clone();
        let joined_for = binding.duration();
        self.teardown(binding).await?;

        tracing::info!(
            channel = %channel,
            joined_secs = joined_for.as_secs(),
            "Left voice channel"
        );
        Ok(LeaveOutcome::Left)
    }

    async fn leave_all(&self) -> usize {
        let mut count = 0;

        for slot in self.all_slots().await {
            let mut slot = slot.lock().await;
            let Some(binding) = slot.take() else {
                continue;
            };
            count += 1;

            let channel = binding.destination.clone();
            if let Err(e) = self.teardown(binding).await {
                tracing::warn!(channel = %channel, error = %e, "Leave failed during teardown");
            }
        }

        if count > 0 {
            tracing::info!(count = count, "Left all voice channels");
        }
        count
    }

    async fn teardown(&self, binding: Binding) -> std::result::Result<(), ConnectionError> {
        self.hub.unsubscribe(binding.subscription).await;
        binding.cancel.cancel();

        match binding.worker.await {
            Ok(stats) => tracing::debug!(
                channel = %binding.destination,
                forwarded = stats.forwarded,
                dropped = stats.dropped(),
                "Egress worker joined"
            ),
            Err(e) => tracing::error!(channel = %binding.destination, error = %e, "Egress worker failed"),
        }

        self.client.leave(&binding.destination).await
    }
}
