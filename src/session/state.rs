//! Per-destination state
//!
//! A destination is either unjoined or joined; there is no visible
//! in-between because a join runs entirely under its destination's slot lock.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::egress::EgressConfig;
use crate::hub::SubscriptionId;
use crate::stats::EgressStats;
use crate::voice::Destination;

/// Lifecycle state of a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationState {
    /// No subscription bound
    Unjoined,
    /// A subscription and egress worker are bound
    Joined,
}

/// What a join does when the destination is already joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPolicy {
    /// Fail with `AlreadyJoined`
    #[default]
    Reject,
    /// Tear the old binding down completely, then join again
    Replace,
}

/// Result of a leave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The binding was torn down
    Left,
    /// Nothing was bound; nothing was done
    NotJoined,
}

/// Session coordinator configuration
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Duplicate join handling
    pub join_policy: JoinPolicy,

    /// Configuration for each egress worker
    pub egress: EgressConfig,
}

impl CoordinatorConfig {
    /// Set the join policy
    pub fn join_policy(mut self, policy: JoinPolicy) -> Self {
        self.join_policy = policy;
        self
    }

    /// Set the egress configuration
    pub fn egress(mut self, egress: EgressConfig) -> Self {
        self.egress = egress;
        self
    }
}

/// Registry entry binding a destination to its subscription and worker
#[derive(Debug)]
pub(super) struct Binding {
    pub destination: Destination,
    pub subscription: SubscriptionId,
    pub cancel: CancellationToken,
    pub worker: JoinHandle<EgressStats>,
    pub joined_at: Instant,
}

impl Binding {
    /// Whether the egress worker has already stopped on its own
    pub fn is_stale(&self) -> bool {
        self.worker.is_finished()
    }

    pub fn duration(&self) -> Duration {
        self.joined_at.elapsed()
    }
}
