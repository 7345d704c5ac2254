//! Session management
//!
//! The coordinator owns the destination registry; the relay context bundles
//! it with the hub and the external clients behind one caller-owned object.

pub mod context;
pub mod coordinator;
pub mod state;

pub use context::{RelayConfig, RelayContext};
pub use coordinator::SessionCoordinator;
pub use state::{CoordinatorConfig, DestinationState, JoinPolicy, LeaveOutcome};
