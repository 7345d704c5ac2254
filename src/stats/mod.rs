//! Relay statistics

pub mod metrics;

pub use metrics::{EgressStats, HubStats, IngressStats};
