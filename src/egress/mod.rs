//! Egress side: subscriptions out to voice connections

pub mod adapter;
pub mod sink;

pub use adapter::{EgressAdapter, EgressConfig};
pub use sink::AudioSink;
