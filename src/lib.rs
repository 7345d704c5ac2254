//! Voice relay
//!
//! Takes one inbound real-time audio stream from a browser peer connection
//! and fans it out to any number of voice channels on a chat platform.
//!
//! ```text
//!  peer connection ──► IngressAdapter ──► BroadcastHub ──┬─► EgressAdapter ──► voice channel A
//!                                                        ├─► EgressAdapter ──► voice channel B
//!                                                        └─► ...
//! ```
//!
//! The platform client ([`VoiceClient`]) and the peer-connection library
//! ([`PeerNegotiator`]) are supplied by the embedding application. A
//! [`RelayContext`] owns one relay; [`RelayServer`] exposes it over HTTP.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use voice_relay::{RelayConfig, RelayContext, RelayServer, ServerConfig};
//!
//! let context = RelayContext::new(client, negotiator, RelayConfig::default());
//! let server = RelayServer::new(ServerConfig::default(), Arc::new(context));
//! server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```

pub mod egress;
pub mod error;
pub mod hub;
pub mod ingress;
pub mod server;
pub mod session;
pub mod signaling;
pub mod stats;
pub mod voice;

#[cfg(test)]
mod testing;

pub use egress::{AudioSink, EgressAdapter, EgressConfig};
pub use error::{ConnectionError, Error, Result, SignalingError, SinkError};
pub use hub::{BroadcastHub, HubConfig, RealtimePacket, Subscription, SubscriptionId};
pub use ingress::{InboundTrack, IngressAdapter, MediaFrame};
pub use server::{RelayServer, ServerConfig};
pub use session::{
    CoordinatorConfig, DestinationState, JoinPolicy, LeaveOutcome, RelayConfig, RelayContext,
    SessionCoordinator,
};
pub use signaling::{PeerNegotiator, SessionDescription};
pub use stats::{EgressStats, HubStats, IngressStats};
pub use voice::{Destination, GuildInfo, VoiceChannelInfo, VoiceClient};
