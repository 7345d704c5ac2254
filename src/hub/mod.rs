//! Broadcast hub for audio fan-out
//!
//! The hub takes one ordered stream of packets from the ingress side and
//! distributes it to a changing set of subscribers, each paced independently.
//!
//! # Architecture
//!
//! ```text
//!    [Ingress]                    BroadcastHub
//!   PacketSender ──► source ─┐   ┌──────────────────────────┐
//!                            ├──►│ control loop (one task)  │
//!   subscribe() ─┐           │   │  members: HashMap<Id,    │
//!   unsubscribe()├─► control ┘   │    Member { tx: mpsc } > │
//!                                └────────────┬─────────────┘
//!                                             │ try_send (bounded)
//!                     ┌───────────────────────┼───────────────────────┐
//!                     ▼                       ▼                       ▼
//!               [Subscription]          [Subscription]          [Subscription]
//!               EgressAdapter           EgressAdapter           EgressAdapter
//! ```
//!
//! # Delivery policy
//!
//! Each subscription has a small bounded queue. A full queue drops the newest
//! packet for that subscriber only, so a stalled consumer never holds up the
//! loop or its siblings. `bytes::Bytes` payloads are reference counted, so a
//! broadcast clones only the packet header, never the audio.

pub mod config;
pub mod packet;
pub mod server;
pub mod subscription;

pub use config::HubConfig;
pub use packet::{RealtimePacket, SequenceCounter};
pub use server::{source_channel, BroadcastHub, PacketSender, PacketSource};
pub use subscription::{Subscription, SubscriptionId, SubscriptionStats};
