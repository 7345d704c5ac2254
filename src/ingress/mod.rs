//! Ingress side: inbound peer-connection tracks into the hub

pub mod adapter;
pub mod track;

pub use adapter::IngressAdapter;
pub use track::{InboundTrack, MediaFrame};
