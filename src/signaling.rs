//! Peer-connection negotiation boundary
//!
//! Offer/answer exchange is opaque to the relay: the control surface hands the
//! offer string to a [`PeerNegotiator`] and returns whatever answer it
//! produces. [`SessionDescription`] is provided for negotiators that speak the
//! usual `{"type": ..., "sdp": ...}` JSON form.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SignalingError;
use crate::ingress::InboundTrack;

/// Operations the relay needs from the peer-connection library
#[async_trait]
pub trait PeerNegotiator: Send + Sync + 'static {
    /// Apply a remote offer and return the local answer
    ///
    /// Answers are returned once candidate gathering has completed, since
    /// only one signaling message is exchanged in each direction.
    async fn signal(&self, offer: &str) -> Result<String, SignalingError>;

    /// Wait for the next inbound track; `None` once the connection is closed
    async fn next_track(&self) -> Option<Box<dyn InboundTrack>>;
}

/// Session description type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// Session description in its JSON wire form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    /// Build an answer
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Parse a remote offer, rejecting anything that is not an offer
    pub fn parse_offer(raw: &str) -> Result<Self, SignalingError> {
        let description: Self =
            serde_json::from_str(raw).map_err(|e| SignalingError::Malformed(e.to_string()))?;

        if description.sdp_type != SdpType::Offer {
            return Err(SignalingError::Negotiation(format!(
                "expected an offer, got {:?}",
                description.sdp_type
            )));
        }
        if description.sdp.trim().is_empty() {
            return Err(SignalingError::Malformed("empty sdp".into()));
        }
        Ok(description)
    }

    /// Serialize to the JSON wire form
    pub fn to_json(&self) -> Result<String, SignalingError> {
        serde_json::to_string(self).map_err(|e| SignalingError::Malformed(e.to_string()))
    }
}
