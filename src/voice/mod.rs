//! Voice platform boundary
//!
//! The voice platform client library is an external collaborator. The relay
//! only needs the handful of operations in [`VoiceClient`]; whatever library
//! implements them keeps managing its own gateway connection.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::egress::AudioSink;
use crate::error::ConnectionError;

/// A voice channel the relay can be joined to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Guild (server) owning the channel
    pub guild_id: String,
    /// Voice channel id, unique across guilds
    pub channel_id: String,
}

impl Destination {
    /// Create a new destination
    pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.channel_id)
    }
}

/// A voice channel as listed by get-info
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceChannelInfo {
    pub id: String,
    pub name: String,
}

/// A guild and its voice channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildInfo {
    pub id: String,
    pub name: String,
    /// Icon URL, empty when the guild has none
    pub icon: String,
    #[serde(rename = "voiceChannels")]
    pub voice_channels: Vec<VoiceChannelInfo>,
}

/// Operations the relay needs from the voice platform client
#[async_trait]
pub trait VoiceClient: Send + Sync + 'static {
    /// Open a platform session with the given credential (bot token)
    async fn start(&self, credential: &str) -> Result<(), ConnectionError>;

    /// List the guilds visible to the session with their voice channels
    async fn guilds(&self) -> Result<Vec<GuildInfo>, ConnectionError>;

    /// Connect to a voice channel, returning its audio ingestion point
    async fn join(&self, destination: &Destination) -> Result<Arc<dyn AudioSink>, ConnectionError>;

    /// Disconnect from a voice channel
    async fn leave(&self, destination: &Destination) -> Result<(), ConnectionError>;

    /// Close the platform session
    async fn close(&self);
}
