//! Relay context
//!
//! One caller-owned object per relay: it holds the voice client, the
//! negotiator, the hub and the coordinator, and every control operation goes
//! through it. Creating it starts the hub; `shutdown` stops everything it
//! started.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::hub::{source_channel, BroadcastHub, HubConfig, PacketSender};
use crate::ingress::IngressAdapter;
use crate::signaling::PeerNegotiator;
use crate::stats::{HubStats, IngressStats};
use crate::voice::{Destination, GuildInfo, VoiceClient};

use super::coordinator::SessionCoordinator;
use super::state::{CoordinatorConfig, LeaveOutcome};

/// Configuration for a [`RelayContext`]
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Broadcast hub settings
    pub hub: HubConfig,
    /// Join policy and egress settings
    pub coordinator: CoordinatorConfig,
}

impl RelayConfig {
    /// Set the hub configuration
    pub fn hub(mut self, hub: HubConfig) -> Self {
        self.hub = hub;
        self
    }

    /// Set the coordinator configuration
    pub fn coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.coordinator = coordinator;
        self
    }
}

/// Everything one relay instance owns
pub struct RelayContext {
    client: Arc<dyn VoiceClient>,
    negotiator: Arc<dyn PeerNegotiator>,
    hub: Arc<BroadcastHub>,
    source: PacketSender,
    coordinator: SessionCoordinator,
    cancel: CancellationToken,
    stream_task: Mutex<Option<JoinHandle<Vec<IngressStats>>>>,
}

impl RelayContext {
    /// Create a context and start its hub
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        client: Arc<dyn VoiceClient>,
        negotiator: Arc<dyn PeerNegotiator>,
        config: RelayConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (source, rx) = source_channel(config.hub.source_capacity);
        let hub = Arc::new(BroadcastHub::spawn(config.hub, rx, cancel.clone()));
        let coordinator = SessionCoordinator::new(
            Arc::clone(&client),
            Arc::clone(&hub),
            config.coordinator,
            cancel.child_token(),
        );

        Self {
            client,
            negotiator,
            hub,
            source,
            coordinator,
            cancel,
            stream_task: Mutex::new(None),
        }
    }

    /// Open the voice platform session
    pub async fn start_session(&self, credential: &str) -> Result<()> {
        self.client.start(credential).await?;
        tracing::info!("Voice session started");
        Ok(())
    }

    /// Guilds and voice channels visible to the session
    pub async fn info(&self) -> Result<Vec<GuildInfo>> {
        Ok(self.client.guilds().await?)
    }

    /// Leave every channel and close the voice platform session
    pub async fn close(&self) {
        self.coordinator.leave_all().await;
        self.client.close().await;
        tracing::info!("Voice session closed");
    }

    /// Join a voice channel and relay the inbound stream into it
    pub async fn join(&self, destination: Destination) -> Result<()> {
        self.coordinator.join(destination).await
    }

    /// Leave a voice channel; a no-op when it is not joined
    pub async fn leave(&self, destination: &Destination) -> Result<LeaveOutcome> {
        self.coordinator.leave(destination).await
    }

    /// Exchange a peer-connection offer for an answer
    pub async fn signal(&self, offer: &str) -> Result<String> {
        let answer = self.negotiator.signal(offer).await.map_err(|e| {
            tracing::warn!(error = %e, "Signaling failed");
            e
        })?;
        tracing::debug!("Signaling answered");
        Ok(answer)
    }

    /// Start feeding inbound tracks into the hub
    ///
    /// Spawns one task that starts an ingress worker for every track the
    /// negotiator yields and owns those workers until they finish. Returns
    /// `false` if that task is already running.
    pub async fn start_stream(&self) -> bool {
        let mut task = self.stream_task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("Inbound stream already running");
            return false;
        }

        let negotiator = Arc::clone(&self.negotiator);
        let source = self.source.clone();
        let cancel = self.cancel.child_token();
        *task = Some(tokio::spawn(accept_tracks(negotiator, source, cancel)));
        true
    }

    /// The broadcast hub
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// The session coordinator
    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    /// Hub delivery counters
    pub fn stats(&self) -> HubStats {
        self.hub.stats()
    }

    /// Stop every worker, leave every channel and stop the hub
    ///
    /// Returns once every ingress worker has exited.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let task = self.stream_task.lock().await.take();
        if let Some(task) = task {
            match task.await {
                Ok(tracks) => tracing::debug!(tracks = tracks.len(), "Inbound tracks drained"),
                Err(e) => tracing::error!(error = %e, "Track acceptor failed"),
            }
        }

        self.coordinator.leave_all().await;
        self.hub.shutdown().await;
        tracing::info!("Relay shut down");
    }
}

async fn accept_tracks(
    negotiator: Arc<dyn PeerNegotiator>,
    source: PacketSender,
    cancel: CancellationToken,
) -> Vec<IngressStats> {
    let mut workers = JoinSet::new();
    let mut finished = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(result) = workers.join_next(), if !workers.is_empty() => {
                record_track(result, &mut finished);
            }
            track = negotiator.next_track() => {
                let Some(track) = track else {
                    tracing::debug!("Peer connection closed, no more tracks");
                    break;
                };
                workers.spawn(IngressAdapter::new(track, source.clone(), cancel.child_token()).run());
            }
        }
    }

    // Workers hold child tokens, so after cancellation this only waits for
    // them to notice
    while let Some(result) = workers.join_next().await {
        record_track(result, &mut finished);
    }
    finished
}

fn record_track(result: std::result::Result<IngressStats, JoinError>, finished: &mut Vec<IngressStats>) {
    match result {
        Ok(stats) => {
            tracing::info!(
                track = %stats.track_id,
                packets = stats.packets_sent,
                bitrate = stats.bitrate(),
                duration_secs = stats.duration().as_secs(),
                "Inbound track finished"
            );
            finished.push(stats);
        }
        Err(e) => tracing::error!(error = %e, "Ingress worker failed"),
    }
}
