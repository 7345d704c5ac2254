//! In-memory stand-ins for the external collaborators, used by unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use crate::egress::AudioSink;
use crate::error::{ConnectionError, Error, Result, SignalingError, SinkError};
use crate::hub::RealtimePacket;
use crate::ingress::{InboundTrack, MediaFrame};
use crate::signaling::{PeerNegotiator, SessionDescription};
use crate::voice::{Destination, GuildInfo, VoiceChannelInfo, VoiceClient};

/// Sink recording everything it is sent
#[derive(Default)]
pub struct FakeSink {
    ready: AtomicBool,
    ready_notify: Notify,
    closed: AtomicBool,
    stalled: AtomicBool,
    fail_next: Mutex<Option<String>>,
    received: Mutex<Vec<RealtimePacket>>,
}

impl FakeSink {
    pub fn ready() -> Arc<Self> {
        let sink = Self::default();
        sink.ready.store(true, Ordering::SeqCst);
        Arc::new(sink)
    }

    pub fn unready() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.ready_notify.notify_waiters();
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Make every send hang forever
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn fail_next(&self, reason: &str) {
        *self.fail_next.lock().unwrap() = Some(reason.to_string());
    }

    pub fn received(&self) -> Vec<RealtimePacket> {
        self.received.lock().unwrap().clone()
    }

    pub fn sequences(&self) -> Vec<u16> {
        self.received().iter().map(|p| p.sequence_number).collect()
    }

    pub fn timestamps(&self) -> Vec<u32> {
        self.received().iter().map(|p| p.timestamp).collect()
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn ready(&self) {
        loop {
            let notified = self.ready_notify.notified();
            if self.is_ready() {
                return;
            }
            notified.await;
        }
    }

    async fn send(&self, packet: RealtimePacket) -> std::result::Result<(), SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        let failure = self.fail_next.lock().unwrap().take();
        if let Some(reason) = failure {
            return Err(SinkError::Failed(reason));
        }
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.received.lock().unwrap().push(packet);
        Ok(())
    }
}

/// Track fed through a channel; ends when the sender is dropped
pub struct FakeTrack {
    id: String,
    frames: mpsc::Receiver<MediaFrame>,
    error: Option<String>,
}

impl FakeTrack {
    pub fn channel(id: &str) -> (mpsc::Sender<MediaFrame>, Self) {
        let (tx, rx) = mpsc::channel(64);
        let track = Self {
            id: id.to_string(),
            frames: rx,
            error: None,
        };
        (tx, track)
    }

    /// Track whose first read fails
    pub fn failing(id: &str, reason: &str) -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self {
            id: id.to_string(),
            frames: rx,
            error: Some(reason.to_string()),
        }
    }
}

#[async_trait]
impl InboundTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn codec(&self) -> &str {
        "audio/opus"
    }

    async fn read_frame(&mut self) -> Result<Option<MediaFrame>> {
        if let Some(reason) = self.error.take() {
            return Err(Error::Track(reason));
        }
        Ok(self.frames.recv().await)
    }
}

/// Voice client keeping one [`FakeSink`] per joined channel
#[derive(Default)]
pub struct FakeVoiceClient {
    started: AtomicBool,
    closed: AtomicBool,
    fail_start: AtomicBool,
    fail_join: Mutex<HashSet<String>>,
    fail_leave: AtomicBool,
    joins: AtomicUsize,
    delays: Mutex<HashMap<String, Duration>>,
    leaves: Mutex<Vec<Destination>>,
    sinks: Mutex<HashMap<String, Arc<FakeSink>>>,
}

impl FakeVoiceClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn fail_join(&self, channel_id: &str) {
        self.fail_join.lock().unwrap().insert(channel_id.to_string());
    }

    pub fn fail_leave(&self) {
        self.fail_leave.store(true, Ordering::SeqCst);
    }

    /// Make every join and leave of `channel_id` take `delay`
    pub fn delay(&self, channel_id: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), delay);
    }

    async fn wait(&self, destination: &Destination) {
        let delay = self.delays.lock().unwrap().get(&destination.channel_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn leaves(&self) -> Vec<Destination> {
        self.leaves.lock().unwrap().clone()
    }

    /// Sink handed out by the latest join of `channel_id`
    pub fn sink(&self, channel_id: &str) -> Option<Arc<FakeSink>> {
        self.sinks.lock().unwrap().get(channel_id).cloned()
    }
}

#[async_trait]
impl VoiceClient for FakeVoiceClient {
    async fn start(&self, credential: &str) -> std::result::Result<(), ConnectionError> {
        if self.fail_start.load(Ordering::SeqCst) || credential.is_empty() {
            return Err(ConnectionError::Start("invalid token".into()));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn guilds(&self) -> std::result::Result<Vec<GuildInfo>, ConnectionError> {
        if !self.is_started() {
            return Err(ConnectionError::NotStarted);
        }
        Ok(vec![GuildInfo {
            id: "g1".into(),
            name: "Tabletop".into(),
            icon: String::new(),
            voice_channels: vec![VoiceChannelInfo {
                id: "c1".into(),
                name: "General".into(),
            }],
        }])
    }

    async fn join(
        &self,
        destination: &Destination,
    ) -> std::result::Result<Arc<dyn AudioSink>, ConnectionError> {
        self.wait(destination).await;
        if self.fail_join.lock().unwrap().contains(&destination.channel_id) {
            return Err(ConnectionError::Join {
                destination: destination.clone(),
                reason: "voice server unreachable".into(),
            });
        }
        self.joins.fetch_add(1, Ordering::SeqCst);

        let sink = FakeSink::ready();
        self.sinks
            .lock()
            .unwrap()
            .insert(destination.channel_id.clone(), Arc::clone(&sink));
        Ok(sink)
    }

    async fn leave(&self, destination: &Destination) -> std::result::Result<(), ConnectionError> {
        self.wait(destination).await;
        self.leaves.lock().unwrap().push(destination.clone());
        if self.fail_leave.load(Ordering::SeqCst) {
            return Err(ConnectionError::Leave {
                destination: destination.clone(),
                reason: "gateway gone".into(),
            });
        }
        if let Some(sink) = self.sinks.lock().unwrap().get(&destination.channel_id) {
            sink.close();
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.started.store(false, Ordering::SeqCst);
    }
}

/// Negotiator answering any well-formed offer and yielding queued tracks
pub struct FakeNegotiator {
    tracks: tokio::sync::Mutex<mpsc::Receiver<Box<dyn InboundTrack>>>,
}

impl FakeNegotiator {
    pub fn new() -> (mpsc::Sender<Box<dyn InboundTrack>>, Arc<Self>) {
        let (tx, rx) = mpsc::channel(8);
        let negotiator = Self {
            tracks: tokio::sync::Mutex::new(rx),
        };
        (tx, Arc::new(negotiator))
    }
}

#[async_trait]
impl PeerNegotiator for FakeNegotiator {
    async fn signal(&self, offer: &str) -> std::result::Result<String, SignalingError> {
        let offer = SessionDescription::parse_offer(offer)?;
        SessionDescription::answer(offer.sdp).to_json()
    }

    async fn next_track(&self) -> Option<Box<dyn InboundTrack>> {
        self.tracks.lock().await.recv().await
    }
}
