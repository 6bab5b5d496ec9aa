#![allow(dead_code)]

use async_trait::async_trait;
use avatar_session::{
    AvatarConfig, AvatarConnector, AvatarSynthesizer, ConnectionState, CredentialSource,
    PeerConnection, PeerConnectionFactory, PeerEvent, ProviderError, RelayDiscovery,
    SessionError, SpeakResult,
};
use avatar_types::{Credential, Direction, MediaKind, RelayServer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Ordered record of close calls across fakes.
pub type Trace = Arc<Mutex<Vec<&'static str>>>;

pub fn new_trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn credential() -> Credential {
    Credential::new("short-lived-token", "westus2")
}

pub fn turn(url: &str) -> RelayServer {
    RelayServer {
        urls: vec![url.to_string()],
        username: "relay-user".to_string(),
        credential: "relay-pass".to_string(),
    }
}

/// Polls `condition` until it holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

// ---------------------------------------------------------------------------
// Peer connections
// ---------------------------------------------------------------------------

pub struct FakePeer {
    events: mpsc::UnboundedSender<PeerEvent>,
    trace: Trace,
    pub ice_servers: Vec<RelayServer>,
    pub transceivers: Mutex<Vec<(MediaKind, Direction)>>,
    pub offers: AtomicUsize,
    pub close_calls: AtomicUsize,
}

impl FakePeer {
    pub fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn add_transceiver(
        &self,
        kind: MediaKind,
        direction: Direction,
    ) -> Result<(), SessionError> {
        self.transceivers.lock().unwrap().push((kind, direction));
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, SessionError> {
        self.offers.fetch_add(1, Ordering::SeqCst);
        Ok("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n".to_string())
    }

    async fn set_remote_answer(&self, _sdp: String) -> Result<(), SessionError> {
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        ConnectionState::New
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.trace.lock().unwrap().push("peer.close");
        Ok(())
    }
}

pub struct FakePeerFactory {
    trace: Trace,
    pub peers: Mutex<Vec<Arc<FakePeer>>>,
    pub fail_with: Option<String>,
}

impl FakePeerFactory {
    pub fn new(trace: Trace) -> Arc<Self> {
        Arc::new(Self {
            trace,
            peers: Mutex::new(Vec::new()),
            fail_with: None,
        })
    }

    pub fn failing(trace: Trace, reason: &str) -> Arc<Self> {
        Arc::new(Self {
            trace,
            peers: Mutex::new(Vec::new()),
            fail_with: Some(reason.to_string()),
        })
    }

    pub fn created(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn last_peer(&self) -> Arc<FakePeer> {
        self.peers
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no peer connection created")
    }
}

#[async_trait]
impl PeerConnectionFactory for FakePeerFactory {
    async fn create(
        &self,
        ice_servers: &[RelayServer],
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>, SessionError> {
        if let Some(reason) = &self.fail_with {
            return Err(SessionError::Peer(reason.clone()));
        }
        let peer = Arc::new(FakePeer {
            events,
            trace: self.trace.clone(),
            ice_servers: ice_servers.to_vec(),
            transceivers: Mutex::new(Vec::new()),
            offers: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        });
        self.peers.lock().unwrap().push(peer.clone());
        Ok(peer)
    }
}

// ---------------------------------------------------------------------------
// Avatar provider
// ---------------------------------------------------------------------------

/// How the fake provider answers `start_avatar`.
#[derive(Clone)]
pub enum Handshake {
    /// Succeeds after the peer reports the given tracks.
    Succeed(Vec<MediaKind>),
    /// Rejects with the given provider detail.
    Reject(String),
    /// Waits for `release` to be notified, then succeeds without tracks.
    Gated(Arc<Notify>),
    /// Never completes.
    Hang,
}

pub struct FakeSynthesizer {
    factory: Arc<FakePeerFactory>,
    trace: Trace,
    handshake: Mutex<Handshake>,
    pub started: AtomicBool,
    pub speak_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub speak_result: Mutex<Result<SpeakResult, ProviderError>>,
    pub speak_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeSynthesizer {
    pub fn new(factory: Arc<FakePeerFactory>, trace: Trace, handshake: Handshake) -> Arc<Self> {
        Arc::new(Self {
            factory,
            trace,
            handshake: Mutex::new(handshake),
            started: AtomicBool::new(false),
            speak_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            speak_result: Mutex::new(Ok(SpeakResult::Completed)),
            speak_gate: Mutex::new(None),
        })
    }

    /// Changes how later handshakes are answered.
    pub fn set_handshake(&self, handshake: Handshake) {
        *self.handshake.lock().unwrap() = handshake;
    }

    pub fn speak_calls(&self) -> usize {
        self.speak_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvatarSynthesizer for FakeSynthesizer {
    async fn start_avatar(&self, peer: &dyn PeerConnection) -> Result<(), ProviderError> {
        let offer = peer
            .create_offer()
            .await
            .map_err(|e| ProviderError::new(e.to_string()))?;
        assert!(offer.starts_with("v=0"));

        let handshake = self.handshake.lock().unwrap().clone();
        match handshake {
            Handshake::Succeed(tracks) => {
                let fake = self.factory.last_peer();
                for kind in tracks {
                    fake.emit(PeerEvent::TrackReceived(kind));
                }
            }
            Handshake::Reject(detail) => return Err(ProviderError::new(detail)),
            Handshake::Gated(release) => release.notified().await,
            Handshake::Hang => std::future::pending::<()>().await,
        }

        peer.set_remote_answer("v=0\r\n".to_string())
            .await
            .map_err(|e| ProviderError::new(e.to_string()))?;
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn speak_text(&self, _text: &str) -> Result<SpeakResult, ProviderError> {
        self.speak_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.speak_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.speak_result.lock().unwrap().clone()
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.trace.lock().unwrap().push("synthesizer.close");
    }
}

pub struct FakeConnector {
    pub synthesizer: Arc<FakeSynthesizer>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(synthesizer: Arc<FakeSynthesizer>) -> Arc<Self> {
        Arc::new(Self {
            synthesizer,
            connects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AvatarConnector for FakeConnector {
    async fn connect(
        &self,
        credential: &Credential,
        config: &AvatarConfig,
    ) -> Result<Arc<dyn AvatarSynthesizer>, ProviderError> {
        assert!(!credential.is_incomplete());
        assert!(!config.character.is_empty());
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.synthesizer.clone())
    }
}

// ---------------------------------------------------------------------------
// Credential and discovery sources
// ---------------------------------------------------------------------------

pub struct StaticCredentials(pub Result<Credential, String>);

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn credential(&self) -> Result<Credential, SessionError> {
        self.0.clone().map_err(SessionError::Configuration)
    }
}

pub struct StaticDiscovery {
    pub servers: Vec<RelayServer>,
    pub calls: AtomicUsize,
}

impl StaticDiscovery {
    pub fn new(servers: Vec<RelayServer>) -> Arc<Self> {
        Arc::new(Self {
            servers,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RelayDiscovery for StaticDiscovery {
    async fn relay_servers(&self, _credential: &Credential) -> Vec<RelayServer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.servers.clone()
    }
}
