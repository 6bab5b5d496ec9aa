//! The browser-facing surface: one controller owning at most one session.

use crate::avatar::AvatarConnector;
use crate::config::SessionConfig;
use crate::credential::{CredentialSource, HttpCredentialSource};
use crate::discovery::{resolve_ice_servers, HttpRelayDiscovery, RelayDiscovery};
use crate::error::SessionError;
use crate::lifecycle;
use crate::peer::PeerConnectionFactory;
use crate::rtc::RtcPeerFactory;
use crate::session::{Negotiator, PeerSession, SessionState};
use crate::speech::{self, AvatarHandle};
use avatar_types::{RelayServer, Utterance};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// The session the controller currently owns, ready or still negotiating.
struct CurrentSession {
    session: Arc<PeerSession>,
    handle: Option<Arc<AvatarHandle>>,
}

impl CurrentSession {
    async fn teardown(&self) {
        lifecycle::teardown(self.handle.as_deref(), Some(&self.session)).await;
    }
}

/// Clears the initializing flag however initialization ends.
struct Initializing<'a>(&'a AtomicBool);

impl Drop for Initializing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the avatar session for one client.
///
/// State transitions of every session the controller builds are published
/// on a single watch channel, so UI code can gate input on
/// [`SessionState::Ready`] without polling.
pub struct AvatarController {
    credentials: Arc<dyn CredentialSource>,
    discovery: Arc<dyn RelayDiscovery>,
    negotiator: Negotiator,
    fallback_stun_url: String,
    discovery_timeout: Option<Duration>,
    current: Mutex<Option<CurrentSession>>,
    initializing: AtomicBool,
    status: watch::Sender<SessionState>,
}

impl AvatarController {
    pub fn new(
        config: &SessionConfig,
        credentials: Arc<dyn CredentialSource>,
        discovery: Arc<dyn RelayDiscovery>,
        factory: Arc<dyn PeerConnectionFactory>,
        connector: Arc<dyn AvatarConnector>,
    ) -> Self {
        let negotiator = Negotiator::new(
            factory,
            connector,
            config.avatar.clone(),
            config.handshake_timeout(),
        );
        let (status, _) = watch::channel(SessionState::Idle);
        Self {
            credentials,
            discovery,
            negotiator,
            fallback_stun_url: config.fallback_stun_url.clone(),
            discovery_timeout: config.discovery_timeout(),
            current: Mutex::new(None),
            initializing: AtomicBool::new(false),
            status,
        }
    }

    /// A controller talking to the relay at `config.relay_url`, building
    /// WebRTC peer connections.
    pub fn connect(
        config: &SessionConfig,
        connector: Arc<dyn AvatarConnector>,
    ) -> Result<Self, SessionError> {
        let credentials = HttpCredentialSource::new(&config.relay_url)?;
        let discovery = HttpRelayDiscovery::new(&config.relay_url, config.discovery_timeout())?;
        Ok(Self::new(
            config,
            Arc::new(credentials),
            Arc::new(discovery),
            Arc::new(RtcPeerFactory::new()),
            connector,
        ))
    }

    fn current(&self) -> MutexGuard<'_, Option<CurrentSession>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SessionState {
        *self.status.borrow()
    }

    /// Stream of state transitions across session rebuilds.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.status.subscribe()
    }

    /// The current session, if any. It may still be negotiating.
    pub fn session(&self) -> Option<Arc<PeerSession>> {
        self.current().as_ref().map(|current| current.session.clone())
    }

    /// Whether the current session runs on the fallback STUN server.
    pub fn relay_fallback_used(&self) -> Option<bool> {
        self.current()
            .as_ref()
            .map(|current| current.session.relay_fallback_used())
    }

    /// Drops `session` from the slot. Returns `false` if a teardown or a
    /// newer session already took its place.
    fn forget(&self, session: &Arc<PeerSession>) -> bool {
        let mut current = self.current();
        let owned = current
            .as_ref()
            .is_some_and(|c| Arc::ptr_eq(&c.session, session));
        if owned {
            *current = None;
        }
        owned
    }

    fn fail(&self, e: &SessionError) {
        error!(error = %e, "avatar initialization failed");
        self.status.send_replace(SessionState::Failed);
    }

    async fn discover(&self, credential: &avatar_types::Credential) -> Vec<RelayServer> {
        match self.discovery_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.discovery.relay_servers(credential)).await {
                    Ok(servers) => servers,
                    Err(_) => {
                        warn!(timeout = ?limit, "relay discovery timed out");
                        Vec::new()
                    }
                }
            }
            None => self.discovery.relay_servers(credential).await,
        }
    }

    /// Builds a session and drives it to `Ready`.
    ///
    /// Any previous session is torn down first. On failure nothing is left
    /// open and the controller reports [`SessionState::Failed`].
    ///
    /// The session under negotiation is owned by the controller, so a caller
    /// that drops this future can still call [`teardown`](Self::teardown).
    /// Without one, the abandoned session is released in the background.
    pub async fn initialize_avatar(&self) -> Result<(), SessionError> {
        if self.initializing.swap(true, Ordering::SeqCst) {
            return Err(SessionError::Busy(
                "avatar initialization already in progress".to_string(),
            ));
        }
        let _initializing = Initializing(&self.initializing);
        self.initialize().await
    }

    async fn initialize(&self) -> Result<(), SessionError> {
        let previous = self.current().take();
        if let Some(previous) = previous {
            info!(session_id = %previous.session.id(), "replacing existing avatar session");
            previous.teardown().await;
        }

        info!("starting avatar initialization");
        let credential = self.credentials.credential().await.inspect_err(|e| self.fail(e))?;

        let discovered = self.discover(&credential).await;
        let ice = resolve_ice_servers(discovered, &self.fallback_stun_url);

        let session = self
            .negotiator
            .create_session(ice, Some(self.status.clone()))
            .await
            .inspect_err(|e| self.fail(e))?;

        *self.current() = Some(CurrentSession {
            session: session.clone(),
            handle: None,
        });

        let negotiated = self
            .negotiator
            .negotiate_with(&session, &credential, |handle| {
                let mut current = self.current();
                if let Some(current) = current
                    .as_mut()
                    .filter(|c| Arc::ptr_eq(&c.session, &session))
                {
                    current.handle = Some(handle.clone());
                }
            })
            .await;

        if let Err(e) = negotiated {
            if self.forget(&session) {
                self.fail(&e);
            } else {
                info!(session_id = %session.id(), error = %e, "initialization ended by teardown");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Speaks `text` through the live session.
    pub async fn speak(&self, text: &str) -> Result<Utterance, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::Validation("text must not be empty".to_string()));
        }
        let handle = self
            .current()
            .as_ref()
            .and_then(|current| current.handle.clone())
            .ok_or_else(|| SessionError::NotReady("no avatar session".to_string()))?;
        speech::speak(&handle, text).await
    }

    /// Tears down the current session, synthesizer first, including one
    /// still negotiating. Idempotent.
    ///
    /// Afterwards the status stream reports [`SessionState::Closed`] unless
    /// no session was ever started.
    pub async fn teardown(&self) {
        let current = self.current().take();
        match current {
            Some(current) => {
                current.teardown().await;
                info!(session_id = %current.session.id(), "avatar session torn down");
            }
            None => info!("teardown requested with no live session"),
        }
        self.status.send_if_modified(|state| {
            if matches!(*state, SessionState::Idle | SessionState::Closed) {
                return false;
            }
            *state = SessionState::Closed;
            true
        });
    }
}
