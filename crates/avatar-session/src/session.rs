//! Peer sessions and the negotiator that drives them to `Ready`.
//!
//! A session moves `Created -> Negotiating -> Ready -> Closed`, or ends in
//! `Failed` when negotiation does not complete. `Ready` requires both a
//! successful avatar-start handshake and at least one received media track;
//! these may arrive in either order.

use crate::avatar::{AvatarConfig, AvatarConnector};
use crate::discovery::IceSelection;
use crate::error::SessionError;
use crate::peer::{ConnectionState, PeerConnection, PeerConnectionFactory, PeerEvent};
use crate::speech::AvatarHandle;
use avatar_types::{Credential, Direction, MediaKind, RelayServer};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle state of an avatar session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has been built yet.
    Idle,
    Created,
    Negotiating,
    Ready,
    Failed,
    Closed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

#[derive(Debug)]
struct Readiness {
    state: SessionState,
    handshake_complete: bool,
    tracks: HashSet<MediaKind>,
}

/// A peer connection plus its declared transceivers and readiness.
pub struct PeerSession {
    id: Uuid,
    peer: Arc<dyn PeerConnection>,
    ice: IceSelection,
    readiness: Mutex<Readiness>,
    state_tx: watch::Sender<SessionState>,
    observer: Option<watch::Sender<SessionState>>,
    released: OnceCell<()>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl PeerSession {
    fn new(
        peer: Arc<dyn PeerConnection>,
        ice: IceSelection,
        observer: Option<watch::Sender<SessionState>>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(SessionState::Created);
        if let Some(observer) = &observer {
            observer.send_replace(SessionState::Created);
        }
        Arc::new(Self {
            id: Uuid::new_v4(),
            peer,
            ice,
            readiness: Mutex::new(Readiness {
                state: SessionState::Created,
                handshake_complete: false,
                tracks: HashSet::new(),
            }),
            state_tx,
            observer,
            released: OnceCell::new(),
            pump: Mutex::new(None),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.readiness().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Stream of state transitions for this session.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// The ICE server set the peer connection was built with. Never empty.
    pub fn ice_servers(&self) -> &[RelayServer] {
        &self.ice.servers
    }

    /// Whether discovery degraded to the fallback STUN server.
    pub fn relay_fallback_used(&self) -> bool {
        self.ice.fallback_used
    }

    pub fn peer(&self) -> &dyn PeerConnection {
        &*self.peer
    }

    /// Media kinds delivered to the track-received callback so far.
    pub fn tracks_received(&self) -> Vec<MediaKind> {
        self.readiness().tracks.iter().copied().collect()
    }

    fn readiness(&self) -> MutexGuard<'_, Readiness> {
        // Readiness is plain data; a panicked writer cannot leave it torn.
        self.readiness
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, readiness: &mut Readiness, next: SessionState) {
        if readiness.state == next {
            return;
        }
        info!(session_id = %self.id, from = ?readiness.state, to = ?next, "session state changed");
        readiness.state = next;
        self.state_tx.send_replace(next);
        if let Some(observer) = &self.observer {
            observer.send_replace(next);
        }
    }

    fn promote_if_ready(&self, readiness: &mut Readiness) {
        if readiness.state == SessionState::Negotiating
            && readiness.handshake_complete
            && !readiness.tracks.is_empty()
        {
            self.transition(readiness, SessionState::Ready);
        }
    }

    fn begin_negotiation(&self) -> Result<(), SessionError> {
        let mut readiness = self.readiness();
        if readiness.state != SessionState::Created {
            return Err(SessionError::NotReady(format!(
                "cannot negotiate a session in state {:?}",
                readiness.state
            )));
        }
        self.transition(&mut readiness, SessionState::Negotiating);
        Ok(())
    }

    fn handshake_complete(&self) {
        let mut readiness = self.readiness();
        readiness.handshake_complete = true;
        self.promote_if_ready(&mut readiness);
    }

    fn record_track(&self, kind: MediaKind) {
        let mut readiness = self.readiness();
        if readiness.tracks.insert(kind) {
            debug!(session_id = %self.id, %kind, "media track arrived");
        }
        self.promote_if_ready(&mut readiness);
    }

    fn connection_state_changed(&self, state: ConnectionState) {
        if !state.is_terminal() {
            debug!(session_id = %self.id, ?state, "connection state update");
            return;
        }
        let mut readiness = self.readiness();
        match readiness.state {
            SessionState::Ready => {
                warn!(session_id = %self.id, ?state, "peer connection ended, closing session");
                self.transition(&mut readiness, SessionState::Closed);
            }
            current if !current.is_terminal() => {
                warn!(session_id = %self.id, ?state, "peer connection ended during negotiation");
                self.transition(&mut readiness, SessionState::Failed);
            }
            _ => {}
        }
    }

    fn start_pump(self: &Arc<Self>, events: mpsc::UnboundedReceiver<PeerEvent>) {
        let handle = tokio::spawn(pump_events(Arc::downgrade(self), events));
        *self.pump.lock().unwrap_or_else(|p| p.into_inner()) = Some(handle);
    }

    /// Waits until the session is `Ready`, or fails if it ends first.
    async fn wait_ready(&self) -> Result<(), SessionError> {
        let mut rx = self.subscribe();
        let state = rx
            .wait_for(|state| *state == SessionState::Ready || state.is_terminal())
            .await
            .map(|state| *state)
            .map_err(|_| SessionError::Negotiation("session dropped".to_string()))?;
        match state {
            SessionState::Ready => Ok(()),
            other => Err(SessionError::Negotiation(format!(
                "peer connection ended before media arrived ({:?})",
                other
            ))),
        }
    }

    /// Releases the peer connection exactly once. Concurrent callers wait
    /// for that release to finish.
    async fn release(&self) {
        self.released
            .get_or_init(|| async {
                if let Some(pump) = self.pump.lock().unwrap_or_else(|p| p.into_inner()).take() {
                    pump.abort();
                }
                if let Err(e) = self.peer.close().await {
                    warn!(session_id = %self.id, error = %e, "peer connection close failed");
                }
            })
            .await;
    }

    /// Closes the peer connection. Idempotent.
    pub async fn close(&self) {
        self.release().await;
        let mut readiness = self.readiness();
        self.transition(&mut readiness, SessionState::Closed);
    }

    /// Closes the peer connection and marks the session failed, unless it
    /// already ended.
    async fn fail(&self, reason: &str) {
        self.release().await;
        let mut readiness = self.readiness();
        if readiness.state.is_terminal() {
            debug!(session_id = %self.id, reason, state = ?readiness.state, "session already ended");
            return;
        }
        warn!(session_id = %self.id, reason, "session failed");
        self.transition(&mut readiness, SessionState::Failed);
    }
}

impl std::fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("ice", &self.ice)
            .finish()
    }
}

async fn pump_events(session: Weak<PeerSession>, mut events: mpsc::UnboundedReceiver<PeerEvent>) {
    while let Some(event) = events.recv().await {
        let Some(session) = session.upgrade() else {
            break;
        };
        match event {
            PeerEvent::TrackReceived(kind) => session.record_track(kind),
            PeerEvent::StateChanged(state) => session.connection_state_changed(state),
        }
    }
}

/// Releases a session in the background when a negotiation future is
/// dropped before it finishes.
struct AbandonGuard {
    session: Arc<PeerSession>,
    handle: OnceLock<Arc<AvatarHandle>>,
    armed: bool,
}

impl AbandonGuard {
    fn new(session: &Arc<PeerSession>) -> Self {
        Self {
            session: session.clone(),
            handle: OnceLock::new(),
            armed: true,
        }
    }

    fn track(&self, handle: &Arc<AvatarHandle>) {
        let _ = self.handle.set(handle.clone());
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let session = self.session.clone();
        let handle = self.handle.take();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(session_id = %session.id(), "negotiation abandoned, releasing session");
                runtime.spawn(async move {
                    if let Some(handle) = handle {
                        handle.close().await;
                    }
                    session.fail("negotiation abandoned").await;
                });
            }
            Err(_) => warn!(
                session_id = %session.id(),
                "negotiation abandoned outside a runtime, session not released"
            ),
        }
    }
}

/// Builds peer sessions and runs the avatar-start handshake over them.
pub struct Negotiator {
    factory: Arc<dyn PeerConnectionFactory>,
    connector: Arc<dyn AvatarConnector>,
    avatar: AvatarConfig,
    handshake_timeout: Option<Duration>,
}

impl Negotiator {
    pub fn new(
        factory: Arc<dyn PeerConnectionFactory>,
        connector: Arc<dyn AvatarConnector>,
        avatar: AvatarConfig,
        handshake_timeout: Option<Duration>,
    ) -> Self {
        Self {
            factory,
            connector,
            avatar,
            handshake_timeout,
        }
    }

    /// Builds a `Created` session: a peer connection over `ice` with video and
    /// audio transceivers declared `sendrecv`.
    ///
    /// Every transition is also published to `observer`, if given.
    pub async fn create_session(
        &self,
        ice: IceSelection,
        observer: Option<watch::Sender<SessionState>>,
    ) -> Result<Arc<PeerSession>, SessionError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let peer = self.factory.create(&ice.servers, events_tx).await?;
        let session = PeerSession::new(peer, ice, observer);
        session.start_pump(events_rx);

        for kind in [MediaKind::Video, MediaKind::Audio] {
            if let Err(e) = session.peer().add_transceiver(kind, Direction::SendRecv).await {
                session.fail(&e.to_string()).await;
                return Err(e);
            }
        }

        info!(
            session_id = %session.id(),
            ice_servers = session.ice_servers().len(),
            fallback = session.relay_fallback_used(),
            "peer session created"
        );
        Ok(session)
    }

    /// Runs the avatar-start handshake and waits for the first media track.
    ///
    /// On failure the synthesizer and then the peer connection are closed and
    /// the session is left `Failed`.
    pub async fn negotiate(
        &self,
        session: &Arc<PeerSession>,
        credential: &Credential,
    ) -> Result<Arc<AvatarHandle>, SessionError> {
        self.negotiate_with(session, credential, |_| {}).await
    }

    /// Like [`negotiate`](Self::negotiate), handing the synthesizer handle to
    /// `on_attach` before the handshake starts.
    ///
    /// Dropping the returned future early closes the synthesizer and then the
    /// peer connection in the background, leaving the session `Failed`.
    pub async fn negotiate_with(
        &self,
        session: &Arc<PeerSession>,
        credential: &Credential,
        on_attach: impl FnOnce(&Arc<AvatarHandle>),
    ) -> Result<Arc<AvatarHandle>, SessionError> {
        session.begin_negotiation()?;

        let guard = AbandonGuard::new(session);
        let result = async {
            let handle = self.attach(session, credential).await?;
            guard.track(&handle);
            on_attach(&handle);
            self.start(session, &handle).await?;
            Ok::<_, SessionError>(handle)
        }
        .await;
        guard.disarm();
        result
    }

    async fn attach(
        &self,
        session: &Arc<PeerSession>,
        credential: &Credential,
    ) -> Result<Arc<AvatarHandle>, SessionError> {
        match self.connector.connect(credential, &self.avatar).await {
            Ok(synthesizer) => Ok(Arc::new(AvatarHandle::new(synthesizer, session))),
            Err(e) => {
                session.fail(&e.0).await;
                Err(SessionError::Negotiation(e.0))
            }
        }
    }

    async fn start(
        &self,
        session: &Arc<PeerSession>,
        handle: &AvatarHandle,
    ) -> Result<(), SessionError> {
        if session.state().is_terminal() {
            handle.close().await;
            return Err(SessionError::NotReady(
                "session closed during negotiation".to_string(),
            ));
        }

        let handshake = async {
            handle
                .synthesizer()
                .start_avatar(session.peer())
                .await
                .map_err(|e| SessionError::Negotiation(e.0))?;
            info!(session_id = %session.id(), "avatar started");
            session.handshake_complete();
            session.wait_ready().await
        };

        let result = match self.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .unwrap_or(Err(SessionError::NegotiationTimeout(limit))),
            None => handshake.await,
        };

        match result {
            Ok(()) => {
                info!(
                    session_id = %session.id(),
                    character = %self.avatar.character,
                    "avatar session ready"
                );
                Ok(())
            }
            Err(e) => {
                handle.close().await;
                session.fail(&e.to_string()).await;
                Err(e)
            }
        }
    }
}
