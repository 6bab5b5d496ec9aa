//! Submitting text to a ready avatar session.

use crate::avatar::{AvatarSynthesizer, SpeakResult};
use crate::error::SessionError;
use crate::session::{PeerSession, SessionState};
use avatar_types::{Utterance, UtteranceOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// A synthesizer bound to a credential and a peer session.
///
/// The handle references its session without owning it: the peer
/// connection is closed by whoever owns the [`PeerSession`], after the
/// handle has been closed.
pub struct AvatarHandle {
    synthesizer: Arc<dyn AvatarSynthesizer>,
    session: Weak<PeerSession>,
    closed: AtomicBool,
    released: OnceCell<()>,
    in_flight: AtomicBool,
}

impl AvatarHandle {
    pub(crate) fn new(synthesizer: Arc<dyn AvatarSynthesizer>, session: &Arc<PeerSession>) -> Self {
        Self {
            synthesizer,
            session: Arc::downgrade(session),
            closed: AtomicBool::new(false),
            released: OnceCell::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub(crate) fn synthesizer(&self) -> &dyn AvatarSynthesizer {
        &*self.synthesizer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// State of the bound session; `Closed` once the session is gone.
    pub fn session_state(&self) -> SessionState {
        self.session
            .upgrade()
            .map(|session| session.state())
            .unwrap_or(SessionState::Closed)
    }

    /// `true` while speech requests are accepted.
    pub fn is_usable(&self) -> bool {
        !self.is_closed() && self.session_state() == SessionState::Ready
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::NotReady("avatar handle is closed".to_string()));
        }
        match self.session_state() {
            SessionState::Ready => Ok(()),
            other => Err(SessionError::NotReady(format!("session is {:?}", other))),
        }
    }

    fn begin_request(&self) -> Result<InFlight<'_>, SessionError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(SessionError::Busy(
                "a previous utterance is still being spoken".to_string(),
            ));
        }
        Ok(InFlight(&self.in_flight))
    }

    /// Closes the synthesizer. Idempotent; concurrent callers all return
    /// once the single close has finished.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.released
            .get_or_init(|| async {
                debug!("closing avatar synthesizer");
                self.synthesizer.close().await;
            })
            .await;
    }
}

impl std::fmt::Debug for AvatarHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarHandle")
            .field("closed", &self.is_closed())
            .field("session_state", &self.session_state())
            .finish()
    }
}

/// Clears the in-flight flag when the request finishes or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Speaks `text` through the avatar bound to `handle`.
///
/// Rejections happen before any provider call: blank text is a
/// [`SessionError::Validation`], a closed handle or non-`Ready` session is
/// [`SessionError::NotReady`], and a call made while another is outstanding
/// is [`SessionError::Busy`]. Provider cancellations and failures are
/// reported in the returned [`Utterance`] and leave the session usable.
pub async fn speak(handle: &AvatarHandle, text: &str) -> Result<Utterance, SessionError> {
    if text.trim().is_empty() {
        return Err(SessionError::Validation("text must not be empty".to_string()));
    }
    handle.ensure_ready()?;
    let _in_flight = handle.begin_request()?;

    let outcome = match handle.synthesizer.speak_text(text).await {
        Ok(SpeakResult::Completed) => {
            info!(chars = text.chars().count(), "utterance completed");
            UtteranceOutcome::Completed
        }
        Ok(SpeakResult::Canceled { detail }) => {
            warn!(detail = %detail, "utterance canceled by provider");
            UtteranceOutcome::Canceled { detail }
        }
        Err(e) => {
            warn!(error = %e, "utterance failed");
            UtteranceOutcome::Failed {
                detail: e.to_string(),
            }
        }
    };

    Ok(Utterance {
        text: text.to_string(),
        outcome,
    })
}
