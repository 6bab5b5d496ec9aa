//! Error types for avatar session establishment and speech.

use std::time::Duration;

/// Errors raised by the session workflow.
///
/// Per-utterance synthesis failures are not errors: they are reported as
/// [`avatar_types::UtteranceOutcome`] values and never close the session.
/// Relay discovery degradation is not an error either; it is recorded on
/// the session and logged.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Provider credentials are missing or could not be obtained.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The avatar-start handshake was rejected or the connection failed
    /// before media arrived. The session must be rebuilt.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// Handshake plus first media track did not complete in time.
    #[error("negotiation timed out after {0:?}")]
    NegotiationTimeout(Duration),

    /// Caller input was rejected before any network interaction.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The operation requires a `Ready` session.
    #[error("session not ready: {0}")]
    NotReady(String),

    /// Another speak call or initialization is still outstanding.
    #[error("busy: {0}")]
    Busy(String),

    /// The peer-connection backend failed while building the connection.
    #[error("peer connection error: {0}")]
    Peer(String),
}

impl SessionError {
    /// Returns `true` for errors that end the current session and require a
    /// full rebuild, as opposed to per-call rejections.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::Negotiation(_)
                | Self::NegotiationTimeout(_)
                | Self::Peer(_)
        )
    }
}
