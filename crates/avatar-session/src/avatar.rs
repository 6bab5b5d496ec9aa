//! The provider's avatar capability, modelled as trait seams.
//!
//! The avatar-start handshake (offer/answer exchange and candidate trickle
//! with the provider) is opaque to the session core: a synthesizer is asked
//! to start over a peer connection and reports success or a provider error.

use crate::peer::PeerConnection;
use async_trait::async_trait;
use avatar_types::Credential;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_character() -> String {
    "lisa".to_string()
}

fn default_style() -> String {
    "casual-sitting".to_string()
}

fn default_background_color() -> String {
    "#FFFFFFFF".to_string()
}

fn default_voice() -> String {
    "en-US-JennyNeural".to_string()
}

/// Appearance and voice of the rendered avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarConfig {
    #[serde(default = "default_character")]
    pub character: String,
    #[serde(default = "default_style")]
    pub style: String,
    /// `#RRGGBBAA`.
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            character: default_character(),
            style: default_style(),
            background_color: default_background_color(),
            voice: default_voice(),
        }
    }
}

/// Error detail reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

/// Result of a synthesis request that reached the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakResult {
    /// Audio was rendered through the session's media tracks.
    Completed,
    /// The provider aborted synthesis.
    Canceled { detail: String },
}

/// A synthesizer bound to one credential and, once started, one peer
/// connection.
#[async_trait]
pub trait AvatarSynthesizer: Send + Sync {
    /// Runs the avatar-start handshake over `peer`. Resolves once the
    /// provider reports the avatar started.
    async fn start_avatar(&self, peer: &dyn PeerConnection) -> Result<(), ProviderError>;

    /// Submits text for synthesis over the started session.
    async fn speak_text(&self, text: &str) -> Result<SpeakResult, ProviderError>;

    /// Releases provider-side resources. Must tolerate repeated calls.
    async fn close(&self);
}

/// Creates synthesizers from a credential.
#[async_trait]
pub trait AvatarConnector: Send + Sync {
    async fn connect(
        &self,
        credential: &Credential,
        config: &AvatarConfig,
    ) -> Result<Arc<dyn AvatarSynthesizer>, ProviderError>;
}
