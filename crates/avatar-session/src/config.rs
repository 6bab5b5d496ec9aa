//! Client-side session settings.

use crate::avatar::AvatarConfig;
use avatar_types::FALLBACK_STUN_URL;
use serde::Deserialize;
use std::time::Duration;

/// Settings for [`crate::AvatarController`].
///
/// Deserializable so applications can embed it in their own TOML config.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the relay server exposing `/api/speech/*`.
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    #[serde(default)]
    pub avatar: AvatarConfig,

    /// STUN entry used when relay discovery yields nothing.
    #[serde(default = "default_fallback_stun_url")]
    pub fallback_stun_url: String,

    /// Upper bound on relay discovery. Zero disables the bound.
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    /// Upper bound on the avatar-start handshake plus first media track.
    /// Zero disables the bound.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

fn default_relay_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_fallback_stun_url() -> String {
    FALLBACK_STUN_URL.to_string()
}

fn default_discovery_timeout_ms() -> u64 {
    10_000
}

fn default_handshake_timeout_ms() -> u64 {
    30_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            avatar: AvatarConfig::default(),
            fallback_stun_url: default_fallback_stun_url(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl SessionConfig {
    pub fn discovery_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.discovery_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.handshake_timeout_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
