//! Shared types for the avatar chat workspace.
//!
//! This crate holds the domain values that cross crate boundaries: the
//! transient speech [`Credential`], the [`RelayServer`] descriptors that make
//! up a peer connection's ICE server set, media kinds and transceiver
//! directions, and per-utterance synthesis outcomes. The JSON bodies exchanged
//! between the relay server and its clients live in [`wire`].
//!
//! Nothing here performs I/O. Both the server (`avatar-server`) and the client
//! session core (`avatar-session`) depend on this crate, and on nothing else
//! in the workspace, for shared definitions.

pub mod wire;

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Public STUN server used when relay discovery yields no servers.
pub const FALLBACK_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// A short-lived credential for the speech provider.
///
/// The token is opaque. It is never written to logs: the `Debug`
/// implementation redacts it and callers log `token.len()` at most.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token (or, in development mode, the subscription key itself).
    pub token: String,
    /// Provider region, e.g. `westus2`.
    pub region: String,
}

impl Credential {
    pub fn new(token: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            region: region.into(),
        }
    }

    /// Returns `true` if either the token or the region is blank.
    pub fn is_incomplete(&self) -> bool {
        self.token.trim().is_empty() || self.region.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("region", &self.region)
            .finish()
    }
}

/// An ICE (STUN/TURN) server descriptor.
///
/// Serialized with the field names browsers expect in `RTCIceServer`.
/// `urls` accepts either a single string or a list when deserializing.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelayServer {
    #[serde(deserialize_with = "one_or_many")]
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub credential: String,
}

impl RelayServer {
    /// A credential-less STUN entry.
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: String::new(),
            credential: String::new(),
        }
    }

    /// The public STUN entry used when discovery comes back empty.
    pub fn fallback() -> Self {
        Self::stun(FALLBACK_STUN_URL)
    }
}

impl fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let credential = if self.credential.is_empty() {
            ""
        } else {
            "[REDACTED]"
        };
        f.debug_struct("RelayServer")
            .field("urls", &self.urls)
            .field("username", &self.username)
            .field("credential", &credential)
            .finish()
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(url) => vec![url],
        OneOrMany::Many(urls) => urls,
    })
}

/// Kind of media carried by a transceiver or a received track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared direction of a transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

/// How a single synthesis request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UtteranceOutcome {
    /// Audio was delivered through the session's media tracks.
    Completed,
    /// The provider aborted synthesis.
    Canceled { detail: String },
    /// Transport or provider error.
    Failed { detail: String },
}

impl UtteranceOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A piece of text submitted for synthesis, with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    #[serde(flatten)]
    pub outcome: UtteranceOutcome,
}
