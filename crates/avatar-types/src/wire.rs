//! JSON bodies exchanged between the relay server and its clients.
//!
//! Field names follow the browser-facing API (`iceServers`, `audioData`),
//! so these structs are used verbatim by both the axum handlers and the
//! reqwest-based client in `avatar-session`.

use crate::RelayServer;
use serde::{Deserialize, Serialize};

/// Body of `GET /api/speech/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub region: String,
}

/// Body of `GET /api/speech/ice-token`.
///
/// `ice_servers` is empty whenever the upstream relay lookup failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IceServersResponse {
    #[serde(rename = "iceServers", default)]
    pub ice_servers: Vec<RelayServer>,
}

/// Body of `POST /api/speech/synthesize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesizeRequest {
    #[serde(default)]
    pub text: String,
}

/// Successful response of `POST /api/speech/synthesize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizeResponse {
    pub success: bool,
    /// Base64-encoded RIFF/WAV audio.
    #[serde(rename = "audioData")]
    pub audio_data: String,
    /// Audio duration in 100-nanosecond ticks.
    pub duration: u64,
}

/// Error body returned by every failing relay endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
