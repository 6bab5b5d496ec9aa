//! Speech provider access for the avatar relay server.
//!
//! Wraps the provider's REST surface behind [`SpeechService`]:
//!
//! - short-lived token issuance, so the subscription key stays server-side
//! - avatar relay (TURN) credential lookup for peer connections
//! - session-less text-to-speech returning RIFF/WAV audio
//!
//! The service is configured through [`SpeechConfig`], whose `Debug`
//! implementation never prints the key.

pub mod config;
pub mod error;
pub mod service;
pub mod tts;

pub use config::{SpeechConfig, TokenMode};
pub use error::SpeechError;
pub use service::SpeechService;
pub use tts::{SynthesizedAudio, MAX_TTS_INPUT_BYTES};
