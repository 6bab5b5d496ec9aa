use crate::error::SpeechError;
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_voice() -> String {
    "en-US-JennyNeural".to_string()
}

fn default_output_format() -> String {
    "riff-24khz-16bit-mono-pcm".to_string()
}

/// How `GET /api/speech/token` hands credentials to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenMode {
    /// Exchange the subscription key for a short-lived bearer token.
    #[default]
    IssueToken,
    /// Hand out the subscription key itself. Development only.
    SubscriptionKey,
}

impl std::str::FromStr for TokenMode {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "issue_token" => Ok(Self::IssueToken),
            "subscription_key" => Ok(Self::SubscriptionKey),
            other => Err(SpeechError::Config(format!("unknown token mode: {}", other))),
        }
    }
}

/// Speech provider settings. The key never leaves the server except in
/// [`TokenMode::SubscriptionKey`].
#[derive(Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default, skip_serializing)]
    pub key: String,
    #[serde(default)]
    pub region: String,
    /// Voice used for session-less synthesis.
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Audio format requested from the REST synthesis endpoint.
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default)]
    pub token_mode: TokenMode,
    /// Overrides `https://{region}.tts.speech.microsoft.com`.
    #[serde(default)]
    pub tts_base_url: Option<String>,
    /// Overrides `https://{region}.api.cognitive.microsoft.com`.
    #[serde(default)]
    pub sts_base_url: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            region: String::new(),
            voice: default_voice(),
            output_format: default_output_format(),
            token_mode: TokenMode::default(),
            tts_base_url: None,
            sts_base_url: None,
        }
    }
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("key", &"[REDACTED]")
            .field("region", &self.region)
            .field("voice", &self.voice)
            .field("output_format", &self.output_format)
            .field("token_mode", &self.token_mode)
            .field("tts_base_url", &self.tts_base_url)
            .field("sts_base_url", &self.sts_base_url)
            .finish()
    }
}

impl SpeechConfig {
    pub fn new(key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    /// Returns `true` if both key and region are set.
    pub fn is_configured(&self) -> bool {
        !self.key.trim().is_empty() && !self.region.trim().is_empty()
    }

    /// Returns `(key, region)` or [`SpeechError::NotConfigured`].
    pub fn require(&self) -> Result<(&str, &str), SpeechError> {
        if self.is_configured() {
            Ok((self.key.trim(), self.region.trim()))
        } else {
            Err(SpeechError::NotConfigured)
        }
    }

    pub(crate) fn tts_base(&self, region: &str) -> String {
        match &self.tts_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.tts.speech.microsoft.com", region),
        }
    }

    pub(crate) fn sts_base(&self, region: &str) -> String {
        match &self.sts_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.api.cognitive.microsoft.com", region),
        }
    }
}
