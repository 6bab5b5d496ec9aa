use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("speech credentials not configured")]
    NotConfigured,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("avatar relay not available for this region or subscription")]
    RelayUnavailable,

    #[error("provider rejected credentials (status {0})")]
    Unauthorized(u16),

    #[error("provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("TTS error: {0}")]
    Tts(String),
}

impl SpeechError {
    /// Classifies a non-success status from the relay token endpoint.
    pub(crate) fn from_relay_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            404 => Self::RelayUnavailable,
            code @ (401 | 403) => Self::Unauthorized(code),
            code => Self::Provider { status: code, body },
        }
    }
}
