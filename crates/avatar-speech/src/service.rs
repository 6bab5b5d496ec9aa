use crate::config::{SpeechConfig, TokenMode};
use crate::error::SpeechError;
use crate::tts::{build_ssml, validate_text, wav_duration_ticks, SynthesizedAudio};
use avatar_types::{Credential, RelayServer};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Timeout for every outbound provider request.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Relay token body as returned by the provider.
#[derive(Debug, Deserialize)]
struct ProviderRelayToken {
    #[serde(rename = "Urls")]
    urls: Vec<String>,
    #[serde(rename = "Username", default)]
    username: String,
    #[serde(rename = "Password", default)]
    password: String,
}

/// Server-side client for the speech provider.
///
/// Holds the long-lived subscription key. Everything handed to browsers is
/// derived from it: short-lived tokens, relay descriptors, synthesized audio.
#[derive(Debug, Clone)]
pub struct SpeechService {
    config: SpeechConfig,
    client: reqwest::Client,
}

impl SpeechService {
    pub fn new(config: SpeechConfig) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .user_agent(concat!("avatar-speech/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.config
    }

    /// Produces the credential handed to a client starting an avatar session.
    pub async fn credential(&self) -> Result<Credential, SpeechError> {
        let (key, region) = self.config.require()?;
        match self.config.token_mode {
            TokenMode::SubscriptionKey => Ok(Credential::new(key, region)),
            TokenMode::IssueToken => {
                let token = self.issue_token(key, region).await?;
                Ok(Credential::new(token, region))
            }
        }
    }

    /// Exchanges the subscription key for a short-lived bearer token.
    async fn issue_token(&self, key: &str, region: &str) -> Result<String, SpeechError> {
        let url = format!("{}/sts/v1.0/issueToken", self.config.sts_base(region));
        let response = self
            .client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(match status.as_u16() {
                code @ (401 | 403) => SpeechError::Unauthorized(code),
                code => SpeechError::Provider { status: code, body },
            });
        }

        let token = body.trim().to_string();
        if token.is_empty() {
            return Err(SpeechError::MalformedResponse(
                "token endpoint returned an empty body".to_string(),
            ));
        }
        debug!(token_len = token.len(), "issued short-lived speech token");
        Ok(token)
    }

    /// Fetches the avatar relay (TURN) servers for this subscription.
    pub async fn relay_servers(&self) -> Result<Vec<RelayServer>, SpeechError> {
        let (key, region) = self.config.require()?;
        let url = format!(
            "{}/cognitiveservices/avatar/relay/token/v1",
            self.config.tts_base(region)
        );

        info!(region, "fetching avatar relay token");
        let response = self
            .client
            .get(&url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::from_relay_status(status, body));
        }

        let token: ProviderRelayToken = response
            .json()
            .await
            .map_err(|e| SpeechError::MalformedResponse(e.to_string()))?;

        if token.urls.is_empty() {
            return Err(SpeechError::MalformedResponse(
                "relay token contained no URLs".to_string(),
            ));
        }

        info!(url_count = token.urls.len(), "received avatar relay token");
        Ok(vec![RelayServer {
            urls: token.urls,
            username: token.username,
            credential: token.password,
        }])
    }

    /// Synthesizes `text` with the configured voice, without an avatar session.
    pub async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, SpeechError> {
        validate_text(text)?;
        let (key, region) = self.config.require()?;
        let url = format!("{}/cognitiveservices/v1", self.config.tts_base(region));
        let ssml = build_ssml(text, &self.config.voice);

        let response = self
            .client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", &self.config.output_format)
            .body(ssml)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?.to_vec();
        if audio.is_empty() {
            return Err(SpeechError::Tts("provider returned no audio".to_string()));
        }

        let duration_ticks = wav_duration_ticks(&audio);
        info!(
            bytes = audio.len(),
            duration_ticks,
            voice = %self.config.voice,
            "synthesized speech"
        );
        Ok(SynthesizedAudio {
            audio,
            duration_ticks,
        })
    }
}
