//! Obtaining a speech credential from the relay server.

use crate::error::SessionError;
use async_trait::async_trait;
use avatar_types::wire::{ErrorBody, TokenResponse};
use avatar_types::Credential;
use std::time::Duration;
use tracing::info;

/// Timeout for the credential request.
const CREDENTIAL_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of the credential a session is started with.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fails with [`SessionError::Configuration`] when no usable credential
    /// is available.
    async fn credential(&self) -> Result<Credential, SessionError>;
}

/// Fetches credentials from `GET {relay}/api/speech/token`.
#[derive(Debug, Clone)]
pub struct HttpCredentialSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCredentialSource {
    pub fn new(relay_url: &str) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(CREDENTIAL_TIMEOUT)
            .build()
            .map_err(|e| SessionError::Configuration(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}/api/speech/token", relay_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn credential(&self) -> Result<Credential, SessionError> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            SessionError::Configuration(format!("credential request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => format!("relay returned status {}", status.as_u16()),
            };
            return Err(SessionError::Configuration(detail));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            SessionError::Configuration(format!("malformed credential response: {}", e))
        })?;

        let credential = Credential::new(body.token, body.region);
        if credential.is_incomplete() {
            return Err(SessionError::Configuration(
                "relay returned an incomplete credential".to_string(),
            ));
        }

        info!(
            region = %credential.region,
            token_len = credential.token.len(),
            "obtained speech credential"
        );
        Ok(credential)
    }
}
