//! Relay (ICE) server discovery with an explicit STUN fallback.
//!
//! Discovery never fails a session. Provider unavailability, authorization
//! failure, a malformed body or a timeout all yield an empty list, and
//! [`resolve_ice_servers`] substitutes the fallback STUN entry. The degraded
//! path is logged at `warn` and recorded on the session.

use crate::error::SessionError;
use async_trait::async_trait;
use avatar_types::wire::IceServersResponse;
use avatar_types::{Credential, RelayServer};
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait RelayDiscovery: Send + Sync {
    /// Returns the discovered relay servers, or an empty list on any failure.
    async fn relay_servers(&self, credential: &Credential) -> Vec<RelayServer>;
}

/// Queries `GET {relay}/api/speech/ice-token`.
#[derive(Debug, Clone)]
pub struct HttpRelayDiscovery {
    client: reqwest::Client,
    url: String,
}

impl HttpRelayDiscovery {
    pub fn new(relay_url: &str, timeout: Option<Duration>) -> Result<Self, SessionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SessionError::Configuration(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}/api/speech/ice-token", relay_url.trim_end_matches('/')),
        })
    }

    async fn fetch(&self) -> Result<Vec<RelayServer>, String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("relay returned status {}", status.as_u16()));
        }
        let body: IceServersResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(body.ice_servers)
    }
}

#[async_trait]
impl RelayDiscovery for HttpRelayDiscovery {
    async fn relay_servers(&self, credential: &Credential) -> Vec<RelayServer> {
        match self.fetch().await {
            Ok(servers) => {
                info!(
                    region = %credential.region,
                    count = servers.len(),
                    "discovered relay servers"
                );
                servers
            }
            Err(e) => {
                warn!(region = %credential.region, error = %e, "relay discovery failed");
                Vec::new()
            }
        }
    }
}

/// The ICE server set a peer connection is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceSelection {
    /// Never empty.
    pub servers: Vec<RelayServer>,
    /// `true` when discovery yielded nothing usable and the fallback STUN
    /// entry was substituted.
    pub fallback_used: bool,
}

/// Picks the discovered servers, or exactly one fallback STUN entry if none
/// of them carries a URL.
pub fn resolve_ice_servers(discovered: Vec<RelayServer>, fallback_stun_url: &str) -> IceSelection {
    let servers: Vec<RelayServer> = discovered
        .into_iter()
        .filter(|server| server.urls.iter().any(|url| !url.trim().is_empty()))
        .collect();

    if servers.is_empty() {
        warn!(
            fallback = fallback_stun_url,
            "relay discovery degraded, using fallback STUN server"
        );
        return IceSelection {
            servers: vec![RelayServer::stun(fallback_stun_url)],
            fallback_used: true,
        };
    }

    IceSelection {
        servers,
        fallback_used: false,
    }
}
