//! Peer-connection abstraction used by the session negotiator.
//!
//! Backends report track arrival and connection-state changes as
//! [`PeerEvent`]s on the channel handed to [`PeerConnectionFactory::create`].

use crate::error::SessionError;
use async_trait::async_trait;
use avatar_types::{Direction, MediaKind, RelayServer};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connection state as reported by the underlying connection-state signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// `failed` and `closed` end the session; `disconnected` may recover.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// Callback notifications from a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    TrackReceived(MediaKind),
    StateChanged(ConnectionState),
}

/// A live peer connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Declares a transceiver. Called before any negotiation.
    async fn add_transceiver(&self, kind: MediaKind, direction: Direction)
        -> Result<(), SessionError>;

    /// Creates the local offer, applies it, and returns the SDP once ICE
    /// gathering completes.
    async fn create_offer(&self) -> Result<String, SessionError>;

    /// Applies the remote answer SDP.
    async fn set_remote_answer(&self, sdp: String) -> Result<(), SessionError>;

    fn connection_state(&self) -> ConnectionState;

    /// Closes the connection. Must be a no-op when already closed.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Builds peer connections for a given ICE server set.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[RelayServer],
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>, SessionError>;
}
