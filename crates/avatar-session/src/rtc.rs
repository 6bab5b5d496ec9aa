//! WebRTC peer connections backed by the `webrtc` crate.

use crate::error::SessionError;
use crate::peer::{ConnectionState, PeerConnection, PeerConnectionFactory, PeerEvent};
use async_trait::async_trait;
use avatar_types::{Direction, MediaKind, RelayServer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

fn peer_err(e: webrtc::Error) -> SessionError {
    SessionError::Peer(e.to_string())
}

impl From<RTCPeerConnectionState> for ConnectionState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
            RTCPeerConnectionState::Connected => ConnectionState::Connected,
            RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
            RTCPeerConnectionState::Failed => ConnectionState::Failed,
            RTCPeerConnectionState::Closed => ConnectionState::Closed,
            _ => ConnectionState::New,
        }
    }
}

fn codec_type(kind: MediaKind) -> RTPCodecType {
    match kind {
        MediaKind::Audio => RTPCodecType::Audio,
        MediaKind::Video => RTPCodecType::Video,
    }
}

fn transceiver_direction(direction: Direction) -> RTCRtpTransceiverDirection {
    match direction {
        Direction::SendRecv => RTCRtpTransceiverDirection::Sendrecv,
        Direction::SendOnly => RTCRtpTransceiverDirection::Sendonly,
        Direction::RecvOnly => RTCRtpTransceiverDirection::Recvonly,
        Direction::Inactive => RTCRtpTransceiverDirection::Inactive,
    }
}

fn to_rtc_ice_server(server: &RelayServer) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone(),
        credential: server.credential.clone(),
        ..Default::default()
    }
}

/// Creates [`RtcPeer`]s with default codecs and interceptors.
#[derive(Debug, Default, Clone)]
pub struct RtcPeerFactory;

impl RtcPeerFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PeerConnectionFactory for RtcPeerFactory {
    async fn create(
        &self,
        ice_servers: &[RelayServer],
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>, SessionError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(peer_err)?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(peer_err)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await.map_err(peer_err)?);
        let id = Uuid::new_v4();

        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let state = ConnectionState::from(state);
            info!(peer_id = %id, ?state, "connection state changed");
            let _ = state_events.send(PeerEvent::StateChanged(state));
            Box::pin(async {})
        }));

        pc.on_ice_connection_state_change(Box::new(move |state| {
            debug!(peer_id = %id, ice_state = ?state, "ICE connection state changed");
            Box::pin(async {})
        }));

        let track_events = events;
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let kind = match track.kind() {
                RTPCodecType::Audio => Some(MediaKind::Audio),
                RTPCodecType::Video => Some(MediaKind::Video),
                _ => None,
            };
            if let Some(kind) = kind {
                info!(peer_id = %id, %kind, "track received");
                let _ = track_events.send(PeerEvent::TrackReceived(kind));
            }
            Box::pin(async {})
        }));

        Ok(Arc::new(RtcPeer {
            id,
            inner: pc,
            closed: AtomicBool::new(false),
        }))
    }
}

/// A peer connection owned by one avatar session.
pub struct RtcPeer {
    id: Uuid,
    inner: Arc<RTCPeerConnection>,
    closed: AtomicBool,
}

impl RtcPeer {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The underlying connection, for handshakes that need more than SDP.
    pub fn inner(&self) -> &Arc<RTCPeerConnection> {
        &self.inner
    }
}

#[async_trait]
impl PeerConnection for RtcPeer {
    async fn add_transceiver(
        &self,
        kind: MediaKind,
        direction: Direction,
    ) -> Result<(), SessionError> {
        self.inner
            .add_transceiver_from_kind(
                codec_type(kind),
                Some(RTCRtpTransceiverInit {
                    direction: transceiver_direction(direction),
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(peer_err)?;
        debug!(peer_id = %self.id, %kind, ?direction, "transceiver added");
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, SessionError> {
        let offer = self.inner.create_offer(None).await.map_err(peer_err)?;
        let mut gathering = self.inner.gathering_complete_promise().await;
        self.inner
            .set_local_description(offer)
            .await
            .map_err(peer_err)?;
        let _ = gathering.recv().await;

        self.inner
            .local_description()
            .await
            .map(|description| description.sdp)
            .ok_or_else(|| SessionError::Peer("local description missing after gathering".into()))
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<(), SessionError> {
        let answer = RTCSessionDescription::answer(sdp).map_err(peer_err)?;
        self.inner
            .set_remote_description(answer)
            .await
            .map_err(peer_err)
    }

    fn connection_state(&self) -> ConnectionState {
        self.inner.connection_state().into()
    }

    async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(peer_id = %self.id, "closing peer connection");
        self.inner.close().await.map_err(peer_err)
    }
}
