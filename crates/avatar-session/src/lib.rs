//! Avatar session establishment and media negotiation.
//!
//! Drives the client side of a talking-avatar conversation:
//!
//! 1. obtain a short-lived credential from the relay ([`CredentialSource`])
//! 2. discover relay (ICE) servers, degrading to a public STUN server
//!    ([`RelayDiscovery`], [`resolve_ice_servers`])
//! 3. build a peer connection with bidirectional audio and video
//!    transceivers and run the provider's avatar-start handshake over it
//!    ([`Negotiator`], [`PeerSession`])
//! 4. speak utterances over the ready session ([`speak`])
//! 5. tear down the synthesizer, then the peer connection ([`teardown`])
//!
//! [`AvatarController`] composes these steps behind `initialize_avatar`,
//! `speak` and `teardown`, and publishes [`SessionState`] transitions on a
//! watch channel.
//!
//! The provider's avatar capability is reached only through the
//! [`AvatarConnector`] and [`AvatarSynthesizer`] traits. Peer connections go
//! through [`PeerConnectionFactory`]; [`RtcPeerFactory`] is the WebRTC
//! implementation.

pub mod avatar;
pub mod config;
pub mod controller;
pub mod credential;
pub mod discovery;
pub mod error;
pub mod lifecycle;
pub mod peer;
pub mod rtc;
pub mod session;
pub mod speech;

pub use avatar::{AvatarConfig, AvatarConnector, AvatarSynthesizer, ProviderError, SpeakResult};
pub use config::SessionConfig;
pub use controller::AvatarController;
pub use credential::{CredentialSource, HttpCredentialSource};
pub use discovery::{resolve_ice_servers, HttpRelayDiscovery, IceSelection, RelayDiscovery};
pub use error::SessionError;
pub use lifecycle::teardown;
pub use peer::{ConnectionState, PeerConnection, PeerConnectionFactory, PeerEvent};
pub use rtc::{RtcPeer, RtcPeerFactory};
pub use session::{Negotiator, PeerSession, SessionState};
pub use speech::{speak, AvatarHandle};
