//! Ordered, idempotent teardown.

use crate::session::PeerSession;
use crate::speech::AvatarHandle;
use tracing::debug;

/// Releases an avatar session.
///
/// The synthesizer is always closed before the peer connection, so it never
/// operates on a torn-down transport. Either part may be absent, and both
/// closes are no-ops on already-closed resources, so calling this twice or
/// on a session that never reached `Ready` is safe.
pub async fn teardown(handle: Option<&AvatarHandle>, session: Option<&PeerSession>) {
    if let Some(handle) = handle {
        handle.close().await;
    }
    if let Some(session) = session {
        debug!(session_id = %session.id(), "tearing down peer session");
        session.close().await;
    }
}
