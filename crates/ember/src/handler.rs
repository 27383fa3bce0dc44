//! Per-connection handler: upgrade, register, pump, deregister.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Complete the transport upgrade (bounded by the handshake timeout)
//!   2. Create a `Connecting` session and add it to the live set
//!   3. Pump frames through the router until the session closes
//!   4. Remove the session from the live set, even on panic

use std::sync::Arc;

use ember_session::{LiveSessions, Session, SessionConfig};
use ember_transport::{ConnectionId, Incoming};

use crate::{Router, ServerContext};

/// Removes a session from the live set when the handler exits.
///
/// Runs on normal return, early return, and unwinding alike.
struct Deregister<'a> {
    sessions: &'a LiveSessions,
    id: ConnectionId,
}

impl Drop for Deregister<'_> {
    fn drop(&mut self) {
        self.sessions.remove(self.id);
        tracing::debug!(session = %self.id, live = self.sessions.len(), "session deregistered");
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<I: Incoming>(
    incoming: I,
    ctx: Arc<ServerContext>,
    router: Arc<Router>,
    config: SessionConfig,
) {
    let id = incoming.id();
    let peer = incoming.peer_addr();

    let conn = match tokio::time::timeout(config.handshake_timeout, incoming.upgrade()).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::debug!(session = %id, %peer, error = %e, "upgrade failed");
            return;
        }
        Err(_) => {
            tracing::debug!(session = %id, %peer, "upgrade timed out");
            return;
        }
    };

    let session = Arc::new(Session::new(id, config));
    ctx.sessions().insert(Arc::clone(&session));
    let _deregister = Deregister {
        sessions: ctx.sessions(),
        id,
    };
    tracing::debug!(session = %id, %peer, "session registered");

    let result = session
        .run(conn, |session, data| router.dispatch(&ctx, session, &data))
        .await;
    if let Err(e) = result {
        tracing::warn!(session = %id, error = %e, "session pump refused to start");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_protocol::GameLimits;

    #[test]
    fn test_deregister_on_drop() {
        let ctx = ServerContext::in_memory(GameLimits::default());
        let id = ConnectionId::new(5);
        ctx.sessions()
            .insert(Arc::new(Session::new(id, SessionConfig::default())));
        {
            let _guard = Deregister {
                sessions: ctx.sessions(),
                id,
            };
            assert_eq!(ctx.sessions().len(), 1);
        }
        assert!(ctx.sessions().is_empty());
    }
}
