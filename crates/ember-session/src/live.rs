//! The set of live sessions and broadcast fan-out.
//!
//! The server's accept loop inserts a session as soon as a connection is
//! upgraded and removes it when the session's pump returns. Everything
//! in between (handlers, broadcast, shutdown) goes through this set.
//!
//! # Concurrency note
//!
//! Membership changes take the write lock; broadcast and lookups take the
//! read lock. A broadcast therefore sees one consistent snapshot of the
//! membership: a session is either in it for the whole broadcast or not at
//! all. Pushing to a session never waits on the network (see
//! [`Session::send`]), so holding the read lock across a broadcast is
//! short.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use ember_transport::ConnectionId;
use parking_lot::RwLock;

use crate::Session;

/// Every session the server currently knows about, keyed by handle.
///
/// Ordered by handle so broadcast and shutdown visit sessions in accept
/// order.
#[derive(Debug, Default)]
pub struct LiveSessions {
    sessions: RwLock<BTreeMap<ConnectionId, Arc<Session>>>,
}

impl LiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `session`, replacing any session with the same handle.
    pub fn insert(&self, session: Arc<Session>) {
        let id = session.id();
        if self.sessions.write().insert(id, session).is_some() {
            tracing::warn!(session = %id, "replaced a live session with the same handle");
        }
    }

    /// Removes the session with handle `id`.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.write().remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Handles of every live session, ascending.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.sessions.read().keys().copied().collect()
    }

    /// Queues `frame` on every open session.
    ///
    /// Sessions that are not open (still handshaking, or closing) are
    /// skipped. One slow or dead client never blocks delivery to the
    /// others. Returns how many sessions accepted the frame.
    pub fn broadcast(&self, frame: &Bytes) -> usize {
        self.fan_out(frame, None)
    }

    /// Like [`broadcast`](Self::broadcast), but skips `except`.
    pub fn broadcast_except(&self, except: ConnectionId, frame: &Bytes) -> usize {
        self.fan_out(frame, Some(except))
    }

    fn fan_out(&self, frame: &Bytes, except: Option<ConnectionId>) -> usize {
        let sessions = self.sessions.read();
        let delivered = sessions
            .values()
            .filter(|session| Some(session.id()) != except)
            // `Bytes` clones share the buffer.
            .filter(|session| session.send(frame.clone()))
            .count();
        tracing::trace!(delivered, live = sessions.len(), "broadcast");
        delivered
    }

    /// Requests every live session to close with `reason`.
    ///
    /// Returns how many sessions this call started closing. The sessions
    /// stay in the set until their pumps finish.
    pub fn close_all(&self, reason: &str) -> usize {
        let sessions = self.sessions.read();
        sessions
            .values()
            .filter(|session| session.close(reason))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SessionConfig, SessionState};

    fn live_with(n: u64) -> (LiveSessions, Vec<Arc<Session>>) {
        let live = LiveSessions::new();
        let sessions: Vec<_> = (1..=n)
            .map(|i| Arc::new(Session::new(ConnectionId::new(i), SessionConfig::default())))
            .collect();
        for session in &sessions {
            live.insert(Arc::clone(session));
        }
        (live, sessions)
    }

    #[test]
    fn test_insert_get_remove() {
        let (live, _sessions) = live_with(2);
        assert_eq!(live.len(), 2);
        assert!(live.get(ConnectionId::new(1)).is_some());

        let removed = live.remove(ConnectionId::new(1)).unwrap();
        assert_eq!(removed.id(), ConnectionId::new(1));
        assert!(live.get(ConnectionId::new(1)).is_none());
        assert_eq!(live.ids(), [ConnectionId::new(2)]);
        assert!(live.remove(ConnectionId::new(1)).is_none());
    }

    #[test]
    fn test_broadcast_reaches_only_open_sessions() {
        let (live, sessions) = live_with(3);
        sessions[0].open();
        sessions[1].open();
        // sessions[2] is still handshaking.

        let frame = Bytes::from_static(b"hello");
        assert_eq!(live.broadcast(&frame), 2);
        assert_eq!(sessions[0].pending(), 1);
        assert_eq!(sessions[1].pending(), 1);
        assert_eq!(sessions[2].pending(), 0);
    }

    #[test]
    fn test_broadcast_skips_closed_session() {
        let (live, sessions) = live_with(3);
        for session in &sessions {
            session.open();
        }
        sessions[1].close("gone");

        assert_eq!(live.broadcast(&Bytes::from_static(b"x")), 2);
        assert_eq!(sessions[0].pending(), 1);
        assert_eq!(sessions[1].pending(), 0);
        assert_eq!(sessions[2].pending(), 1);
    }

    #[test]
    fn test_broadcast_except() {
        let (live, sessions) = live_with(2);
        for session in &sessions {
            session.open();
        }
        assert_eq!(
            live.broadcast_except(ConnectionId::new(1), &Bytes::from_static(b"x")),
            1
        );
        assert_eq!(sessions[0].pending(), 0);
        assert_eq!(sessions[1].pending(), 1);
    }

    #[test]
    fn test_close_all() {
        let (live, sessions) = live_with(3);
        sessions[0].open();
        sessions[2].close("already going");

        assert_eq!(live.close_all("server shutdown"), 2);
        for session in &sessions {
            assert_eq!(session.state(), SessionState::Closing);
        }
        assert_eq!(sessions[0].close_reason().as_deref(), Some("server shutdown"));
        assert_eq!(sessions[2].close_reason().as_deref(), Some("already going"));
        // Still tracked until their pumps exit.
        assert_eq!(live.len(), 3);
    }
}
