//! Error types for the session layer.

use ember_transport::ConnectionId;

/// Errors that can occur while driving a session.
///
/// Transport failures, timeouts and protocol violations are not errors at
/// this level: they close the session, and the reason is recorded on it
/// (see [`Session::close_reason`](crate::Session::close_reason)).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// [`Session::run`](crate::Session::run) was called a second time.
    /// A session drives exactly one connection.
    #[error("session {0} is already running")]
    AlreadyStarted(ConnectionId),
}
