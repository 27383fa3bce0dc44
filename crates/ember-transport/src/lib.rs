//! Transport abstraction layer for Ember.
//!
//! Provides the [`Transport`], [`Incoming`] and [`Connection`] traits that
//! abstract over the network protocol carrying binary frames between the
//! server and its clients.
//!
//! Accepting is split in two steps: [`Transport::accept`] only takes the
//! raw connection off the listening socket, and [`Incoming::upgrade`]
//! performs the (possibly slow) protocol handshake. The server runs the
//! upgrade on the connection's own task so a stalled client never blocks
//! the accept loop.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    BINARY_SUBPROTOCOL, IncomingWebSocket, WebSocketConnection,
    WebSocketTransport,
};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
///
/// The session built on top of a connection uses the same value as its
/// handle for the lifetime of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// A connection that has been accepted but not yet upgraded.
    type Incoming: Incoming;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// A freshly accepted connection whose protocol handshake has not run yet.
pub trait Incoming: Send + 'static {
    /// The connection produced by a successful upgrade.
    type Connection: Connection;
    /// The error type for the upgrade.
    type Error: std::error::Error + Send + Sync;

    /// Returns the identifier the upgraded connection will carry.
    fn id(&self) -> ConnectionId;

    /// Returns the remote peer's address.
    fn peer_addr(&self) -> SocketAddr;

    /// Performs the protocol handshake.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive binary frames.
///
/// `send` and `recv` may be awaited concurrently from the same task (for
/// example inside `tokio::join!`): implementations keep the read and
/// write halves independent.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one complete frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next complete frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
