//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Clients connect to a single endpoint path (e.g. `/game`). Upgrade
//! requests for any other path are refused with `404 Not Found`. When the
//! client offers the `binary` sub-protocol it is echoed back; text frames
//! are never produced by the server and are dropped on receipt.

use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::{
    HeaderValue, StatusCode, header::SEC_WEBSOCKET_PROTOCOL,
};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, Incoming, Transport, TransportError};

/// The only sub-protocol the endpoint speaks.
pub const BINARY_SUBPROTOCOL: &str = "binary";

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    path: String,
    next_id: u64,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address, serving
    /// upgrades on `path`.
    pub async fn bind(addr: &str, path: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, path, "WebSocket transport listening");
        Ok(Self {
            listener,
            path: path.to_string(),
            next_id: 1,
        })
    }
}

impl Transport for WebSocketTransport {
    type Incoming = IncomingWebSocket;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        tracing::debug!(%id, %addr, "accepted TCP connection");

        Ok(IncomingWebSocket {
            id,
            addr,
            path: self.path.clone(),
            stream,
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A TCP connection waiting for its WebSocket upgrade.
pub struct IncomingWebSocket {
    id: ConnectionId,
    addr: SocketAddr,
    path: String,
    stream: TcpStream,
}

impl Incoming for IncomingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let path = self.path;
        let callback = move |req: &Request, mut resp: Response| {
            if req.uri().path() != path {
                let mut refusal = ErrorResponse::new(Some(format!(
                    "no endpoint at {}",
                    req.uri().path()
                )));
                *refusal.status_mut() = StatusCode::NOT_FOUND;
                return Err(refusal);
            }
            if offers_binary(req) {
                resp.headers_mut().insert(
                    SEC_WEBSOCKET_PROTOCOL,
                    HeaderValue::from_static(BINARY_SUBPROTOCOL),
                );
            }
            Ok(resp)
        };

        let ws = tokio_tungstenite::accept_hdr_async(self.stream, callback)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        tracing::debug!(id = %self.id, addr = %self.addr, "WebSocket upgraded");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id: self.id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

fn offers_binary(req: &Request) -> bool {
    req.headers()
        .get_all(SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|p| p.trim() == BINARY_SUBPROTOCOL)
}

/// A single upgraded WebSocket connection.
///
/// The read and write halves sit behind separate locks, so a task blocked
/// in [`recv`](Connection::recv) never holds up a concurrent `send`.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = Message::Binary(data.to_vec().into());
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(_))) => {
                    tracing::debug!(id = %self.id, "dropping text frame");
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(
                    tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed,
                )) => return Ok(None),
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
