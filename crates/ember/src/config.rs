//! Server configuration.
//!
//! The server never reads a config file. The embedding application parses
//! whatever it likes and hands over a [`ServerConfig`].

use std::time::Duration;

use ember_protocol::GameLimits;
use ember_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Everything [`Server`](crate::Server) needs to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind. `0` picks an ephemeral port; see
    /// [`Server::local_addr`](crate::Server::local_addr).
    pub port: u16,

    /// The single endpoint path clients upgrade on.
    pub path: String,

    /// Array sizes shared by every entity codec.
    pub limits: GameLimits,

    /// Per-session timeouts and queue limits.
    pub session: SessionConfig,

    /// How long `stop` waits for sessions to finish before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7070,
            path: "/game".to_string(),
            limits: GameLimits::default(),
            session: SessionConfig::default(),
            shutdown_grace: Duration::from_secs(3),
        }
    }
}

impl ServerConfig {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn limits(mut self, limits: GameLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// `host:port`, ready for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
