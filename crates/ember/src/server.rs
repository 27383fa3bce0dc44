//! `Server` builder and listener loop.
//!
//! This is the entry point for running an Ember server. It ties together
//! all the layers: transport → session → router → registries.
//!
//! ```text
//!  start() ──→ bind ──→ accept loop ─┬─→ task per connection
//!                           │        └─→ reap finished tasks
//!  stop()  ──→ signal ──────┘
//!               └─→ close_all("server shutdown")
//!               └─→ wait shutdown_grace, abort stragglers
//!               └─→ listening socket released
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ember_protocol::Npc;
use ember_registry::{BlobStore, MemoryBlobStore, SharedRegistry};
use ember_session::SessionConfig;
use ember_transport::{Transport, TransportError, WebSocketTransport};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::handler::handle_connection;
use crate::{EmberError, Router, ServerConfig, ServerContext};

/// Reason given to every session when the server stops.
pub const SHUTDOWN_REASON: &str = "server shutdown";

/// Builder for configuring and starting a [`Server`].
///
/// # Example
///
/// ```rust,ignore
/// use ember::prelude::*;
///
/// let server = Server::builder()
///     .config(ServerConfig::default().port(7070))
///     .npc_store(Arc::new(MyStore::open("npcs")?))
///     .start()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    npc_store: Option<Arc<dyn BlobStore>>,
    npcs: Option<SharedRegistry<Npc>>,
    router: Router,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            npc_store: None,
            npcs: None,
            router: Router::default(),
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Storage for NPC blobs. Defaults to a [`MemoryBlobStore`].
    pub fn npc_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.npc_store = Some(store);
        self
    }

    /// Serve an existing NPC registry, for example one restored from
    /// storage, instead of starting empty.
    pub fn npcs(mut self, npcs: SharedRegistry<Npc>) -> Self {
        self.npcs = Some(npcs);
        self
    }

    /// Replaces the default router.
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Binds the endpoint and starts accepting connections.
    ///
    /// # Errors
    /// [`EmberError::Transport`] if the address cannot be bound.
    pub async fn start(self) -> Result<Server, EmberError> {
        let Self {
            config,
            npc_store,
            npcs,
            router,
        } = self;

        let transport = WebSocketTransport::bind(&config.bind_addr(), &config.path).await?;
        let local_addr = transport.local_addr().map_err(TransportError::AcceptFailed)?;

        let npc_store: Arc<dyn BlobStore> = match npc_store {
            Some(store) => store,
            None => Arc::new(MemoryBlobStore::new()),
        };
        let mut context = ServerContext::new(config.limits, npc_store);
        if let Some(npcs) = npcs {
            context = context.with_npcs(npcs);
        }
        let context = Arc::new(context);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(
            transport,
            Arc::clone(&context),
            Arc::new(router),
            config.session.clone(),
            config.shutdown_grace,
            shutdown_rx,
        ));

        tracing::info!(%local_addr, path = %config.path, "Ember server running");
        Ok(Server {
            context,
            local_addr,
            shutdown: shutdown_tx,
            accept_task,
            shutdown_grace: config.shutdown_grace,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Ember server.
///
/// The listener runs on its own task from [`ServerBuilder::start`] until
/// [`stop`](Self::stop) is called. Dropping a `Server` without stopping it
/// also starts the shutdown sequence, but nothing waits for it.
pub struct Server {
    context: Arc<ServerContext>,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    shutdown_grace: Duration,
}

impl Server {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Starts a server with `config`, in-memory storage and the default
    /// router.
    pub async fn start(config: ServerConfig) -> Result<Self, EmberError> {
        ServerBuilder::new().config(config).start().await
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The shared context: registries, storage, live sessions.
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Stops the server.
    ///
    /// Every live session is asked to close with
    /// [`SHUTDOWN_REASON`]. Sessions get `shutdown_grace` to flush and
    /// close; any still running after that are aborted. The listening
    /// socket is released before this returns.
    pub async fn stop(self) {
        self.shutdown.send_replace(true);
        // The loop's own grace wait is bounded; this bound covers a loop
        // that is somehow stuck.
        let limit = self.shutdown_grace + Duration::from_secs(1);
        let mut accept_task = self.accept_task;
        if tokio::time::timeout(limit, &mut accept_task).await.is_err() {
            tracing::warn!("listener did not stop in time, aborting");
            accept_task.abort();
            let _ = accept_task.await;
        }
        tracing::info!("Ember server stopped");
    }
}

async fn accept_loop(
    mut transport: WebSocketTransport,
    ctx: Arc<ServerContext>,
    router: Arc<Router>,
    session_config: SessionConfig,
    grace: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    // A dropped `Server` closes the channel, which also ends the wait.
    let listener_failed = loop {
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break false,
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!(error = %e, "connection task panicked");
                    }
                }
            }
            accepted = transport.accept() => match accepted {
                Ok(incoming) => {
                    connections.spawn(handle_connection(
                        incoming,
                        Arc::clone(&ctx),
                        Arc::clone(&router),
                        session_config.clone(),
                    ));
                }
                Err(e) if e.is_resource_exhaustion() => {
                    tracing::error!(error = %e, "accept failed: resources exhausted, listener stopping");
                    break true;
                }
                Err(e) => tracing::debug!(error = %e, "accept failed"),
            },
        }
    };

    // No new connections from here on.
    drop(transport);

    if listener_failed {
        // Existing sessions keep running until the server is stopped.
        let _ = shutdown.wait_for(|stop| *stop).await;
    }

    let closing = ctx.sessions().close_all(SHUTDOWN_REASON);
    tracing::info!(closing, "closing live sessions");

    let drained = tokio::time::timeout(grace, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!(remaining = connections.len(), "shutdown grace expired, aborting sessions");
        connections.shutdown().await;
    }
}
