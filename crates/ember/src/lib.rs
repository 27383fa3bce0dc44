//! # Ember
//!
//! Server-authoritative entity sync for client/server games.
//!
//! Ember keeps the canonical copy of every game object (NPCs first) in
//! per-type registries, speaks a compact little-endian binary format over
//! WebSocket, and broadcasts every accepted change to all connected
//! clients.
//!
//! ## Layers
//!
//! ```text
//! ember            ← Server, ServerContext, Router, built-in handlers
//! ember-session    ← Session state machine, outbound queue, live set
//! ember-registry   ← EntityRegistry, BlobStore persistence boundary
//! ember-protocol   ← ByteCursor, EntityCodec, Npc, frames
//! ember-transport  ← Transport traits, WebSocket endpoint
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember::prelude::*;
//!
//! # async fn run() -> Result<(), EmberError> {
//! let server = Server::start(ServerConfig::default().port(7070)).await?;
//! // ... until it is time to go:
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod error;
mod handler;
mod npc;
mod router;
mod server;

pub use config::ServerConfig;
pub use context::ServerContext;
pub use error::EmberError;
pub use router::{MessageHandler, Router};
pub use server::{SHUTDOWN_REASON, Server, ServerBuilder};

pub use ember_protocol as protocol;
pub use ember_registry as registry;
pub use ember_session as session;
pub use ember_transport as transport;

pub mod prelude {
    pub use crate::{
        EmberError, MessageHandler, Router, SHUTDOWN_REASON, Server, ServerBuilder,
        ServerConfig, ServerContext,
    };
    pub use ember_protocol::{
        ByteCursor, EntityCodec, ErrorReply, Frame, GameLimits, GameObject, MessageTag, Npc,
        NpcBehavior, NpcCodec, NpcDrop, ObjectId, ObjectKind, ProtocolError,
    };
    pub use ember_registry::{
        BlobStore, EntityRegistry, MemoryBlobStore, RegistryError, SharedRegistry, StoreError,
    };
    pub use ember_session::{OverflowPolicy, Session, SessionConfig, SessionState};
}
