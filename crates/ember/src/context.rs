//! The explicit server context.
//!
//! Everything a message handler may touch lives here: the entity
//! registries, the storage collaborator, the codecs, and the live-session
//! set used for broadcast. One context is created per server and shared as
//! `Arc<ServerContext>`; nothing is process-global.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use ember_protocol::{GameLimits, Npc, NpcCodec, ObjectId};
use ember_registry::{BlobStore, MemoryBlobStore, RestoreReport, SharedRegistry, restore_into};
use ember_session::LiveSessions;

/// Shared state passed to every connection and handler.
pub struct ServerContext {
    limits: GameLimits,
    npcs: SharedRegistry<Npc>,
    npc_codec: NpcCodec,
    npc_store: Arc<dyn BlobStore>,
    sessions: LiveSessions,
}

impl ServerContext {
    /// Creates a context with empty registries backed by `npc_store`.
    pub fn new(limits: GameLimits, npc_store: Arc<dyn BlobStore>) -> Self {
        Self {
            limits,
            npcs: SharedRegistry::new(),
            npc_codec: NpcCodec::new(limits),
            npc_store,
            sessions: LiveSessions::new(),
        }
    }

    /// Replaces the NPC registry, for example with one restored earlier.
    pub fn with_npcs(mut self, npcs: SharedRegistry<Npc>) -> Self {
        self.npcs = npcs;
        self
    }

    /// A context backed by a fresh [`MemoryBlobStore`].
    pub fn in_memory(limits: GameLimits) -> Self {
        Self::new(limits, Arc::new(MemoryBlobStore::new()))
    }

    pub fn limits(&self) -> GameLimits {
        self.limits
    }

    pub fn npcs(&self) -> &SharedRegistry<Npc> {
        &self.npcs
    }

    pub fn npc_codec(&self) -> &NpcCodec {
        &self.npc_codec
    }

    pub fn npc_store(&self) -> &dyn BlobStore {
        self.npc_store.as_ref()
    }

    pub fn sessions(&self) -> &LiveSessions {
        &self.sessions
    }

    /// Queues `frame` on every open session. Returns how many accepted it.
    pub fn broadcast(&self, frame: &Bytes) -> usize {
        self.sessions.broadcast(frame)
    }

    /// Loads the given NPC ids from storage into the NPC registry.
    pub fn restore_npcs(&self, ids: impl IntoIterator<Item = ObjectId>) -> RestoreReport {
        let mut npcs = self.npcs.write();
        restore_into(&mut *npcs, self.npc_store.as_ref(), &self.npc_codec, ids)
    }
}

impl fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerContext")
            .field("limits", &self.limits)
            .field("npcs", &self.npcs.len())
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}
