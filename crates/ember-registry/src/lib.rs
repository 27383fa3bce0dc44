//! Entity registries for Ember.
//!
//! Each kind of game object gets its own [`EntityRegistry`]: an ordered
//! id → object map plus index-aligned id and name lists for pickers.
//! There is no global lookup table; the server context owns one
//! [`SharedRegistry`] per kind and hands it to whoever needs it.
//!
//! The crate also defines the persistence boundary ([`BlobStore`]) and
//! helpers that move objects between a registry and a store.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)   ← mutates registries on behalf of sessions
//!     ↕
//! Registry (this crate)  ← canonical in-memory objects
//!     ↕
//! Protocol (below) ← codecs that turn objects into blobs
//! ```

mod error;
mod registry;
mod shared;
mod store;

pub use error::{RegistryError, StoreError};
pub use registry::EntityRegistry;
pub use shared::SharedRegistry;
pub use store::{
    BlobStore, MemoryBlobStore, RestoreReport, load_entity, restore_into,
    save_entity,
};
