//! The persistence boundary.
//!
//! Ember does not implement storage. It hands sealed entity blobs (see
//! [`ember_protocol::seal`]) to a [`BlobStore`] and gets the same bytes
//! back later. What backs the store is the embedding application's
//! business.

use std::collections::HashMap;

use bytes::Bytes;
use ember_protocol::{EntityCodec, ObjectId, decode_blob, encode_blob};
use parking_lot::Mutex;

use crate::{EntityRegistry, RegistryError, StoreError};

/// Loads and saves opaque blobs by object id.
///
/// One store serves one object type, just as one registry does.
///
/// # Trait bounds
///
/// - `Send + Sync` → one store is shared by every session task.
/// - `'static` → it lives as long as the server.
pub trait BlobStore: Send + Sync + 'static {
    /// Returns the blob saved under `id`.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if nothing was saved under `id`.
    fn load_blob(&self, id: ObjectId) -> Result<Bytes, StoreError>;

    /// Saves `blob` under `id`, replacing any previous blob.
    fn save_blob(&self, id: ObjectId, blob: Bytes) -> Result<(), StoreError>;
}

/// A [`BlobStore`] kept in process memory. For tests and demos.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<ObjectId, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids with a saved blob, in ascending order.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.blobs.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn load_blob(&self, id: ObjectId) -> Result<Bytes, StoreError> {
        self.blobs
            .lock()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn save_blob(&self, id: ObjectId, blob: Bytes) -> Result<(), StoreError> {
        self.blobs.lock().insert(id, blob);
        Ok(())
    }
}

/// Encodes `value`, seals it with the format version, and saves it.
pub fn save_entity<C: EntityCodec>(
    store: &dyn BlobStore,
    codec: &C,
    id: ObjectId,
    value: &C::Entity,
) -> Result<(), RegistryError> {
    let blob = encode_blob(codec, value)?;
    store.save_blob(id, blob)?;
    Ok(())
}

/// Loads and decodes the object saved under `id`.
///
/// # Errors
/// - [`RegistryError::Store`] if the store has nothing under `id`
/// - [`RegistryError::Protocol`] if the blob's version is unknown or the
///   payload is malformed
pub fn load_entity<C: EntityCodec>(
    store: &dyn BlobStore,
    codec: &C,
    id: ObjectId,
) -> Result<C::Entity, RegistryError> {
    let blob = store.load_blob(id)?;
    Ok(decode_blob(codec, &blob)?)
}

/// Outcome of [`restore_into`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// Ids loaded into the registry, in the order given.
    pub loaded: Vec<ObjectId>,
    /// Ids that failed to load, with the reason.
    pub skipped: Vec<(ObjectId, RegistryError)>,
}

/// Loads every id in `ids` from `store` into `registry`.
///
/// A blob that is missing or fails to decode is skipped and reported;
/// it does not stop the rest of the restore.
pub fn restore_into<C: EntityCodec>(
    registry: &mut EntityRegistry<C::Entity>,
    store: &dyn BlobStore,
    codec: &C,
    ids: impl IntoIterator<Item = ObjectId>,
) -> RestoreReport {
    let mut report = RestoreReport::default();
    for id in ids {
        match load_entity(store, codec, id) {
            Ok(object) => {
                registry.insert(id, object);
                report.loaded.push(id);
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "skipping unreadable blob");
                report.skipped.push((id, e));
            }
        }
    }
    tracing::info!(
        loaded = report.loaded.len(),
        skipped = report.skipped.len(),
        "registry restored from storage"
    );
    report
}
