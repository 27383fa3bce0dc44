//! A registry shared between every session on the server.

use std::sync::Arc;

use ember_protocol::{GameObject, ObjectId};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{EntityRegistry, RegistryError};

/// Cheaply clonable handle to one registry behind a reader/writer lock.
///
/// Readers proceed in parallel with each other; a writer excludes
/// everyone. Each convenience method takes the lock for exactly one
/// operation. To make several changes appear as one, hold the guard from
/// [`write`](Self::write) across them.
///
/// The lock is synchronous. Never hold a guard across an `.await`.
pub struct SharedRegistry<T: GameObject> {
    inner: Arc<RwLock<EntityRegistry<T>>>,
}

impl<T: GameObject> SharedRegistry<T> {
    pub fn new() -> Self {
        Self::from_registry(EntityRegistry::new())
    }

    pub fn from_registry(registry: EntityRegistry<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Shared read access.
    pub fn read(&self) -> RwLockReadGuard<'_, EntityRegistry<T>> {
        self.inner.read()
    }

    /// Exclusive write access.
    pub fn write(&self) -> RwLockWriteGuard<'_, EntityRegistry<T>> {
        self.inner.write()
    }

    pub fn insert(&self, id: ObjectId, object: T) -> Option<T> {
        self.write().insert(id, object)
    }

    /// Returns a clone of the object under `id`.
    pub fn get(&self, id: ObjectId) -> Result<T, RegistryError> {
        self.read().get(id).cloned()
    }

    pub fn remove(&self, id: ObjectId) -> Result<T, RegistryError> {
        self.write().remove(id)
    }

    pub fn rename(
        &self,
        id: ObjectId,
        name: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.write().rename(id, name)
    }

    /// Snapshot of the display names in list order.
    pub fn list_names(&self) -> Vec<String> {
        self.read().list_names().to_vec()
    }

    /// Snapshot of the ids in list order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.read().ids().to_vec()
    }

    pub fn index_of(&self, id: ObjectId) -> Result<usize, RegistryError> {
        self.read().index_of(id)
    }

    pub fn id_at_index(&self, index: usize) -> Result<ObjectId, RegistryError> {
        self.read().id_at_index(index)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl<T: GameObject> Clone for SharedRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: GameObject> Default for SharedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
