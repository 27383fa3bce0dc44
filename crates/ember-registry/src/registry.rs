//! The per-type keyed store of game objects.

use std::collections::HashMap;

use ember_protocol::{GameObject, ObjectId};

use crate::RegistryError;

/// An ordered store of one kind of game object.
///
/// Three views are kept in lockstep:
///
/// - `objects` — id → object, the canonical instances
/// - `ids` — ids in insertion order
/// - `names` — display names, index-aligned with `ids`
///
/// A list index (what a picker shows) therefore maps to exactly one id and
/// one name. Every mutating method updates all three before returning, and
/// there is deliberately no `get_mut`: renaming goes through
/// [`rename`](Self::rename) so the name list cannot drift.
///
/// `EntityRegistry` itself is not synchronized. Share it through
/// [`SharedRegistry`](crate::SharedRegistry).
#[derive(Debug, Clone)]
pub struct EntityRegistry<T: GameObject> {
    objects: HashMap<ObjectId, T>,
    ids: Vec<ObjectId>,
    names: Vec<String>,
}

impl<T: GameObject> EntityRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            ids: Vec::new(),
            names: Vec::new(),
        }
    }

    /// Inserts `object` under `id`.
    ///
    /// A new id is appended at the end of the list. An existing id keeps
    /// its list position; the object (and its name) are replaced and the
    /// previous object is returned.
    pub fn insert(&mut self, id: ObjectId, object: T) -> Option<T> {
        let name = object.name().to_string();
        match self.objects.insert(id, object) {
            Some(previous) => {
                if let Some(index) = self.position(id) {
                    self.names[index] = name;
                }
                Some(previous)
            }
            None => {
                self.ids.push(id);
                self.names.push(name);
                None
            }
        }
    }

    /// Looks up an object by id.
    pub fn get(&self, id: ObjectId) -> Result<&T, RegistryError> {
        self.objects.get(&id).ok_or(RegistryError::NotFound(id))
    }

    /// Returns `true` if `id` is present.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Removes and returns the object under `id`.
    pub fn remove(&mut self, id: ObjectId) -> Result<T, RegistryError> {
        let object = self.objects.remove(&id).ok_or(RegistryError::NotFound(id))?;
        if let Some(index) = self.position(id) {
            self.ids.remove(index);
            self.names.remove(index);
        }
        Ok(object)
    }

    /// Changes the display name of the object under `id`.
    pub fn rename(
        &mut self,
        id: ObjectId,
        name: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let object = self.objects.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        let name = name.into();
        object.set_name(name.clone());
        if let Some(index) = self.position(id) {
            self.names[index] = name;
        }
        Ok(())
    }

    /// Display names in list order.
    pub fn list_names(&self) -> &[String] {
        &self.names
    }

    /// Ids in list order.
    pub fn ids(&self) -> &[ObjectId] {
        &self.ids
    }

    /// The list position of `id`.
    pub fn index_of(&self, id: ObjectId) -> Result<usize, RegistryError> {
        self.position(id).ok_or(RegistryError::NotFound(id))
    }

    /// The id shown at list position `index`.
    pub fn id_at_index(&self, index: usize) -> Result<ObjectId, RegistryError> {
        self.ids
            .get(index)
            .copied()
            .ok_or(RegistryError::IndexOutOfRange(index))
    }

    /// The id of the first object (in list order) named `name`.
    pub fn find_by_name(&self, name: &str) -> Result<ObjectId, RegistryError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|index| self.ids[index])
            .ok_or_else(|| RegistryError::NameNotFound(name.to_string()))
    }

    /// Iterates `(id, object)` pairs in list order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (ObjectId, &T)> + '_ {
        self.ids.iter().map(|id| (*id, &self.objects[id]))
    }

    /// Iterates `(id, name)` pairs in list order.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = (ObjectId, &str)> + '_ {
        self.ids
            .iter()
            .copied()
            .zip(self.names.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn position(&self, id: ObjectId) -> Option<usize> {
        self.ids.iter().position(|&i| i == id)
    }
}

impl<T: GameObject> Default for EntityRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
