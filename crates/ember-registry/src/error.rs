//! Error types for the registry layer.

use ember_protocol::{ObjectId, ProtocolError};

/// Errors raised by the external storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Nothing is stored under this id.
    #[error("no blob stored for {0}")]
    NotFound(ObjectId),

    /// The backing store failed.
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Errors that can occur during registry operations.
///
/// Lookups that miss are ordinary results, not crashes: callers get one
/// of the `NotFound` family and decide what to do.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No object with this id.
    #[error("object {0} not found")]
    NotFound(ObjectId),

    /// No object at this list position.
    #[error("no object at list index {0}")]
    IndexOutOfRange(usize),

    /// No object with this display name.
    #[error("no object named {0:?}")]
    NameNotFound(String),

    /// Loading or saving a blob failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored blob could not be decoded, or an object could not be
    /// encoded for storage.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
