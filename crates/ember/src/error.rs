//! Unified error type for the Ember framework.

use ember_protocol::ProtocolError;
use ember_registry::{RegistryError, StoreError};
use ember_session::SessionError;
use ember_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `ember` façade crate you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum EmberError {
    /// A transport-level error (bind, accept, upgrade).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (malformed frame, unknown tag, version).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A registry or persistence error.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<StoreError> for EmberError {
    fn from(e: StoreError) -> Self {
        Self::Registry(e.into())
    }
}

impl EmberError {
    /// Returns `true` for errors caused by the bytes a client sent.
    ///
    /// These are dropped at debug level; everything else is worth a warning.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}
