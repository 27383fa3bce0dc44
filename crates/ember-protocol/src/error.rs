//! Error types for the protocol layer.
//!
//! Everything here is recoverable: a session that hits one of these drops
//! the offending frame and keeps running.

/// Errors that can occur while reading, writing, or routing binary data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A read asked for more bytes than were written.
    #[error("buffer underflow: needed {needed} bytes, {remaining} remaining")]
    Underflow {
        /// Bytes the read required.
        needed: usize,
        /// Bytes still unread at the time of the read.
        remaining: usize,
    },

    /// No handler is registered for the frame's tag.
    #[error("unknown message type {0}")]
    UnknownMessageType(i32),

    /// The leading version byte does not match a known decoder.
    #[error("format version mismatch: expected {expected}, found {found}")]
    FormatVersionMismatch {
        /// The version this build reads and writes.
        expected: u8,
        /// The version found on the wire.
        found: u8,
    },

    /// A length-prefixed string was not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// A length or count prefix was negative (other than the null marker)
    /// or too large to encode.
    #[error("invalid length prefix {0}")]
    InvalidLength(i64),

    /// An object reference was negative but not the `-1` sentinel.
    #[error("invalid object reference {0}")]
    InvalidReference(i64),

    /// A fixed-size array does not have the length the configured limits
    /// require.
    #[error("{field} has {actual} entries, expected {expected}")]
    ShapeMismatch {
        /// Which array.
        field: &'static str,
        /// Length required by the limits.
        expected: usize,
        /// Length actually present.
        actual: usize,
    },

    /// The message is invalid at the protocol level.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
