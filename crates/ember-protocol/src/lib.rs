//! Wire protocol for Ember.
//!
//! This crate defines the bytes that travel between server and clients and
//! the bytes that are persisted:
//!
//! - **Cursor** ([`ByteCursor`]) — sequential typed reads and writes, the
//!   foundation of every codec.
//! - **Codecs** ([`EntityCodec`], [`NpcCodec`]) — per-type binary layouts
//!   for game objects.
//! - **Blobs** ([`seal`], [`open`]) — versioned payloads handed to storage.
//! - **Messages** ([`Frame`], [`MessageTag`]) — the framed messages a
//!   session exchanges.
//! - **Errors** ([`ProtocolError`]) — everything that can go wrong while
//!   reading or writing.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (tag + body) → Registry (game objects)
//! ```

mod blob;
mod codec;
mod cursor;
mod error;
mod message;
mod npc;
mod types;

pub use blob::{FORMAT_VERSION, decode_blob, encode_blob, open, seal};
pub use codec::EntityCodec;
pub use cursor::{ByteCursor, NO_REFERENCE, NULL_STRING};
pub use error::ProtocolError;
pub use message::{
    ErrorReply, Frame, HEADER_LEN, HandshakeAck, ListEntry, MessageTag,
    disconnect_frame, id_frame, npc_frame, npc_list_frame, read_list,
    read_npc,
};
pub use npc::{Npc, NpcBehavior, NpcCodec, NpcDrop};
pub use types::{GameLimits, GameObject, ObjectId, ObjectKind};
