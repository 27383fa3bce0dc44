//! Message framing and the message catalogue.
//!
//! Every frame the transport delivers is one complete message:
//!
//! ```text
//! [format version: u8][tag: i32][body ...]
//! ```
//!
//! The tag selects the handler; the body layout depends on the tag and is
//! written with [`ByteCursor`] primitives.

use std::fmt;

use bytes::Bytes;

use crate::{
    ByteCursor, EntityCodec, FORMAT_VERSION, GameLimits, Npc, NpcCodec,
    ObjectId, ProtocolError,
};

/// Size of the frame header in bytes.
pub const HEADER_LEN: usize = 5;

/// Identifies what a frame's body contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageTag(pub i32);

impl MessageTag {
    // -- Connection lifecycle --

    /// C→S, empty body. Must be the first frame of a session.
    pub const HANDSHAKE: Self = Self(1);
    /// S→C, [`HandshakeAck`].
    pub const HANDSHAKE_ACK: Self = Self(2);
    /// C→S, reason string. The server closes the session.
    pub const DISCONNECT: Self = Self(3);

    // -- NPC requests --

    /// C→S, object id then NPC payload.
    pub const NPC_SAVE: Self = Self(10);
    /// C→S, object id.
    pub const NPC_DELETE: Self = Self(11);
    /// C→S, empty body.
    pub const NPC_LIST_REQUEST: Self = Self(12);
    /// C→S, object id.
    pub const NPC_REQUEST: Self = Self(13);

    // -- NPC pushes --

    /// S→C, object id then NPC payload.
    pub const NPC_DATA: Self = Self(20);
    /// S→C, object id.
    pub const NPC_REMOVED: Self = Self(21);
    /// S→C, count then `(id, name)` pairs in registry order.
    pub const NPC_LIST: Self = Self(22);

    /// S→C, [`ErrorReply`].
    pub const ERROR: Self = Self(99);

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::HANDSHAKE => "Handshake",
            Self::HANDSHAKE_ACK => "HandshakeAck",
            Self::DISCONNECT => "Disconnect",
            Self::NPC_SAVE => "NpcSave",
            Self::NPC_DELETE => "NpcDelete",
            Self::NPC_LIST_REQUEST => "NpcListRequest",
            Self::NPC_REQUEST => "NpcRequest",
            Self::NPC_DATA => "NpcData",
            Self::NPC_REMOVED => "NpcRemoved",
            Self::NPC_LIST => "NpcList",
            Self::ERROR => "Error",
            _ => return None,
        })
    }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}({})", self.0),
            None => write!(f, "tag({})", self.0),
        }
    }
}

/// One decoded frame: its tag and the raw body after the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: MessageTag,
    pub body: Bytes,
}

impl Frame {
    /// Writes a complete frame, header included.
    ///
    /// The cursor handed to `body` already holds the header; whatever the
    /// closure appends becomes the body.
    pub fn build(
        tag: MessageTag,
        body: impl FnOnce(&mut ByteCursor) -> Result<(), ProtocolError>,
    ) -> Result<Bytes, ProtocolError> {
        let mut cursor = ByteCursor::with_capacity(64);
        cursor.write_u8(FORMAT_VERSION);
        cursor.write_i32(tag.0);
        body(&mut cursor)?;
        Ok(cursor.into_bytes())
    }

    /// Writes a frame with an empty body.
    pub fn empty(tag: MessageTag) -> Bytes {
        let mut cursor = ByteCursor::with_capacity(HEADER_LEN);
        cursor.write_u8(FORMAT_VERSION);
        cursor.write_i32(tag.0);
        cursor.into_bytes()
    }

    /// Splits a received frame into tag and body.
    ///
    /// # Errors
    /// - [`ProtocolError::FormatVersionMismatch`] if the version byte is
    ///   not [`FORMAT_VERSION`]
    /// - [`ProtocolError::Underflow`] if the header is incomplete
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = ByteCursor::from_slice(data);
        let found = cursor.read_u8()?;
        if found != FORMAT_VERSION {
            return Err(ProtocolError::FormatVersionMismatch {
                expected: FORMAT_VERSION,
                found,
            });
        }
        let tag = MessageTag(cursor.read_i32()?);
        Ok(Self {
            tag,
            body: cursor.read_remaining(),
        })
    }

    /// A fresh cursor over the body.
    pub fn body_cursor(&self) -> ByteCursor {
        ByteCursor::from_slice(&self.body)
    }
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

/// Body of [`MessageTag::HANDSHAKE_ACK`].
///
/// Tells the client its session handle and the array sizes it must use
/// when encoding entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeAck {
    pub session_id: u64,
    pub limits: GameLimits,
}

impl HandshakeAck {
    pub fn to_frame(&self) -> Result<Bytes, ProtocolError> {
        Frame::build(MessageTag::HANDSHAKE_ACK, |c| {
            c.write_i64(self.session_id as i64);
            c.write_count(self.limits.vital_count)?;
            c.write_count(self.limits.stat_count)?;
            c.write_count(self.limits.max_npc_drops)?;
            Ok(())
        })
    }

    pub fn read(c: &mut ByteCursor) -> Result<Self, ProtocolError> {
        let session_id = c.read_i64()? as u64;
        Ok(Self {
            session_id,
            limits: GameLimits {
                vital_count: c.read_count(0)?,
                stat_count: c.read_count(0)?,
                max_npc_drops: c.read_count(0)?,
            },
        })
    }
}

/// Body of [`MessageTag::ERROR`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    pub code: i32,
    pub message: String,
}

impl ErrorReply {
    /// A lookup named an object that does not exist.
    pub const NOT_FOUND: i32 = 404;
    /// The frame's format version is not supported.
    pub const VERSION_MISMATCH: i32 = 426;
    /// The server could not complete the request.
    pub const INTERNAL: i32 = 500;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn to_frame(&self) -> Result<Bytes, ProtocolError> {
        Frame::build(MessageTag::ERROR, |c| {
            c.write_i32(self.code);
            c.write_string(&self.message)
        })
    }

    pub fn read(c: &mut ByteCursor) -> Result<Self, ProtocolError> {
        Ok(Self {
            code: c.read_i32()?,
            message: c.read_string()?,
        })
    }
}

/// One row of [`MessageTag::NPC_LIST`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub id: ObjectId,
    pub name: String,
}

/// Writes an [`MessageTag::NPC_LIST`] frame.
pub fn npc_list_frame<'a>(
    entries: impl ExactSizeIterator<Item = (ObjectId, &'a str)>,
) -> Result<Bytes, ProtocolError> {
    Frame::build(MessageTag::NPC_LIST, |c| {
        c.write_count(entries.len())?;
        for (id, name) in entries {
            c.write_object_id(id)?;
            c.write_string(name)?;
        }
        Ok(())
    })
}

/// Reads the body of an [`MessageTag::NPC_LIST`] frame.
pub fn read_list(c: &mut ByteCursor) -> Result<Vec<ListEntry>, ProtocolError> {
    // Each row is at least an id and an empty string prefix.
    let count = c.read_count(8)?;
    (0..count)
        .map(|_| {
            Ok(ListEntry {
                id: c.read_object_id()?,
                name: c.read_string()?,
            })
        })
        .collect()
}

/// Writes a frame whose body is an object id followed by an NPC payload.
///
/// Used for both [`MessageTag::NPC_SAVE`] and [`MessageTag::NPC_DATA`].
pub fn npc_frame(
    tag: MessageTag,
    codec: &NpcCodec,
    id: ObjectId,
    npc: &Npc,
) -> Result<Bytes, ProtocolError> {
    Frame::build(tag, |c| {
        c.write_object_id(id)?;
        codec.write(npc, c)
    })
}

/// Reads an object id followed by an NPC payload.
pub fn read_npc(
    codec: &NpcCodec,
    c: &mut ByteCursor,
) -> Result<(ObjectId, Npc), ProtocolError> {
    let id = c.read_object_id()?;
    let npc = codec.read(c)?;
    Ok((id, npc))
}

/// Writes a frame whose body is a single object id.
pub fn id_frame(tag: MessageTag, id: ObjectId) -> Result<Bytes, ProtocolError> {
    Frame::build(tag, |c| c.write_object_id(id))
}

/// Writes a [`MessageTag::DISCONNECT`] frame.
pub fn disconnect_frame(reason: &str) -> Result<Bytes, ProtocolError> {
    Frame::build(MessageTag::DISCONNECT, |c| c.write_string(reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_header_layout() {
        let bytes = Frame::empty(MessageTag::NPC_LIST_REQUEST);
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(bytes[0], FORMAT_VERSION);
        assert_eq!(&bytes[1..], &12i32.to_le_bytes());
    }

    #[test]
    fn test_frame_decode_splits_body() {
        let bytes = id_frame(MessageTag::NPC_DELETE, ObjectId(7)).unwrap();
        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.tag, MessageTag::NPC_DELETE);
        assert_eq!(frame.body_cursor().read_object_id().unwrap(), ObjectId(7));
    }

    #[test]
    fn test_frame_decode_rejects_other_versions() {
        let mut bytes = Frame::empty(MessageTag::HANDSHAKE).to_vec();
        bytes[0] = 9;
        assert_eq!(
            Frame::decode(&bytes),
            Err(ProtocolError::FormatVersionMismatch {
                expected: FORMAT_VERSION,
                found: 9
            })
        );
    }

    #[test]
    fn test_frame_decode_short_header_underflows() {
        assert!(matches!(
            Frame::decode(&[FORMAT_VERSION, 1, 0]),
            Err(ProtocolError::Underflow { .. })
        ));
    }

    #[test]
    fn test_handshake_ack_body() {
        let ack = HandshakeAck {
            session_id: 12,
            limits: GameLimits::default(),
        };
        let frame = Frame::decode(&ack.to_frame().unwrap()).unwrap();
        assert_eq!(frame.tag, MessageTag::HANDSHAKE_ACK);
        assert_eq!(HandshakeAck::read(&mut frame.body_cursor()).unwrap(), ack);
    }

    #[test]
    fn test_error_reply_body() {
        let reply = ErrorReply::new(ErrorReply::NOT_FOUND, "npc #4 not found");
        let frame = Frame::decode(&reply.to_frame().unwrap()).unwrap();
        assert_eq!(ErrorReply::read(&mut frame.body_cursor()).unwrap(), reply);
    }

    #[test]
    fn test_npc_list_keeps_order() {
        let rows = [(ObjectId(5), "Rat"), (ObjectId(1), "Goblin")];
        let bytes = npc_list_frame(rows.iter().copied()).unwrap();
        let frame = Frame::decode(&bytes).unwrap();
        let list = read_list(&mut frame.body_cursor()).unwrap();
        assert_eq!(
            list,
            vec![
                ListEntry { id: ObjectId(5), name: "Rat".into() },
                ListEntry { id: ObjectId(1), name: "Goblin".into() },
            ]
        );
    }

    #[test]
    fn test_npc_frame_carries_id_and_payload() {
        let codec = NpcCodec::default();
        let npc = Npc::new(codec.limits());
        let bytes =
            npc_frame(MessageTag::NPC_SAVE, &codec, ObjectId(3), &npc).unwrap();
        let frame = Frame::decode(&bytes).unwrap();
        let (id, decoded) = read_npc(&codec, &mut frame.body_cursor()).unwrap();
        assert_eq!(id, ObjectId(3));
        assert_eq!(decoded, npc);
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(MessageTag::NPC_SAVE.to_string(), "NpcSave(10)");
        assert_eq!(MessageTag(777).to_string(), "tag(777)");
    }
}
