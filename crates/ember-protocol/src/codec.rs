//! The contract every per-type entity codec implements.
//!
//! A codec only transforms an object to and from bytes. It never keeps a
//! copy of what it encoded or decoded; the registry owns the canonical
//! instance.

use bytes::Bytes;

use crate::{ByteCursor, GameObject, ProtocolError};

/// Encodes and decodes one kind of game object.
///
/// Implementations provide [`write`](EntityCodec::write) and
/// [`read`](EntityCodec::read), which must visit the same fields in the
/// same order. The provided [`encode`](EntityCodec::encode) and
/// [`decode`](EntityCodec::decode) wrap them with a cursor that lives
/// exactly as long as the call.
///
/// Every implementation must satisfy the round-trip law
/// `decode(encode(x)) == x` for every valid `x`.
///
/// New fields may only be appended after the last existing field.
/// Inserting a field anywhere else changes the meaning of every payload
/// already on disk or in flight.
pub trait EntityCodec: Send + Sync + 'static {
    /// The object type this codec handles.
    type Entity: GameObject;

    /// Appends the fields of `value` to `cursor`.
    ///
    /// # Errors
    /// Fails if `value` cannot be represented on the wire, e.g. a
    /// fixed-size array with the wrong length.
    fn write(
        &self,
        value: &Self::Entity,
        cursor: &mut ByteCursor,
    ) -> Result<(), ProtocolError>;

    /// Reads one object from `cursor`, in the order `write` produced.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Underflow`] if the cursor runs out before
    /// the last field, never a partially-populated object.
    fn read(&self, cursor: &mut ByteCursor) -> Result<Self::Entity, ProtocolError>;

    /// Encodes `value` into a standalone payload.
    fn encode(&self, value: &Self::Entity) -> Result<Bytes, ProtocolError> {
        let mut cursor = ByteCursor::with_capacity(128);
        self.write(value, &mut cursor)?;
        Ok(cursor.into_bytes())
    }

    /// Decodes a standalone payload.
    ///
    /// Bytes after the last known field are ignored, so payloads written
    /// by a build that appended new fields still decode.
    fn decode(&self, data: &[u8]) -> Result<Self::Entity, ProtocolError> {
        let mut cursor = ByteCursor::from_slice(data);
        let value = self.read(&mut cursor)?;
        if cursor.remaining() > 0 {
            let kind = <Self::Entity as GameObject>::KIND;
            tracing::trace!(
                %kind,
                trailing = cursor.remaining(),
                "ignoring trailing bytes after entity payload"
            );
        }
        Ok(value)
    }
}
