//! Versioned entity blobs for persistence.
//!
//! A blob is one format-version byte followed by the codec's payload.
//! Storage treats it as opaque; only this module looks inside.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{EntityCodec, ProtocolError};

/// The wire and blob format version this build reads and writes.
pub const FORMAT_VERSION: u8 = 1;

/// Prefixes `payload` with [`FORMAT_VERSION`].
pub fn seal(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(payload.len() + 1);
    out.put_u8(FORMAT_VERSION);
    out.put_slice(payload);
    out.freeze()
}

/// Checks the version byte and returns the payload after it.
///
/// # Errors
/// [`ProtocolError::FormatVersionMismatch`] for any other version; no
/// best-effort decode is attempted.
pub fn open(blob: &[u8]) -> Result<&[u8], ProtocolError> {
    let (&found, payload) = blob.split_first().ok_or(ProtocolError::Underflow {
        needed: 1,
        remaining: 0,
    })?;
    if found != FORMAT_VERSION {
        return Err(ProtocolError::FormatVersionMismatch {
            expected: FORMAT_VERSION,
            found,
        });
    }
    Ok(payload)
}

/// Encodes `value` with `codec` and seals it.
pub fn encode_blob<C: EntityCodec>(
    codec: &C,
    value: &C::Entity,
) -> Result<Bytes, ProtocolError> {
    Ok(seal(&codec.encode(value)?))
}

/// Opens a sealed blob and decodes it with `codec`.
pub fn decode_blob<C: EntityCodec>(
    codec: &C,
    blob: &[u8],
) -> Result<C::Entity, ProtocolError> {
    codec.decode(open(blob)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GameLimits, Npc, NpcCodec};

    #[test]
    fn test_seal_prefixes_version() {
        let blob = seal(&[0xaa, 0xbb]);
        assert_eq!(blob.as_ref(), &[FORMAT_VERSION, 0xaa, 0xbb]);
        assert_eq!(open(&blob).unwrap(), &[0xaa, 0xbb]);
    }

    #[test]
    fn test_unknown_version_is_surfaced() {
        let err = open(&[FORMAT_VERSION + 1, 0, 0]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FormatVersionMismatch {
                expected: FORMAT_VERSION,
                found: FORMAT_VERSION + 1
            }
        );
    }

    #[test]
    fn test_empty_blob_underflows() {
        assert!(matches!(open(&[]), Err(ProtocolError::Underflow { .. })));
    }

    #[test]
    fn test_npc_blob_round_trip() {
        let codec = NpcCodec::new(GameLimits::default());
        let mut npc = Npc::new(codec.limits());
        npc.name = "Bat".into();
        let blob = encode_blob(&codec, &npc).unwrap();
        assert_eq!(blob[0], FORMAT_VERSION);
        assert_eq!(decode_blob(&codec, &blob).unwrap(), npc);
    }
}
