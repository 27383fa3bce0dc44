//! Sequential binary buffer every entity codec is built on.
//!
//! # Byte order
//!
//! All multi-byte integers are **little-endian**. This is the
//! interoperability contract with deployed clients and persisted blobs;
//! there is no big-endian variant anywhere in the protocol.
//!
//! # Strings
//!
//! A string is a signed 32-bit byte length followed by that many bytes of
//! UTF-8. A length of `-1` is the null marker used for optional strings
//! (an unset sprite or face). An empty string (`0`) and the null marker
//! are distinct values.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{ObjectId, ProtocolError};

/// Length prefix that marks an absent optional string.
pub const NULL_STRING: i32 = -1;

/// Sentinel written for an optional object reference that is unset.
pub const NO_REFERENCE: i32 = -1;

/// A growable byte buffer with a read position.
///
/// Writes always append; reads consume from the front and can never move
/// past the last written byte. A read that would do so fails with
/// [`ProtocolError::Underflow`]. Any read that fails, for whatever reason,
/// leaves the position untouched.
///
/// A cursor is meant to live for one encode or one decode and then be
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct ByteCursor {
    data: BytesMut,
    read_pos: usize,
}

impl ByteCursor {
    /// Creates an empty cursor for writing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cursor with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            read_pos: 0,
        }
    }

    /// Creates a cursor positioned at the start of `bytes`, ready to read.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
            read_pos: 0,
        }
    }

    // ============ Properties ============

    /// Total number of bytes written.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current read position.
    #[inline]
    pub fn position(&self) -> usize {
        self.read_pos
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Everything written so far.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Finalizes the buffer for transmission.
    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }

    /// Clears the buffer and read position so the cursor can be reused.
    pub fn reset(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    /// Moves the read position back to the start without discarding data.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    // ============ Writing ============

    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.put_i32_le(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.data.put_i64_le(value);
    }

    /// Writes a boolean as a single byte (`0` or `1`).
    pub fn write_bool(&mut self, value: bool) {
        self.data.put_u8(u8::from(value));
    }

    /// Appends raw bytes with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> Result<(), ProtocolError> {
        let len = i32::try_from(value.len())
            .map_err(|_| ProtocolError::InvalidLength(value.len() as i64))?;
        self.write_i32(len);
        self.write_bytes(value.as_bytes());
        Ok(())
    }

    /// Writes an optional string, using the null marker for `None`.
    pub fn write_opt_string(
        &mut self,
        value: Option<&str>,
    ) -> Result<(), ProtocolError> {
        match value {
            Some(s) => self.write_string(s),
            None => {
                self.write_i32(NULL_STRING);
                Ok(())
            }
        }
    }

    /// Writes the count prefix of a variable-length list.
    pub fn write_count(&mut self, count: usize) -> Result<(), ProtocolError> {
        let count = i32::try_from(count)
            .map_err(|_| ProtocolError::InvalidLength(count as i64))?;
        self.write_i32(count);
        Ok(())
    }

    /// Writes a required object id.
    pub fn write_object_id(&mut self, id: ObjectId) -> Result<(), ProtocolError> {
        let raw = i32::try_from(id.0)
            .map_err(|_| ProtocolError::InvalidReference(i64::from(id.0)))?;
        self.write_i32(raw);
        Ok(())
    }

    /// Writes an optional object reference, using `-1` for `None`.
    pub fn write_object_ref(
        &mut self,
        id: Option<ObjectId>,
    ) -> Result<(), ProtocolError> {
        match id {
            Some(id) => self.write_object_id(id),
            None => {
                self.write_i32(NO_REFERENCE);
                Ok(())
            }
        }
    }

    // ============ Reading ============

    /// Consumes exactly `n` bytes, or fails without consuming anything.
    fn take(&mut self, n: usize) -> Result<&[u8], ProtocolError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(ProtocolError::Underflow {
                needed: n,
                remaining,
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.data[start..self.read_pos])
    }

    /// Runs a multi-step read, rewinding to where it started if any step
    /// fails.
    fn rollback_on_err<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        let start = self.read_pos;
        let result = read(self);
        if result.is_err() {
            self.read_pos = start;
        }
        result
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    /// Reads a one-byte boolean. Any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes, ProtocolError> {
        Ok(Bytes::copy_from_slice(self.take(n)?))
    }

    /// Reads everything that is left.
    pub fn read_remaining(&mut self) -> Bytes {
        let start = self.read_pos;
        self.read_pos = self.data.len();
        Bytes::copy_from_slice(&self.data[start..])
    }

    /// Reads a required length-prefixed string.
    ///
    /// The null marker is rejected here; use
    /// [`read_opt_string`](Self::read_opt_string) for optional fields.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        self.rollback_on_err(|c| {
            c.read_opt_string()?.ok_or_else(|| {
                ProtocolError::InvalidMessage("unexpected null string".into())
            })
        })
    }

    /// Reads an optional length-prefixed string.
    pub fn read_opt_string(&mut self) -> Result<Option<String>, ProtocolError> {
        self.rollback_on_err(|c| {
            let len = c.read_i32()?;
            if len == NULL_STRING {
                return Ok(None);
            }
            let len = usize::try_from(len)
                .map_err(|_| ProtocolError::InvalidLength(i64::from(len)))?;
            let bytes = c.take(len)?.to_vec();
            String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| ProtocolError::InvalidUtf8)
        })
    }

    /// Reads the count prefix of a list whose elements are at least
    /// `min_element_size` bytes each.
    ///
    /// A count that could not possibly fit in the remaining bytes fails
    /// with `Underflow` before the caller allocates anything for it.
    pub fn read_count(
        &mut self,
        min_element_size: usize,
    ) -> Result<usize, ProtocolError> {
        self.rollback_on_err(|c| {
            let raw = c.read_i32()?;
            let count = usize::try_from(raw)
                .map_err(|_| ProtocolError::InvalidLength(i64::from(raw)))?;
            let needed = count.saturating_mul(min_element_size);
            if needed > c.remaining() {
                return Err(ProtocolError::Underflow {
                    needed,
                    remaining: c.remaining(),
                });
            }
            Ok(count)
        })
    }

    /// Reads a required object id.
    pub fn read_object_id(&mut self) -> Result<ObjectId, ProtocolError> {
        self.rollback_on_err(|c| {
            let raw = c.read_i32()?;
            u32::try_from(raw)
                .map(ObjectId)
                .map_err(|_| ProtocolError::InvalidReference(i64::from(raw)))
        })
    }

    /// Reads an optional object reference; `-1` decodes as `None`.
    pub fn read_object_ref(&mut self) -> Result<Option<ObjectId>, ProtocolError> {
        self.rollback_on_err(|c| match c.read_i32()? {
            NO_REFERENCE => Ok(None),
            raw if raw < 0 => {
                Err(ProtocolError::InvalidReference(i64::from(raw)))
            }
            raw => Ok(Some(ObjectId(raw as u32))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_little_endian() {
        let mut cursor = ByteCursor::new();
        cursor.write_i32(0x0102_0304);
        assert_eq!(cursor.as_slice(), &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_reads_mirror_writes() {
        let mut cursor = ByteCursor::new();
        cursor.write_u8(7);
        cursor.write_i32(-42);
        cursor.write_i64(1 << 40);
        cursor.write_bool(true);
        cursor.write_string("Goblin").unwrap();
        cursor.write_opt_string(None).unwrap();

        assert_eq!(cursor.read_u8().unwrap(), 7);
        assert_eq!(cursor.read_i32().unwrap(), -42);
        assert_eq!(cursor.read_i64().unwrap(), 1 << 40);
        assert!(cursor.read_bool().unwrap());
        assert_eq!(cursor.read_string().unwrap(), "Goblin");
        assert_eq!(cursor.read_opt_string().unwrap(), None);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_read_past_end_underflows() {
        let mut cursor = ByteCursor::from_slice(&[1, 2, 3]);
        let err = cursor.read_i32().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Underflow {
                needed: 4,
                remaining: 3
            }
        );
        // The failed read consumed nothing.
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_empty_string_differs_from_null() {
        let mut cursor = ByteCursor::new();
        cursor.write_opt_string(Some("")).unwrap();
        cursor.write_opt_string(None).unwrap();
        assert_eq!(cursor.read_opt_string().unwrap(), Some(String::new()));
        assert_eq!(cursor.read_opt_string().unwrap(), None);
    }

    #[test]
    fn test_required_string_rejects_null_marker() {
        let mut cursor = ByteCursor::new();
        cursor.write_opt_string(None).unwrap();
        assert!(matches!(
            cursor.read_string(),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_truncated_string_underflows_and_restores_position() {
        let mut cursor = ByteCursor::new();
        cursor.write_string("Goblin").unwrap();
        let mut truncated = ByteCursor::from_slice(&cursor.as_slice()[..6]);
        assert!(matches!(
            truncated.read_string(),
            Err(ProtocolError::Underflow { .. })
        ));
        assert_eq!(truncated.position(), 0);
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let mut cursor = ByteCursor::new();
        cursor.write_i32(2);
        cursor.write_bytes(&[0xff, 0xfe]);
        assert_eq!(cursor.read_string(), Err(ProtocolError::InvalidUtf8));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_negative_string_length_is_rejected() {
        let mut cursor = ByteCursor::new();
        cursor.write_i32(-5);
        assert_eq!(cursor.read_string(), Err(ProtocolError::InvalidLength(-5)));
    }

    #[test]
    fn test_count_larger_than_buffer_underflows() {
        let mut cursor = ByteCursor::new();
        cursor.write_i32(1_000_000);
        cursor.write_i32(1);
        assert!(matches!(
            cursor.read_count(4),
            Err(ProtocolError::Underflow { .. })
        ));
        // The count is still there for a caller that wants to inspect it.
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.read_i32().unwrap(), 1_000_000);
    }

    #[test]
    fn test_failed_reads_leave_position_untouched() {
        let mut cursor = ByteCursor::new();
        cursor.write_i32(-7);
        cursor.write_i32(NULL_STRING);

        assert!(cursor.read_object_id().is_err());
        assert!(cursor.read_object_ref().is_err());
        assert!(cursor.read_count(1).is_err());
        assert_eq!(cursor.position(), 0);

        cursor.read_i32().unwrap();
        assert!(cursor.read_string().is_err());
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.read_opt_string().unwrap(), None);
    }

    #[test]
    fn test_object_ref_sentinel() {
        let mut cursor = ByteCursor::new();
        cursor.write_object_ref(None).unwrap();
        cursor.write_object_ref(Some(ObjectId(9))).unwrap();
        cursor.write_i32(-7);

        assert_eq!(cursor.read_object_ref().unwrap(), None);
        assert_eq!(cursor.read_object_ref().unwrap(), Some(ObjectId(9)));
        assert_eq!(
            cursor.read_object_ref(),
            Err(ProtocolError::InvalidReference(-7))
        );
    }

    #[test]
    fn test_object_id_out_of_wire_range() {
        let mut cursor = ByteCursor::new();
        let err = cursor.write_object_id(ObjectId(u32::MAX)).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidReference(_)));
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_reset_and_rewind() {
        let mut cursor = ByteCursor::new();
        cursor.write_i32(5);
        assert_eq!(cursor.read_i32().unwrap(), 5);

        cursor.rewind();
        assert_eq!(cursor.read_i32().unwrap(), 5);

        cursor.reset();
        assert!(cursor.is_empty());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_read_remaining_drains() {
        let mut cursor = ByteCursor::from_slice(&[1, 2, 3, 4, 5]);
        cursor.read_u8().unwrap();
        assert_eq!(cursor.read_remaining().as_ref(), &[2, 3, 4, 5]);
        assert_eq!(cursor.remaining(), 0);
    }
}
