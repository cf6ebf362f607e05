//! Cursor-based decoding of Kafka wire primitives.
//!
//! [`ByteCursor`] borrows a single frame and hands out fixed-width integers,
//! strings, UUIDs, varints and tagged-field sections. Every read is bounds
//! checked; running off the end of the frame yields
//! [`KafkaCodecError::BufferUnderrun`] and leaves the offset where it was.
//!
//! ```text
//! int8/16/32/64         => big-endian two's complement
//! STRING                => int16 N, N bytes
//! NULLABLE_STRING       => int16 N (-1 = null), N bytes
//! COMPACT_STRING        => uvarint N+1 (0 = null), N bytes
//! COMPACT_ARRAY         => uvarint N+1 (0 = null), N elements
//! UUID                  => 16 raw bytes
//! TAGGED_FIELDS         => uvarint count, count * (uvarint tag, uvarint size, bytes)
//! ```

use bytes::{Buf, Bytes, TryGetError};
use tracing::debug;
use uuid::Uuid;

use super::codec::{KafkaCodecError, Result};
use super::messages::{TaggedField, TaggedFields};

/// Read position over a borrowed frame.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if available < needed {
            return Err(KafkaCodecError::BufferUnderrun { needed, available });
        }
        Ok(())
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.read_slice(len).map(Bytes::copy_from_slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_slice(len).map(|_| ())
    }

    /// Runs a fixed-width `Buf` read over the unread bytes. The offset only
    /// moves when the read succeeds.
    fn read_fixed<T>(
        &mut self,
        get: impl FnOnce(&mut &'a [u8]) -> std::result::Result<T, TryGetError>,
    ) -> Result<T> {
        let mut rest = &self.buffer[self.offset..];
        let value = get(&mut rest)?;
        self.offset = self.buffer.len() - rest.len();
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_fixed(|buf| buf.try_get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_fixed(|buf| buf.try_get_i8())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_fixed(|buf| buf.try_get_i16())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_fixed(|buf| buf.try_get_i32())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_fixed(|buf| buf.try_get_u32())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_fixed(|buf| buf.try_get_i64())
    }

    /// 16 raw bytes, no textual form on the wire.
    pub fn read_uuid(&mut self) -> Result<Uuid> {
        self.read_fixed(|buf| buf.try_get_u128()).map(Uuid::from_u128)
    }

    // ========================================================================
    // VARINTS
    // ========================================================================

    /// Unsigned LEB128 varint, at most 5 bytes.
    pub fn read_unsigned_varint(&mut self) -> Result<u32> {
        let start = self.offset;
        let mut value = 0u32;
        for i in 0..5 {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(e) => {
                    self.offset = start;
                    return Err(e);
                }
            };
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        self.offset = start;
        Err(KafkaCodecError::VarintTooLong)
    }

    /// Unsigned LEB128 varint, at most 10 bytes.
    pub fn read_unsigned_varlong(&mut self) -> Result<u64> {
        let start = self.offset;
        let mut value = 0u64;
        for i in 0..10 {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(e) => {
                    self.offset = start;
                    return Err(e);
                }
            };
            value |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        self.offset = start;
        Err(KafkaCodecError::VarintTooLong)
    }

    /// Zigzag-encoded signed 32-bit varint.
    pub fn read_varint(&mut self) -> Result<i32> {
        let raw = self.read_unsigned_varint()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    /// Zigzag-encoded signed 64-bit varint.
    pub fn read_varlong(&mut self) -> Result<i64> {
        let raw = self.read_unsigned_varlong()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    // ========================================================================
    // STRINGS AND BYTES
    // ========================================================================

    fn read_utf8(&mut self, len: usize) -> Result<String> {
        let raw = self.read_slice(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| KafkaCodecError::InvalidUtf8)
    }

    /// int16-prefixed string; `-1` means null and consumes nothing further.
    pub fn read_nullable_string(&mut self) -> Result<Option<String>> {
        let len = self.read_i16()?;
        match len {
            -1 => Ok(None),
            n if n < -1 => Err(KafkaCodecError::InvalidLength(n as i64)),
            n => self.read_utf8(n as usize).map(Some),
        }
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.read_nullable_string()?
            .ok_or_else(|| KafkaCodecError::InvalidFormat("unexpected null string".to_string()))
    }

    /// Compact string; a zero length prefix (null) reads as the empty string.
    pub fn read_compact_string(&mut self) -> Result<String> {
        Ok(self.read_compact_nullable_string()?.unwrap_or_default())
    }

    pub fn read_compact_nullable_string(&mut self) -> Result<Option<String>> {
        match self.read_unsigned_varint()? {
            0 => Ok(None),
            n => self.read_utf8((n - 1) as usize).map(Some),
        }
    }

    pub fn read_nullable_bytes(&mut self) -> Result<Option<Bytes>> {
        let len = self.read_i32()?;
        match len {
            -1 => Ok(None),
            n if n < -1 => Err(KafkaCodecError::InvalidLength(n as i64)),
            n => self.read_bytes(n as usize).map(Some),
        }
    }

    pub fn read_compact_nullable_bytes(&mut self) -> Result<Option<Bytes>> {
        match self.read_unsigned_varint()? {
            0 => Ok(None),
            n => self.read_bytes((n - 1) as usize).map(Some),
        }
    }

    // ========================================================================
    // ARRAYS
    // ========================================================================

    /// int32 element count; `None` for a null array.
    pub fn read_array_len(&mut self) -> Result<Option<usize>> {
        match self.read_i32()? {
            -1 => Ok(None),
            n if n < -1 => Err(KafkaCodecError::InvalidLength(n as i64)),
            n => Ok(Some(n as usize)),
        }
    }

    /// Compact element count (uvarint N+1); `None` for a null array.
    pub fn read_compact_array_len(&mut self) -> Result<Option<usize>> {
        match self.read_unsigned_varint()? {
            0 => Ok(None),
            n => Ok(Some((n - 1) as usize)),
        }
    }

    /// Array length in either encoding, null folded into zero.
    pub fn read_array_len_versioned(&mut self, flexible: bool) -> Result<usize> {
        let len = if flexible {
            self.read_compact_array_len()?
        } else {
            self.read_array_len()?
        };
        Ok(len.unwrap_or(0))
    }

    pub fn read_string_versioned(&mut self, flexible: bool) -> Result<String> {
        if flexible {
            self.read_compact_string()
        } else {
            self.read_string()
        }
    }

    // ========================================================================
    // TAGGED FIELDS (KIP-482)
    // ========================================================================

    /// Reads a complete tagged-field section. Unknown tags are retained, never
    /// rejected.
    pub fn read_tagged_fields(&mut self) -> Result<TaggedFields> {
        let count = self.read_unsigned_varint()?;
        if count == 0 {
            return Ok(TaggedFields::default());
        }

        debug!("Decoding {} tagged fields", count);
        let mut fields = Vec::with_capacity(count.min(64) as usize);
        for _ in 0..count {
            let tag = self.read_unsigned_varint()?;
            let size = self.read_unsigned_varint()? as usize;
            let data = self.read_bytes(size)?;
            fields.push(TaggedField { tag, data });
        }
        Ok(TaggedFields(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_reads() {
        let data = [
            0x7f, // i8
            0xff, 0xfe, // i16
            0x00, 0x00, 0x01, 0x00, // i32
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2a, // i64
        ];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_i8().unwrap(), 127);
        assert_eq!(cursor.read_i16().unwrap(), -2);
        assert_eq!(cursor.read_i32().unwrap(), 256);
        assert_eq!(cursor.read_i64().unwrap(), 42);
        assert_eq!(cursor.offset(), data.len());
        assert!(!cursor.has_remaining());
    }

    #[test]
    fn test_truncated_read_reports_underrun() {
        let data = [0x00, 0x01, 0x02];
        let mut cursor = ByteCursor::new(&data);
        match cursor.read_i32() {
            Err(KafkaCodecError::BufferUnderrun { needed, available }) => {
                assert_eq!(needed, 4);
                assert_eq!(available, 3);
            }
            other => panic!("Expected buffer underrun, got {:?}", other),
        }
        // Failed reads do not move the cursor
        assert_eq!(cursor.offset(), 0);
        assert_eq!(cursor.read_i16().unwrap(), 1);
    }

    #[test]
    fn test_truncated_uuid_reports_underrun() {
        let data = [0xAB; 15];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            cursor.read_uuid(),
            Err(KafkaCodecError::BufferUnderrun { needed: 16, available: 15 })
        ));
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn test_nullable_string() {
        let data = [0xff, 0xff, 0x00, 0x03, b'a', b'b', b'c'];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_nullable_string().unwrap(), None);
        assert_eq!(cursor.offset(), 2);
        assert_eq!(
            cursor.read_nullable_string().unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(cursor.offset(), 7);
    }

    #[test]
    fn test_nullable_string_rejects_negative_length() {
        let data = [0xff, 0xfe];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            cursor.read_nullable_string(),
            Err(KafkaCodecError::InvalidLength(-2))
        ));
    }

    #[test]
    fn test_compact_string() {
        let data = [0x00, 0x01, 0x04, b'f', b'o', b'o'];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_compact_string().unwrap(), "");
        assert_eq!(cursor.offset(), 1);
        assert_eq!(cursor.read_compact_string().unwrap(), "");
        assert_eq!(cursor.offset(), 2);
        assert_eq!(cursor.read_compact_string().unwrap(), "foo");
        assert_eq!(cursor.offset(), 6);
    }

    #[test]
    fn test_compact_string_truncated() {
        let data = [0x05, b'a', b'b'];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            cursor.read_compact_string(),
            Err(KafkaCodecError::BufferUnderrun { needed: 4, available: 2 })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let data = [0x03, 0xc3, 0x28];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            cursor.read_compact_string(),
            Err(KafkaCodecError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_uuid_is_raw_bytes() {
        let data: Vec<u8> = (0u8..16).collect();
        let mut cursor = ByteCursor::new(&data);
        let id = cursor.read_uuid().unwrap();
        assert_eq!(id.as_bytes().as_slice(), data.as_slice());
        assert_eq!(cursor.offset(), 16);
    }

    #[test]
    fn test_unsigned_varint() {
        let cases: &[(&[u8], u32)] = &[
            (&[0x00], 0),
            (&[0x01], 1),
            (&[0x7f], 127),
            (&[0x80, 0x01], 128),
            (&[0xac, 0x02], 300),
            (&[0xff, 0xff, 0xff, 0xff, 0x0f], u32::MAX),
        ];
        for (bytes, expected) in cases {
            let mut cursor = ByteCursor::new(bytes);
            assert_eq!(cursor.read_unsigned_varint().unwrap(), *expected);
            assert_eq!(cursor.offset(), bytes.len());
        }
    }

    #[test]
    fn test_unsigned_varint_too_long() {
        let data = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            cursor.read_unsigned_varint(),
            Err(KafkaCodecError::VarintTooLong)
        ));
    }

    #[test]
    fn test_zigzag_varint() {
        let cases: &[(&[u8], i32)] = &[
            (&[0x00], 0),
            (&[0x01], -1),
            (&[0x02], 1),
            (&[0x03], -2),
            (&[0x04], 2),
            (&[0x7f], -64),
            (&[0x80, 0x01], 64),
        ];
        for (bytes, expected) in cases {
            let mut cursor = ByteCursor::new(bytes);
            assert_eq!(cursor.read_varint().unwrap(), *expected);
        }

        let mut cursor = ByteCursor::new(&[0x01]);
        assert_eq!(cursor.read_varlong().unwrap(), -1);
    }

    #[test]
    fn test_compact_array_len() {
        let data = [0x00, 0x01, 0x04];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_compact_array_len().unwrap(), None);
        assert_eq!(cursor.read_compact_array_len().unwrap(), Some(0));
        assert_eq!(cursor.read_compact_array_len().unwrap(), Some(3));
    }

    #[test]
    fn test_empty_tagged_fields() {
        let data = [0x00];
        let mut cursor = ByteCursor::new(&data);
        let fields = cursor.read_tagged_fields().unwrap();
        assert!(fields.is_empty());
        assert_eq!(cursor.offset(), 1);
    }

    #[test]
    fn test_nonzero_tagged_fields_are_kept() {
        // two fields: tag 0 with 2 bytes, tag 5 with 0 bytes
        let data = [0x02, 0x00, 0x02, 0xab, 0xcd, 0x05, 0x00, 0x99];
        let mut cursor = ByteCursor::new(&data);
        let fields = cursor.read_tagged_fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.0[0].tag, 0);
        assert_eq!(fields.0[0].data.as_ref(), &[0xab, 0xcd]);
        assert_eq!(fields.0[1].tag, 5);
        assert!(fields.0[1].data.is_empty());
        assert_eq!(cursor.remaining(), 1);
    }
}
