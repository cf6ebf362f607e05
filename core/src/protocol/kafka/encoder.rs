//! Encoding of Kafka wire primitives on top of [`bytes::BufMut`].
//!
//! The mirror image of [`super::decoder::ByteCursor`]: compact lengths are
//! written as unsigned varints holding `N + 1`, so any length round-trips,
//! and values up to 126 stay a single byte.

use bytes::BufMut;
use uuid::Uuid;

/// Kafka primitive writers for any [`BufMut`].
pub trait KafkaBufMutExt: BufMut {
    fn put_unsigned_varint(&mut self, value: u32) {
        self.put_unsigned_varlong(value as u64);
    }

    fn put_unsigned_varlong(&mut self, value: u64) {
        let mut val = value;
        loop {
            let mut byte = (val & 0x7F) as u8;
            val >>= 7;
            if val != 0 {
                byte |= 0x80;
            }
            self.put_u8(byte);
            if val == 0 {
                break;
            }
        }
    }

    /// Zigzag-encoded signed varint.
    fn put_varint(&mut self, value: i32) {
        self.put_unsigned_varint(((value << 1) ^ (value >> 31)) as u32);
    }

    fn put_varlong(&mut self, value: i64) {
        self.put_unsigned_varlong(((value << 1) ^ (value >> 63)) as u64);
    }

    fn put_bool(&mut self, value: bool) {
        self.put_u8(value as u8);
    }

    fn put_uuid(&mut self, id: &Uuid) {
        self.put_slice(id.as_bytes());
    }

    fn put_string(&mut self, s: &str) {
        self.put_i16(s.len() as i16);
        self.put_slice(s.as_bytes());
    }

    fn put_nullable_string(&mut self, s: Option<&str>) {
        match s {
            Some(s) => self.put_string(s),
            None => self.put_i16(-1),
        }
    }

    fn put_compact_string(&mut self, s: &str) {
        self.put_unsigned_varint(s.len() as u32 + 1);
        self.put_slice(s.as_bytes());
    }

    fn put_compact_nullable_string(&mut self, s: Option<&str>) {
        match s {
            Some(s) => self.put_compact_string(s),
            None => self.put_u8(0),
        }
    }

    fn put_string_versioned(&mut self, s: &str, flexible: bool) {
        if flexible {
            self.put_compact_string(s);
        } else {
            self.put_string(s);
        }
    }

    fn put_nullable_bytes(&mut self, bytes: Option<&[u8]>) {
        match bytes {
            Some(bytes) => {
                self.put_i32(bytes.len() as i32);
                self.put_slice(bytes);
            }
            None => self.put_i32(-1),
        }
    }

    fn put_compact_nullable_bytes(&mut self, bytes: Option<&[u8]>) {
        match bytes {
            Some(bytes) => {
                self.put_unsigned_varint(bytes.len() as u32 + 1);
                self.put_slice(bytes);
            }
            None => self.put_u8(0),
        }
    }

    fn put_nullable_bytes_versioned(&mut self, bytes: Option<&[u8]>, flexible: bool) {
        if flexible {
            self.put_compact_nullable_bytes(bytes);
        } else {
            self.put_nullable_bytes(bytes);
        }
    }

    fn put_array_len(&mut self, len: usize) {
        self.put_i32(len as i32);
    }

    fn put_compact_array_len(&mut self, len: usize) {
        self.put_unsigned_varint(len as u32 + 1);
    }

    fn put_array_len_versioned(&mut self, len: usize, flexible: bool) {
        if flexible {
            self.put_compact_array_len(len);
        } else {
            self.put_array_len(len);
        }
    }

    fn put_compact_i32_array(&mut self, values: &[i32]) {
        self.put_compact_array_len(values.len());
        for value in values {
            self.put_i32(*value);
        }
    }

    fn put_empty_tagged_fields(&mut self) {
        self.put_u8(0);
    }
}

impl<T: BufMut> KafkaBufMutExt for T {}
