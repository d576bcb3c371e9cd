//! Primitive decoding for the scene format.
//!
//! Implements little-endian fixed-width values, varuints, compound ids and
//! length-prefixed data.

use crate::error::DecodeError;
use crate::limits::MAX_VARINT_BYTES;
use crate::model::CrdtId;

/// How invalid UTF-8 in text payloads is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Utf8Policy {
    /// Fail with `InvalidEncoding`.
    #[default]
    Strict,
    /// Replace invalid sequences with U+FFFD.
    Lossy,
}

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling. Offsets in errors are
/// absolute: a reader created with [`Reader::with_offset`] or
/// [`Reader::sub_reader`] reports positions relative to the document.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_offset(data, 0)
    }

    /// Creates a reader whose first byte sits at `base` in the document.
    pub fn with_offset(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Returns the current position within this reader.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the absolute document offset of the next byte.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Returns the remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Returns the bytes read since position `start`.
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data[start.min(self.pos)..self.pos]
    }

    /// Consumes and returns everything that is left.
    pub fn take_remaining(&mut self) -> &'a [u8] {
        let rest = self.remaining();
        self.pos = self.data.len();
        rest
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let byte = *self.data.get(self.pos).ok_or(DecodeError::TruncatedInput {
            context,
            offset: self.offset(),
        })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::TruncatedInput {
                context,
                offset: self.offset(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, context)?);
        Ok(out)
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self, context: &'static str) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian u64.
    pub fn read_u64(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian f32.
    pub fn read_f32(&mut self, context: &'static str) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian f64.
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a byte as a bool; any non-zero value is true.
    pub fn read_bool(&mut self, context: &'static str) -> Result<bool, DecodeError> {
        Ok(self.read_u8(context)? != 0)
    }

    /// Reads an unsigned varint (LEB128).
    #[inline]
    pub fn read_varuint(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        let start = self.offset();
        let mut result: u64 = 0;
        let mut shift = 0;

        for _ in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8(context)?;
            let value = (byte & 0x7F) as u64;

            // Check for overflow
            if shift == 63 && value > 1 {
                return Err(DecodeError::MalformedVarint { offset: start });
            }

            result |= value << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }

        Err(DecodeError::MalformedVarint { offset: start })
    }

    /// Reads a varuint that must fit in `usize` and stay within `max`.
    pub fn read_length(&mut self, max: usize, field: &'static str) -> Result<usize, DecodeError> {
        let len = self.read_varuint(field)?;
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        if len > max {
            return Err(DecodeError::LengthExceedsLimit { field, len, max });
        }
        Ok(len)
    }

    /// Reads a compound id as two varuints.
    #[inline]
    pub fn read_crdt_id(&mut self, context: &'static str) -> Result<CrdtId, DecodeError> {
        let high = self.read_varuint(context)?;
        let low = self.read_varuint(context)?;
        Ok(CrdtId::new(high, low))
    }

    /// Reads a varuint-length-prefixed byte array.
    pub fn read_bytes_prefixed(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<&'a [u8], DecodeError> {
        let len = self.read_length(max_len, field)?;
        self.read_bytes(len, field)
    }

    /// Reads a varuint-length-prefixed UTF-8 string.
    pub fn read_string(
        &mut self,
        max_len: usize,
        policy: Utf8Policy,
        field: &'static str,
    ) -> Result<String, DecodeError> {
        let offset = self.offset();
        let bytes = self.read_bytes_prefixed(max_len, field)?;
        decode_utf8(bytes, policy, field, offset)
    }

    /// Splits off a bounded reader over the next `len` bytes.
    ///
    /// `self` advances past all `len` bytes immediately, so whatever the
    /// sub-reader's consumer leaves unread is skipped.
    pub fn sub_reader(&mut self, len: usize, context: &'static str) -> Result<Reader<'a>, DecodeError> {
        let offset = self.offset();
        let bytes = self.read_bytes(len, context)?;
        Ok(Reader::with_offset(bytes, offset))
    }
}

/// Decodes `bytes` as UTF-8 under `policy`.
pub fn decode_utf8(
    bytes: &[u8],
    policy: Utf8Policy,
    field: &'static str,
    offset: usize,
) -> Result<String, DecodeError> {
    match policy {
        Utf8Policy::Strict => std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|_| DecodeError::InvalidEncoding { field, offset }),
        Utf8Policy::Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}
