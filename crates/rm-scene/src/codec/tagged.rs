//! Tagged field framing.
//!
//! Block bodies are sequences of fields. Each field starts with a varuint
//! tag: the low nibble is the wire type, the remaining bits the field index.
//! Every wire type determines its own size, so a reader can step over
//! fields it does not know.

use crate::codec::primitives::{Reader, Utf8Policy, decode_utf8};
use crate::crdt::LwwValue;
use crate::error::DecodeError;
use crate::limits::MAX_STRING_LEN;
use crate::model::CrdtId;

/// Wire type of a tagged field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TagType {
    /// One byte: u8 or bool.
    Byte1 = 0x1,
    /// Four bytes: u32 or f32.
    Byte4 = 0x4,
    /// Eight bytes: f64.
    Byte8 = 0x8,
    /// u32 length followed by that many bytes.
    Length4 = 0xC,
    /// Compound id.
    Id = 0xF,
}

impl TagType {
    /// Creates a TagType from its wire representation.
    pub fn from_u8(v: u8) -> Option<TagType> {
        match v {
            0x1 => Some(TagType::Byte1),
            0x4 => Some(TagType::Byte4),
            0x8 => Some(TagType::Byte8),
            0xC => Some(TagType::Length4),
            0xF => Some(TagType::Id),
            _ => None,
        }
    }
}

/// Decoded payload of one field.
#[derive(Debug, Clone)]
pub enum FieldValue<'a> {
    Byte1(u8),
    Byte4(u32),
    Byte8(u64),
    Id(CrdtId),
    Sub(Reader<'a>),
}

impl FieldValue<'_> {
    pub fn tag_type(&self) -> TagType {
        match self {
            FieldValue::Byte1(_) => TagType::Byte1,
            FieldValue::Byte4(_) => TagType::Byte4,
            FieldValue::Byte8(_) => TagType::Byte8,
            FieldValue::Id(_) => TagType::Id,
            FieldValue::Sub(_) => TagType::Length4,
        }
    }
}

/// One tagged field.
#[derive(Debug, Clone)]
pub struct Field<'a> {
    pub index: u64,
    pub value: FieldValue<'a>,
    /// The complete field bytes, tag included.
    pub raw: &'a [u8],
    /// Absolute offset of the tag.
    pub offset: usize,
}

fn malformed(offset: usize, reason: &'static str) -> DecodeError {
    DecodeError::MalformedBlock {
        kind: None,
        offset,
        reason,
    }
}

impl<'a> Field<'a> {
    fn mismatch(&self) -> DecodeError {
        malformed(self.offset, "field has an unexpected wire type")
    }

    pub fn as_u8(&self) -> Result<u8, DecodeError> {
        match self.value {
            FieldValue::Byte1(v) => Ok(v),
            _ => Err(self.mismatch()),
        }
    }

    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        self.as_u8().map(|v| v != 0)
    }

    pub fn as_u32(&self) -> Result<u32, DecodeError> {
        match self.value {
            FieldValue::Byte4(v) => Ok(v),
            _ => Err(self.mismatch()),
        }
    }

    pub fn as_f32(&self) -> Result<f32, DecodeError> {
        self.as_u32().map(f32::from_bits)
    }

    pub fn as_f64(&self) -> Result<f64, DecodeError> {
        match self.value {
            FieldValue::Byte8(v) => Ok(f64::from_bits(v)),
            _ => Err(self.mismatch()),
        }
    }

    pub fn as_id(&self) -> Result<CrdtId, DecodeError> {
        match self.value {
            FieldValue::Id(id) => Ok(id),
            _ => Err(self.mismatch()),
        }
    }

    /// Returns a reader over the field's nested bytes.
    pub fn into_sub(self) -> Result<Reader<'a>, DecodeError> {
        match self.value {
            FieldValue::Sub(reader) => Ok(reader),
            _ => Err(malformed(self.offset, "field has an unexpected wire type")),
        }
    }
}

impl<'a> Reader<'a> {
    /// Reads a field tag, returning `(index, wire type)`.
    pub fn read_tag(&mut self) -> Result<(u64, TagType), DecodeError> {
        let offset = self.offset();
        let tag = self.read_varuint("tag")?;
        let tag_type = TagType::from_u8((tag & 0xF) as u8)
            .ok_or_else(|| malformed(offset, "unknown wire type"))?;
        Ok((tag >> 4, tag_type))
    }

    /// Returns the next tag without consuming it, or `None` at the end.
    pub fn peek_tag(&self) -> Result<Option<(u64, TagType)>, DecodeError> {
        if self.is_empty() {
            return Ok(None);
        }
        self.clone().read_tag().map(Some)
    }

    /// Reads the next field, or returns `None` once the reader is exhausted.
    pub fn next_field(&mut self) -> Result<Option<Field<'a>>, DecodeError> {
        if self.is_empty() {
            return Ok(None);
        }
        let start = self.position();
        let offset = self.offset();
        let (index, tag_type) = self.read_tag()?;
        let value = match tag_type {
            TagType::Byte1 => FieldValue::Byte1(self.read_u8("byte field")?),
            TagType::Byte4 => FieldValue::Byte4(self.read_u32("4-byte field")?),
            TagType::Byte8 => FieldValue::Byte8(self.read_u64("8-byte field")?),
            TagType::Id => FieldValue::Id(self.read_crdt_id("id field")?),
            TagType::Length4 => {
                let len = self.read_u32("subblock length")? as usize;
                FieldValue::Sub(self.sub_reader(len, "subblock")?)
            }
        };
        let raw = self.consumed_since(start);
        Ok(Some(Field {
            index,
            value,
            raw,
            offset,
        }))
    }

    /// Reads the next field and checks its index.
    pub fn expect_field(&mut self, index: u64) -> Result<Field<'a>, DecodeError> {
        let offset = self.offset();
        match self.next_field()? {
            Some(field) if field.index == index => Ok(field),
            Some(field) => Err(malformed(field.offset, "unexpected field index")),
            None => Err(DecodeError::TruncatedInput {
                context: "expected field",
                offset,
            }),
        }
    }

    /// Reads the next field if it has the given index.
    pub fn optional_field(&mut self, index: u64) -> Result<Option<Field<'a>>, DecodeError> {
        match self.peek_tag()? {
            Some((i, _)) if i == index => self.next_field(),
            _ => Ok(None),
        }
    }
}

/// Decodes a string subblock into its text and optional format code.
///
/// Layout: varuint byte length, is-ascii flag, bytes, then an optional
/// Byte4 field 2 carrying an inline format code.
pub fn decode_string(
    mut reader: Reader<'_>,
    policy: Utf8Policy,
) -> Result<(String, Option<u32>), DecodeError> {
    let offset = reader.offset();
    let len = reader.read_length(MAX_STRING_LEN, "string")?;
    let _is_ascii = reader.read_bool("string is_ascii")?;
    let bytes = reader.read_bytes(len, "string")?;
    let text = decode_utf8(bytes, policy, "string", offset)?;

    let mut format = None;
    while let Some(field) = reader.next_field()? {
        if field.index == 2 {
            format = Some(field.as_u32()?);
        }
    }
    Ok((text, format))
}

/// Decodes an LWW subblock: field 1 timestamp, field 2 value.
pub fn decode_lww<'a, T>(
    mut reader: Reader<'a>,
    value: impl FnOnce(Field<'a>) -> Result<T, DecodeError>,
) -> Result<LwwValue<T>, DecodeError> {
    let offset = reader.offset();
    let mut timestamp = None;
    let mut value_field = None;
    while let Some(field) = reader.next_field()? {
        match field.index {
            1 => timestamp = Some(field.as_id()?),
            2 => value_field = Some(field),
            _ => {}
        }
    }
    match (timestamp, value_field) {
        (Some(timestamp), Some(field)) => Ok(LwwValue::new(timestamp, value(field)?)),
        _ => Err(malformed(offset, "LWW value is missing its timestamp or value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::Writer;

    #[test]
    fn test_tag_layout() {
        let mut writer = Writer::new();
        writer.write_tag(6, TagType::Length4);
        assert_eq!(writer.as_bytes(), &[0x6C]);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_tag().unwrap(), (6, TagType::Length4));
    }

    #[test]
    fn test_wide_index() {
        let mut writer = Writer::new();
        writer.field_id(10, CrdtId::new(0, 5));
        let mut reader = Reader::new(writer.as_bytes());
        let field = reader.next_field().unwrap().unwrap();
        assert_eq!(field.index, 10);
        assert_eq!(field.as_id().unwrap(), CrdtId::new(0, 5));
        assert_eq!(field.raw, writer.as_bytes());
    }

    #[test]
    fn test_unknown_wire_type_is_malformed() {
        let data = [0x12u8, 0x00];
        let mut reader = Reader::with_offset(&data, 7);
        assert_eq!(
            reader.next_field().unwrap_err(),
            DecodeError::MalformedBlock {
                kind: None,
                offset: 7,
                reason: "unknown wire type"
            }
        );
    }

    #[test]
    fn test_every_wire_type_skips() {
        let mut writer = Writer::new();
        writer.field_u8(1, 7);
        writer.field_u32(2, 0xDEADBEEF);
        writer.field_f64(3, 2.5);
        writer.field_id(4, CrdtId::new(3, 1000));
        writer.subblock(5, |w| w.write_bytes(&[1, 2, 3, 4, 5]));
        writer.field_bool(6, true);

        let mut reader = Reader::new(writer.as_bytes());
        let mut indexes = Vec::new();
        let mut total = 0;
        while let Some(field) = reader.next_field().unwrap() {
            indexes.push(field.index);
            total += field.raw.len();
        }
        assert_eq!(indexes, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(total, writer.len());
    }

    #[test]
    fn test_wire_type_mismatch() {
        let mut writer = Writer::new();
        writer.field_u32(1, 5);
        let mut reader = Reader::new(writer.as_bytes());
        let field = reader.next_field().unwrap().unwrap();
        assert!(field.as_id().is_err());
        assert!(field.as_u8().is_err());
        assert_eq!(field.as_u32().unwrap(), 5);
        assert!(field.into_sub().is_err());
    }

    #[test]
    fn test_expect_and_optional_field() {
        let mut writer = Writer::new();
        writer.field_id(1, CrdtId::new(1, 1));
        writer.field_u8(3, 1);

        let mut reader = Reader::new(writer.as_bytes());
        assert!(reader.optional_field(2).unwrap().is_none());
        assert_eq!(reader.expect_field(1).unwrap().as_id().unwrap(), CrdtId::new(1, 1));
        assert!(reader.expect_field(2).is_err());
        assert!(matches!(
            reader.expect_field(4),
            Err(DecodeError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_string_subblock() {
        let mut writer = Writer::new();
        writer.field_string(2, "Layer 1");
        let mut reader = Reader::new(writer.as_bytes());
        let sub = reader.expect_field(2).unwrap().into_sub().unwrap();
        assert_eq!(
            decode_string(sub, Utf8Policy::Strict).unwrap(),
            ("Layer 1".to_string(), None)
        );
    }

    #[test]
    fn test_string_subblock_with_format() {
        let mut writer = Writer::new();
        writer.field_format(6, 3);
        let mut reader = Reader::new(writer.as_bytes());
        let sub = reader.expect_field(6).unwrap().into_sub().unwrap();
        assert_eq!(
            decode_string(sub, Utf8Policy::Strict).unwrap(),
            (String::new(), Some(3))
        );
    }

    #[test]
    fn test_lww_subblock() {
        let mut writer = Writer::new();
        writer.lww_bool(3, CrdtId::new(0, 12), true);
        let mut reader = Reader::new(writer.as_bytes());
        let sub = reader.expect_field(3).unwrap().into_sub().unwrap();
        let lww = decode_lww(sub, |f| f.as_bool()).unwrap();
        assert_eq!(lww, LwwValue::new(CrdtId::new(0, 12), true));
    }

    #[test]
    fn test_lww_missing_value() {
        let mut writer = Writer::new();
        writer.subblock(3, |w| w.field_id(1, CrdtId::new(0, 1)));
        let mut reader = Reader::new(writer.as_bytes());
        let sub = reader.expect_field(3).unwrap().into_sub().unwrap();
        assert!(matches!(
            decode_lww(sub, |f| f.as_bool()),
            Err(DecodeError::MalformedBlock { .. })
        ));
    }
}
