//! Fixture writer for tests.
//!
//! The crate only reads the scene format; this writer exists so tests can
//! build documents field by field.

use crate::codec::tagged::TagType;
use crate::limits::FILE_HEADER_V6;
use crate::model::CrdtId;

/// Writer for encoding binary fixtures.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn write_u8(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an unsigned varint (LEB128).
    pub fn write_varuint(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    pub fn write_crdt_id(&mut self, id: CrdtId) {
        self.write_varuint(id.high);
        self.write_varuint(id.low);
    }

    pub fn write_bytes_prefixed(&mut self, bytes: &[u8]) {
        self.write_varuint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_tag(&mut self, index: u64, tag_type: TagType) {
        self.write_varuint((index << 4) | tag_type as u64);
    }

    pub fn field_id(&mut self, index: u64, id: CrdtId) {
        self.write_tag(index, TagType::Id);
        self.write_crdt_id(id);
    }

    pub fn field_u8(&mut self, index: u64, value: u8) {
        self.write_tag(index, TagType::Byte1);
        self.write_u8(value);
    }

    pub fn field_bool(&mut self, index: u64, value: bool) {
        self.field_u8(index, value as u8);
    }

    pub fn field_u32(&mut self, index: u64, value: u32) {
        self.write_tag(index, TagType::Byte4);
        self.write_u32(value);
    }

    pub fn field_f32(&mut self, index: u64, value: f32) {
        self.write_tag(index, TagType::Byte4);
        self.write_f32(value);
    }

    pub fn field_f64(&mut self, index: u64, value: f64) {
        self.write_tag(index, TagType::Byte8);
        self.write_f64(value);
    }

    /// Writes a length-prefixed subblock whose contents are produced by `f`.
    pub fn subblock(&mut self, index: u64, f: impl FnOnce(&mut Writer)) {
        let mut inner = Writer::new();
        f(&mut inner);
        self.write_tag(index, TagType::Length4);
        self.write_u32(inner.len() as u32);
        self.write_bytes(inner.as_bytes());
    }

    /// Writes a string subblock.
    pub fn field_string(&mut self, index: u64, s: &str) {
        self.subblock(index, |w| {
            w.write_varuint(s.len() as u64);
            w.write_u8(1);
            w.write_bytes(s.as_bytes());
        });
    }

    /// Writes a string subblock carrying a format code instead of text.
    pub fn field_format(&mut self, index: u64, code: u32) {
        self.subblock(index, |w| {
            w.write_varuint(0);
            w.write_u8(1);
            w.field_u32(2, code);
        });
    }

    pub fn lww_string(&mut self, index: u64, timestamp: CrdtId, value: &str) {
        self.subblock(index, |w| {
            w.field_id(1, timestamp);
            w.field_string(2, value);
        });
    }

    pub fn lww_bool(&mut self, index: u64, timestamp: CrdtId, value: bool) {
        self.subblock(index, |w| {
            w.field_id(1, timestamp);
            w.field_bool(2, value);
        });
    }

    pub fn lww_u8(&mut self, index: u64, timestamp: CrdtId, value: u8) {
        self.subblock(index, |w| {
            w.field_id(1, timestamp);
            w.field_u8(2, value);
        });
    }

    pub fn lww_f32(&mut self, index: u64, timestamp: CrdtId, value: f32) {
        self.subblock(index, |w| {
            w.field_id(1, timestamp);
            w.field_f32(2, value);
        });
    }

    pub fn lww_id(&mut self, index: u64, timestamp: CrdtId, value: CrdtId) {
        self.subblock(index, |w| {
            w.field_id(1, timestamp);
            w.field_id(2, value);
        });
    }

    /// Writes the v6 file header.
    pub fn file_header(&mut self) {
        self.write_bytes(FILE_HEADER_V6);
    }

    /// Writes a top-level block: header then the body produced by `f`.
    pub fn block(&mut self, block_type: u8, current_version: u8, f: impl FnOnce(&mut Writer)) {
        let mut body = Writer::new();
        f(&mut body);
        self.write_u32(body.len() as u32);
        self.write_u8(0);
        self.write_u8(1);
        self.write_u8(current_version);
        self.write_u8(block_type);
        self.write_bytes(body.as_bytes());
    }

    /// Writes the common scene item fields of a scene item block body.
    pub fn scene_item_header(
        &mut self,
        parent_id: CrdtId,
        item_id: CrdtId,
        left_id: CrdtId,
        right_id: CrdtId,
        deleted_length: u32,
    ) {
        self.field_id(1, parent_id);
        self.field_id(2, item_id);
        self.field_id(3, left_id);
        self.field_id(4, right_id);
        self.field_u32(5, deleted_length);
    }

    /// Writes a v2 stroke point.
    pub fn point_v2(&mut self, x: f32, y: f32, speed: u16, width: u16, direction: u8, pressure: u8) {
        self.write_f32(x);
        self.write_f32(y);
        self.write_u16(speed);
        self.write_u16(width);
        self.write_u8(direction);
        self.write_u8(pressure);
    }
}

/// Writes a version 2 line item block: a black fineliner stroke.
pub fn line_block(writer: &mut Writer, parent_id: CrdtId, item_id: CrdtId, points: &[(f32, f32)]) {
    writer.block(0x05, 2, |w| {
        w.scene_item_header(
            parent_id,
            item_id,
            CrdtId::new(0, 0),
            CrdtId::new(0, 0),
            0,
        );
        w.subblock(6, |w| {
            w.write_u8(0x03);
            w.field_u32(1, 4); // fineliner 1
            w.field_u32(2, 0); // black
            w.field_f64(3, 1.0);
            w.field_f32(4, 0.0);
            w.subblock(5, |w| {
                for &(x, y) in points {
                    w.point_v2(x, y, 10, 12, 20, 100);
                }
            });
            w.field_id(6, CrdtId::new(0, 1));
        });
    });
}

/// One text fragment: `(item_id, left_id, right_id, deleted_length, text)`.
pub type TextFragment<'a> = (CrdtId, CrdtId, CrdtId, u32, Option<&'a str>);

/// Writes a root text block at position (-468, 234) with width 936.
///
/// `styles` holds `(char_id, timestamp, style code)` entries.
pub fn root_text_block(writer: &mut Writer, items: &[TextFragment<'_>], styles: &[(CrdtId, CrdtId, u8)]) {
    writer.block(0x07, 1, |w| {
        w.field_id(1, CrdtId::new(0, 0));
        w.subblock(2, |w| {
            w.subblock(1, |w| {
                w.subblock(1, |w| {
                    w.write_varuint(items.len() as u64);
                    for &(item_id, left, right, deleted, text) in items {
                        w.subblock(0, |w| {
                            w.field_id(2, item_id);
                            w.field_id(3, left);
                            w.field_id(4, right);
                            w.field_u32(5, deleted);
                            if let Some(text) = text {
                                w.field_string(6, text);
                            }
                        });
                    }
                });
            });
            w.subblock(2, |w| {
                w.subblock(1, |w| {
                    w.write_varuint(styles.len() as u64);
                    for &(char_id, timestamp, style) in styles {
                        w.write_crdt_id(char_id);
                        w.field_id(1, timestamp);
                        w.subblock(2, |w| {
                            w.write_u8(17);
                            w.write_u8(style);
                        });
                    }
                });
            });
        });
        w.subblock(3, |w| {
            w.write_f64(-468.0);
            w.write_f64(234.0);
        });
        w.field_f32(4, 936.0);
    });
}

/// Writes a tree node block, optionally anchored with `(anchor_type, origin_x)`.
pub fn tree_node_block(writer: &mut Writer, node_id: CrdtId, label: &str, anchor: Option<(u8, f32)>) {
    writer.block(0x02, 1, |w| {
        w.field_id(1, node_id);
        w.lww_string(2, CrdtId::new(0, 0), label);
        w.lww_bool(3, CrdtId::new(0, 0), true);
        if let Some((anchor_type, origin_x)) = anchor {
            w.lww_id(7, CrdtId::new(0, 0), CrdtId::new(0, 0));
            w.lww_u8(8, CrdtId::new(0, 0), anchor_type);
            w.lww_f32(9, CrdtId::new(0, 0), 0.0);
            w.lww_f32(10, CrdtId::new(0, 0), origin_x);
        }
    });
}

/// Writes a scene tree block attaching `tree_id` below `parent_id`.
pub fn scene_tree_block(writer: &mut Writer, tree_id: CrdtId, parent_id: CrdtId) {
    writer.block(0x01, 1, |w| {
        w.field_id(1, tree_id);
        w.field_id(2, CrdtId::new(0, 0));
        w.field_bool(3, true);
        w.subblock(4, |w| w.field_id(1, parent_id));
    });
}

/// Writes a group item block placing node `target` in the sequence of `parent_id`.
pub fn group_block(writer: &mut Writer, parent_id: CrdtId, item_id: CrdtId, target: CrdtId) {
    writer.block(0x04, 1, |w| {
        w.scene_item_header(parent_id, item_id, CrdtId::new(0, 0), CrdtId::new(0, 0), 0);
        w.subblock(6, |w| {
            w.write_u8(0x02);
            w.field_id(2, target);
        });
    });
}
