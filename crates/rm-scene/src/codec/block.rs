//! Per-type block decoders.
//!
//! Each decoder walks the tagged fields of one block body. Fields it does not
//! know are kept verbatim in [`Block::extra_data`]; a known field index with
//! the wrong wire type is a malformed block.

use std::f32::consts::PI;

use log::debug;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::codec::primitives::{Reader, Utf8Policy};
use crate::codec::stream::DecodeOptions;
use crate::codec::tagged::{Field, decode_lww, decode_string};
use crate::crdt::{CrdtSequenceItem, LwwMap, LwwValue};
use crate::error::DecodeError;
use crate::limits::{MAX_LIST_ITEMS, MAX_STRING_LEN, MAX_TEXT_SLOTS};
use crate::model::{
    AuthorIds, Block, BlockData, BlockHeader, BlockKind, CrdtId, GlyphRange, Line, MigrationInfo,
    PageInfo, ParagraphStyle, Pen, PenColor, Point, Rect, RootText, SceneInfo, SceneItem,
    SceneTree, TextValue, TreeNode,
};
use crate::text::slot_count;

/// Size of one point record in point format version 1.
const POINT_SIZE_V1: usize = 24;

/// Size of one point record in point format version 2 and later.
const POINT_SIZE_V2: usize = 14;

/// Marker byte opening every paragraph style entry.
const STYLE_MARKER: u8 = 17;

fn malformed(offset: usize, reason: &'static str) -> DecodeError {
    DecodeError::MalformedBlock {
        kind: None,
        offset,
        reason,
    }
}

fn required<T>(value: Option<T>, offset: usize, reason: &'static str) -> Result<T, DecodeError> {
    value.ok_or_else(|| malformed(offset, reason))
}

/// Decodes the body of one block.
///
/// `body` must hold exactly `header.length` bytes. Returns `Ok(None)` for a
/// block type this crate does not know; the caller decides how to report it.
pub fn decode_block(
    header: BlockHeader,
    body: &[u8],
    options: &DecodeOptions,
) -> Result<Option<Block>, DecodeError> {
    let Some(kind) = header.kind() else {
        return Ok(None);
    };

    let mut reader = Reader::with_offset(body, header.body_offset());
    let mut extra = Vec::new();
    let data = decode_body(kind, &header, &mut reader, &mut extra, options.utf8)
        .map_err(|e| e.in_block(kind))?;

    if !reader.is_empty() {
        return Err(DecodeError::MalformedBlock {
            kind: Some(kind),
            offset: reader.offset(),
            reason: "block body has trailing bytes",
        });
    }
    if !extra.is_empty() {
        debug!(
            "{} block at offset {} kept {} bytes of unknown fields",
            kind.name(),
            header.offset,
            extra.len()
        );
    }

    Ok(Some(Block {
        header,
        data,
        extra_data: extra,
    }))
}

fn decode_body(
    kind: BlockKind,
    header: &BlockHeader,
    r: &mut Reader<'_>,
    extra: &mut Vec<u8>,
    utf8: Utf8Policy,
) -> Result<BlockData, DecodeError> {
    let data = match kind {
        BlockKind::AuthorIds => BlockData::AuthorIds(decode_author_ids(r, extra)?),
        BlockKind::MigrationInfo => BlockData::MigrationInfo(decode_migration_info(r, extra)?),
        BlockKind::PageInfo => BlockData::PageInfo(decode_page_info(r, extra)?),
        BlockKind::SceneInfo => BlockData::SceneInfo(decode_scene_info(r, extra)?),
        BlockKind::TreeNode => BlockData::TreeNode(decode_tree_node(r, extra, utf8)?),
        BlockKind::SceneTree => BlockData::SceneTree(decode_scene_tree(r, extra)?),
        BlockKind::GlyphItem => BlockData::GlyphItem(decode_scene_item(
            r,
            extra,
            kind,
            |sub, extra| decode_glyph(sub, extra, utf8),
        )?),
        BlockKind::GroupItem => {
            BlockData::GroupItem(decode_scene_item(r, extra, kind, decode_group)?)
        }
        BlockKind::LineItem => {
            let version = header.current_version;
            BlockData::LineItem(decode_scene_item(r, extra, kind, |sub, extra| {
                decode_line(sub, extra, version)
            })?)
        }
        BlockKind::TombstoneItem => {
            BlockData::TombstoneItem(decode_scene_item(r, extra, kind, |_, _| Ok(()))?)
        }
        BlockKind::RootText => BlockData::RootText(decode_root_text(r, extra, utf8)?),
    };
    Ok(data)
}

/// Appends every remaining field of `r` to `extra`.
fn keep_unknown(r: &mut Reader<'_>, extra: &mut Vec<u8>) -> Result<(), DecodeError> {
    while let Some(field) = r.next_field()? {
        extra.extend_from_slice(field.raw);
    }
    Ok(())
}

// =============================================================================
// Page metadata
// =============================================================================

fn decode_author_ids(r: &mut Reader<'_>, extra: &mut Vec<u8>) -> Result<AuthorIds, DecodeError> {
    let count = r.read_length(MAX_LIST_ITEMS, "author count")?;
    let mut authors = FxHashMap::default();
    for _ in 0..count {
        let field = r.expect_field(0)?;
        let offset = field.offset;
        let mut sub = field.into_sub()?;
        let uuid_len = sub.read_length(MAX_STRING_LEN, "author uuid length")?;
        if uuid_len != 16 {
            return Err(malformed(offset, "author uuid is not 16 bytes"));
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(sub.read_bytes(16, "author uuid")?);
        let author_id = sub.read_u16("author id")?;
        keep_unknown(&mut sub, extra)?;
        authors.insert(author_id, Uuid::from_bytes_le(bytes));
    }
    keep_unknown(r, extra)?;
    Ok(AuthorIds { authors })
}

fn decode_migration_info(
    r: &mut Reader<'_>,
    extra: &mut Vec<u8>,
) -> Result<MigrationInfo, DecodeError> {
    let start = r.offset();
    let mut migration_id = None;
    let mut is_device = None;
    while let Some(field) = r.next_field()? {
        match field.index {
            1 => migration_id = Some(field.as_id()?),
            2 => is_device = Some(field.as_bool()?),
            _ => extra.extend_from_slice(field.raw),
        }
    }
    Ok(MigrationInfo {
        migration_id: required(migration_id, start, "missing migration id")?,
        is_device: required(is_device, start, "missing device flag")?,
    })
}

fn decode_page_info(r: &mut Reader<'_>, extra: &mut Vec<u8>) -> Result<PageInfo, DecodeError> {
    let start = r.offset();
    let mut counts = [None; 4];
    let mut type_folio_use_count = None;
    while let Some(field) = r.next_field()? {
        match field.index {
            i @ 1..=4 => counts[(i - 1) as usize] = Some(field.as_u32()?),
            5 => type_folio_use_count = Some(field.as_u32()?),
            _ => extra.extend_from_slice(field.raw),
        }
    }
    Ok(PageInfo {
        loads_count: required(counts[0], start, "missing loads count")?,
        merges_count: required(counts[1], start, "missing merges count")?,
        text_chars_count: required(counts[2], start, "missing text chars count")?,
        text_lines_count: required(counts[3], start, "missing text lines count")?,
        type_folio_use_count,
    })
}

fn decode_scene_info(r: &mut Reader<'_>, extra: &mut Vec<u8>) -> Result<SceneInfo, DecodeError> {
    let start = r.offset();
    let mut current_layer = None;
    let mut background_visible = None;
    let mut root_document_visible = None;
    let mut paper_size = None;
    while let Some(field) = r.next_field()? {
        match field.index {
            1 => current_layer = Some(decode_lww(field.into_sub()?, |f| f.as_id())?),
            2 => background_visible = Some(decode_lww(field.into_sub()?, |f| f.as_bool())?),
            3 => root_document_visible = Some(decode_lww(field.into_sub()?, |f| f.as_bool())?),
            5 => {
                let mut sub = field.into_sub()?;
                let width = sub.read_u32("paper width")?;
                let height = sub.read_u32("paper height")?;
                paper_size = Some((width, height));
            }
            _ => extra.extend_from_slice(field.raw),
        }
    }
    Ok(SceneInfo {
        current_layer: required(current_layer, start, "missing current layer")?,
        background_visible,
        root_document_visible,
        paper_size,
    })
}

// =============================================================================
// Scene tree
// =============================================================================

fn decode_tree_node(
    r: &mut Reader<'_>,
    extra: &mut Vec<u8>,
    utf8: Utf8Policy,
) -> Result<TreeNode, DecodeError> {
    let start = r.offset();
    let mut node_id = None;
    let mut label = None;
    let mut visible = None;
    let mut anchor_id = None;
    let mut anchor_type = None;
    let mut anchor_threshold = None;
    let mut anchor_origin_x = None;
    while let Some(field) = r.next_field()? {
        match field.index {
            1 => node_id = Some(field.as_id()?),
            2 => {
                label = Some(decode_lww(field.into_sub()?, |f| {
                    Ok(decode_string(f.into_sub()?, utf8)?.0)
                })?)
            }
            3 => visible = Some(decode_lww(field.into_sub()?, |f| f.as_bool())?),
            7 => anchor_id = Some(decode_lww(field.into_sub()?, |f| f.as_id())?),
            8 => anchor_type = Some(decode_lww(field.into_sub()?, |f| f.as_u8())?),
            9 => anchor_threshold = Some(decode_lww(field.into_sub()?, |f| f.as_f32())?),
            10 => anchor_origin_x = Some(decode_lww(field.into_sub()?, |f| f.as_f32())?),
            _ => extra.extend_from_slice(field.raw),
        }
    }
    Ok(TreeNode {
        node_id: required(node_id, start, "missing node id")?,
        label: required(label, start, "missing label")?,
        visible: required(visible, start, "missing visibility")?,
        anchor_id,
        anchor_type,
        anchor_threshold,
        anchor_origin_x,
    })
}

fn decode_scene_tree(r: &mut Reader<'_>, extra: &mut Vec<u8>) -> Result<SceneTree, DecodeError> {
    let start = r.offset();
    let mut tree_id = None;
    let mut node_id = None;
    let mut is_update = None;
    let mut parent_id = None;
    while let Some(field) = r.next_field()? {
        match field.index {
            1 => tree_id = Some(field.as_id()?),
            2 => node_id = Some(field.as_id()?),
            3 => is_update = Some(field.as_bool()?),
            4 => {
                let mut sub = field.into_sub()?;
                parent_id = Some(sub.expect_field(1)?.as_id()?);
                keep_unknown(&mut sub, extra)?;
            }
            _ => extra.extend_from_slice(field.raw),
        }
    }
    Ok(SceneTree {
        tree_id: required(tree_id, start, "missing tree id")?,
        node_id: required(node_id, start, "missing node id")?,
        is_update: required(is_update, start, "missing update flag")?,
        parent_id: required(parent_id, start, "missing parent id")?,
    })
}

// =============================================================================
// Scene items
// =============================================================================

/// Decodes the shared scene item fields, handing the value subblock (after
/// its item-type byte) to `decode_value`.
fn decode_scene_item<'a, T>(
    r: &mut Reader<'a>,
    extra: &mut Vec<u8>,
    kind: BlockKind,
    mut decode_value: impl FnMut(&mut Reader<'a>, &mut Vec<u8>) -> Result<T, DecodeError>,
) -> Result<SceneItem<T>, DecodeError> {
    let start = r.offset();
    let mut ids: [Option<CrdtId>; 4] = [None; 4];
    let mut deleted_length = None;
    let mut value = None;
    let mut value_offset = start;
    while let Some(field) = r.next_field()? {
        match field.index {
            i @ 1..=4 => ids[(i - 1) as usize] = Some(field.as_id()?),
            5 => deleted_length = Some(field.as_u32()?),
            6 if kind.item_type().is_some() => {
                value_offset = field.offset;
                let mut sub = field.into_sub()?;
                if sub.is_empty() {
                    continue;
                }
                let item_type = sub.read_u8("item type")?;
                if Some(item_type) != kind.item_type() {
                    return Err(malformed(value_offset, "item type does not match block type"));
                }
                value = Some(decode_value(&mut sub, extra)?);
                keep_unknown(&mut sub, extra)?;
            }
            _ => extra.extend_from_slice(field.raw),
        }
    }

    let deleted_length = required(deleted_length, start, "missing deleted length")?;
    if deleted_length > 0 && value.is_some() {
        return Err(malformed(value_offset, "deleted item carries a value"));
    }
    Ok(SceneItem {
        parent_id: required(ids[0], start, "missing parent id")?,
        item: CrdtSequenceItem {
            item_id: required(ids[1], start, "missing item id")?,
            left_id: required(ids[2], start, "missing left id")?,
            right_id: required(ids[3], start, "missing right id")?,
            deleted_length,
            value,
        },
    })
}

fn decode_group(r: &mut Reader<'_>, extra: &mut Vec<u8>) -> Result<CrdtId, DecodeError> {
    let start = r.offset();
    let mut node_id = None;
    while let Some(field) = r.next_field()? {
        match field.index {
            2 => node_id = Some(field.as_id()?),
            _ => extra.extend_from_slice(field.raw),
        }
    }
    required(node_id, start, "missing group target")
}

fn decode_line(r: &mut Reader<'_>, extra: &mut Vec<u8>, version: u8) -> Result<Line, DecodeError> {
    let start = r.offset();
    let mut tool = None;
    let mut color = None;
    let mut thickness_scale = None;
    let mut starting_length = None;
    let mut points = None;
    let mut timestamp = None;
    let mut move_id = None;
    while let Some(field) = r.next_field()? {
        match field.index {
            1 => tool = Some(Pen::from_u32(field.as_u32()?)),
            2 => color = Some(PenColor::from_u32(field.as_u32()?)),
            3 => thickness_scale = Some(field.as_f64()?),
            4 => starting_length = Some(field.as_f32()?),
            5 => points = Some(decode_points(field, version)?),
            6 => timestamp = Some(field.as_id()?),
            7 => move_id = Some(field.as_id()?),
            _ => extra.extend_from_slice(field.raw),
        }
    }
    Ok(Line {
        color: required(color, start, "missing color")?,
        tool: required(tool, start, "missing tool")?,
        thickness_scale: required(thickness_scale, start, "missing thickness scale")?,
        starting_length: required(starting_length, start, "missing starting length")?,
        points: required(points, start, "missing points")?,
        timestamp: required(timestamp, start, "missing timestamp")?,
        move_id,
    })
}

fn decode_points(field: Field<'_>, version: u8) -> Result<Vec<Point>, DecodeError> {
    let offset = field.offset;
    let mut sub = field.into_sub()?;
    let point_size = if version >= 2 {
        POINT_SIZE_V2
    } else {
        POINT_SIZE_V1
    };
    let len = sub.remaining_len();
    if len % point_size != 0 {
        return Err(malformed(offset, "points length is not a multiple of the point size"));
    }

    let mut points = Vec::with_capacity(len / point_size);
    while !sub.is_empty() {
        points.push(if version >= 2 {
            decode_point_v2(&mut sub)?
        } else {
            decode_point_v1(&mut sub)?
        });
    }
    Ok(points)
}

fn decode_point_v1(r: &mut Reader<'_>) -> Result<Point, DecodeError> {
    let x = r.read_f32("point x")?;
    let y = r.read_f32("point y")?;
    let speed = r.read_f32("point speed")?;
    let direction = r.read_f32("point direction")?;
    let width = r.read_f32("point width")?;
    let pressure = r.read_f32("point pressure")?;
    Ok(Point {
        x,
        y,
        speed: speed * 4.0,
        direction: 255.0 * direction / (2.0 * PI),
        width: width * 4.0,
        pressure: pressure * 255.0,
    })
}

fn decode_point_v2(r: &mut Reader<'_>) -> Result<Point, DecodeError> {
    let x = r.read_f32("point x")?;
    let y = r.read_f32("point y")?;
    let speed = r.read_u16("point speed")?;
    let width = r.read_u16("point width")?;
    let direction = r.read_u8("point direction")?;
    let pressure = r.read_u8("point pressure")?;
    Ok(Point {
        x,
        y,
        speed: speed as f32,
        direction: direction as f32,
        width: width as f32,
        pressure: pressure as f32,
    })
}

fn decode_glyph(
    r: &mut Reader<'_>,
    extra: &mut Vec<u8>,
    utf8: Utf8Policy,
) -> Result<GlyphRange, DecodeError> {
    let start_offset = r.offset();
    let mut start = None;
    let mut length = None;
    let mut color = None;
    let mut text = None;
    let mut rectangles = Vec::new();
    while let Some(field) = r.next_field()? {
        match field.index {
            2 => start = Some(field.as_u32()?),
            3 => length = Some(field.as_u32()?),
            4 => color = Some(PenColor::from_u32(field.as_u32()?)),
            5 => text = Some(decode_string(field.into_sub()?, utf8)?.0),
            6 => {
                let mut sub = field.into_sub()?;
                let count = sub.read_length(MAX_LIST_ITEMS, "rectangle count")?;
                rectangles = Vec::with_capacity(count.min(sub.remaining_len() / 32));
                for _ in 0..count {
                    rectangles.push(Rect {
                        x: sub.read_f64("rectangle x")?,
                        y: sub.read_f64("rectangle y")?,
                        w: sub.read_f64("rectangle width")?,
                        h: sub.read_f64("rectangle height")?,
                    });
                }
            }
            _ => extra.extend_from_slice(field.raw),
        }
    }
    Ok(GlyphRange {
        start,
        length: required(length, start_offset, "missing glyph length")?,
        color: required(color, start_offset, "missing glyph color")?,
        text: required(text, start_offset, "missing glyph text")?,
        rectangles,
    })
}

// =============================================================================
// Root text
// =============================================================================

fn decode_root_text(
    r: &mut Reader<'_>,
    extra: &mut Vec<u8>,
    utf8: Utf8Policy,
) -> Result<RootText, DecodeError> {
    let start = r.offset();
    let mut block_id = None;
    let mut content = None;
    let mut position = None;
    let mut width = None;
    while let Some(field) = r.next_field()? {
        match field.index {
            1 => block_id = Some(field.as_id()?),
            2 => content = Some(decode_text_content(field.into_sub()?, extra, utf8)?),
            3 => {
                let mut sub = field.into_sub()?;
                let x = sub.read_f64("text position x")?;
                let y = sub.read_f64("text position y")?;
                position = Some((x, y));
            }
            4 => width = Some(field.as_f32()?),
            _ => extra.extend_from_slice(field.raw),
        }
    }

    let (items, styles) = required(content, start, "missing text content")?;
    let (pos_x, pos_y) = required(position, start, "missing text position")?;
    Ok(RootText {
        block_id: required(block_id, start, "missing block id")?,
        items,
        styles,
        pos_x,
        pos_y,
        width: required(width, start, "missing text width")?,
    })
}

type TextContent = (
    Vec<CrdtSequenceItem<TextValue>>,
    LwwMap<CrdtId, ParagraphStyle>,
);

fn decode_text_content(
    mut r: Reader<'_>,
    extra: &mut Vec<u8>,
    utf8: Utf8Policy,
) -> Result<TextContent, DecodeError> {
    let mut items = Vec::new();
    let mut styles = LwwMap::new();
    while let Some(field) = r.next_field()? {
        match field.index {
            1 => {
                let mut outer = field.into_sub()?;
                let mut list = outer.expect_field(1)?.into_sub()?;
                let count = list.read_length(MAX_LIST_ITEMS, "text item count")?;
                items.reserve(count.min(list.remaining_len()));
                for _ in 0..count {
                    let item = list.expect_field(0)?.into_sub()?;
                    items.push(decode_text_item(item, extra, utf8)?);
                }
                keep_unknown(&mut list, extra)?;
                keep_unknown(&mut outer, extra)?;
            }
            2 => {
                let mut outer = field.into_sub()?;
                let mut list = outer.expect_field(1)?.into_sub()?;
                let count = list.read_length(MAX_LIST_ITEMS, "paragraph style count")?;
                for _ in 0..count {
                    let (char_id, style) = decode_style_entry(&mut list)?;
                    styles.merge(char_id, style);
                }
                keep_unknown(&mut list, extra)?;
                keep_unknown(&mut outer, extra)?;
            }
            _ => extra.extend_from_slice(field.raw),
        }
    }
    Ok((items, styles))
}

fn decode_text_item(
    mut r: Reader<'_>,
    extra: &mut Vec<u8>,
    utf8: Utf8Policy,
) -> Result<CrdtSequenceItem<TextValue>, DecodeError> {
    let start = r.offset();
    let mut ids: [Option<CrdtId>; 3] = [None; 3];
    let mut deleted_length = None;
    let mut value = TextValue::Str(String::new());
    let mut value_offset = start;
    while let Some(field) = r.next_field()? {
        match field.index {
            i @ 2..=4 => ids[(i - 2) as usize] = Some(field.as_id()?),
            5 => deleted_length = Some(field.as_u32()?),
            6 => {
                value_offset = field.offset;
                let (text, format) = decode_string(field.into_sub()?, utf8)?;
                value = match format {
                    Some(_) if !text.is_empty() => {
                        return Err(malformed(
                            value_offset,
                            "text item carries both text and a format code",
                        ));
                    }
                    Some(code) => TextValue::Format(code),
                    None => TextValue::Str(text),
                };
            }
            _ => extra.extend_from_slice(field.raw),
        }
    }

    let deleted_length = required(deleted_length, start, "missing deleted length")?;
    if deleted_length > 0 && !value.is_empty() {
        return Err(malformed(value_offset, "deleted item carries a value"));
    }
    if deleted_length as usize > MAX_TEXT_SLOTS {
        return Err(DecodeError::LengthExceedsLimit {
            field: "deleted length",
            len: deleted_length as usize,
            max: MAX_TEXT_SLOTS,
        });
    }
    let item = CrdtSequenceItem {
        item_id: required(ids[0], start, "missing item id")?,
        left_id: required(ids[1], start, "missing left id")?,
        right_id: required(ids[2], start, "missing right id")?,
        deleted_length,
        value,
    };
    if item.item_id.offset(slot_count(&item).saturating_sub(1)).is_none() {
        return Err(malformed(start, "text item ids overflow"));
    }
    Ok(item)
}

fn decode_style_entry(
    r: &mut Reader<'_>,
) -> Result<(CrdtId, LwwValue<ParagraphStyle>), DecodeError> {
    let char_id = r.read_crdt_id("style char id")?;
    let timestamp = r.expect_field(1)?.as_id()?;
    let field = r.expect_field(2)?;
    let offset = field.offset;
    let mut sub = field.into_sub()?;
    if sub.read_u8("style marker")? != STYLE_MARKER {
        return Err(malformed(offset, "paragraph style entry has a bad marker"));
    }
    let style = ParagraphStyle::from_u8(sub.read_u8("paragraph style")?);
    Ok((char_id, LwwValue::new(timestamp, style)))
}
