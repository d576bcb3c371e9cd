//! Decoded top-level blocks.

use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::crdt::{CrdtSequenceItem, LwwMap, LwwValue};
use crate::model::{CrdtId, GlyphRange, Line, ParagraphStyle, TextValue};

/// Known top-level block types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockKind {
    MigrationInfo = 0x00,
    SceneTree = 0x01,
    TreeNode = 0x02,
    GlyphItem = 0x03,
    GroupItem = 0x04,
    LineItem = 0x05,
    RootText = 0x07,
    TombstoneItem = 0x08,
    AuthorIds = 0x09,
    PageInfo = 0x0A,
    SceneInfo = 0x0D,
}

impl BlockKind {
    /// Creates a BlockKind from its wire representation.
    pub fn from_u8(v: u8) -> Option<BlockKind> {
        match v {
            0x00 => Some(BlockKind::MigrationInfo),
            0x01 => Some(BlockKind::SceneTree),
            0x02 => Some(BlockKind::TreeNode),
            0x03 => Some(BlockKind::GlyphItem),
            0x04 => Some(BlockKind::GroupItem),
            0x05 => Some(BlockKind::LineItem),
            0x07 => Some(BlockKind::RootText),
            0x08 => Some(BlockKind::TombstoneItem),
            0x09 => Some(BlockKind::AuthorIds),
            0x0A => Some(BlockKind::PageInfo),
            0x0D => Some(BlockKind::SceneInfo),
            _ => None,
        }
    }

    /// Human-readable name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            BlockKind::MigrationInfo => "migration info",
            BlockKind::SceneTree => "scene tree",
            BlockKind::TreeNode => "tree node",
            BlockKind::GlyphItem => "glyph item",
            BlockKind::GroupItem => "group item",
            BlockKind::LineItem => "line item",
            BlockKind::RootText => "root text",
            BlockKind::TombstoneItem => "tombstone item",
            BlockKind::AuthorIds => "author ids",
            BlockKind::PageInfo => "page info",
            BlockKind::SceneInfo => "scene info",
        }
    }

    /// Item-type byte that opens the value subblock of scene item blocks.
    pub(crate) fn item_type(self) -> Option<u8> {
        match self {
            BlockKind::GlyphItem => Some(0x01),
            BlockKind::GroupItem => Some(0x02),
            BlockKind::LineItem => Some(0x03),
            _ => None,
        }
    }
}

/// Framing information of a top-level block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Byte offset of the header in the document.
    pub offset: usize,
    /// Length of the body in bytes.
    pub length: u32,
    pub block_type: u8,
    pub min_version: u8,
    pub current_version: u8,
}

impl BlockHeader {
    /// Offset of the first body byte.
    pub fn body_offset(&self) -> usize {
        self.offset + crate::limits::BLOCK_HEADER_LEN
    }

    pub fn kind(&self) -> Option<BlockKind> {
        BlockKind::from_u8(self.block_type)
    }
}

/// A decoded top-level block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub header: BlockHeader,
    pub data: BlockData,
    /// Raw bytes of fields this decoder does not understand, in file order.
    pub extra_data: Vec<u8>,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        self.data.kind()
    }
}

/// Typed payload of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    AuthorIds(AuthorIds),
    MigrationInfo(MigrationInfo),
    PageInfo(PageInfo),
    SceneInfo(SceneInfo),
    TreeNode(TreeNode),
    SceneTree(SceneTree),
    GlyphItem(SceneItem<GlyphRange>),
    GroupItem(SceneItem<CrdtId>),
    LineItem(SceneItem<Line>),
    TombstoneItem(SceneItem<()>),
    RootText(RootText),
}

impl BlockData {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockData::AuthorIds(_) => BlockKind::AuthorIds,
            BlockData::MigrationInfo(_) => BlockKind::MigrationInfo,
            BlockData::PageInfo(_) => BlockKind::PageInfo,
            BlockData::SceneInfo(_) => BlockKind::SceneInfo,
            BlockData::TreeNode(_) => BlockKind::TreeNode,
            BlockData::SceneTree(_) => BlockKind::SceneTree,
            BlockData::GlyphItem(_) => BlockKind::GlyphItem,
            BlockData::GroupItem(_) => BlockKind::GroupItem,
            BlockData::LineItem(_) => BlockKind::LineItem,
            BlockData::TombstoneItem(_) => BlockKind::TombstoneItem,
            BlockData::RootText(_) => BlockKind::RootText,
        }
    }
}

/// Author slot to author UUID.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthorIds {
    pub authors: FxHashMap<u16, Uuid>,
}

/// Format migration marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationInfo {
    pub migration_id: CrdtId,
    pub is_device: bool,
}

/// Page-level counters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageInfo {
    pub loads_count: u32,
    pub merges_count: u32,
    pub text_chars_count: u32,
    pub text_lines_count: u32,
    pub type_folio_use_count: Option<u32>,
}

/// Page-wide view state written by newer firmware.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneInfo {
    pub current_layer: LwwValue<CrdtId>,
    pub background_visible: Option<LwwValue<bool>>,
    pub root_document_visible: Option<LwwValue<bool>>,
    pub paper_size: Option<(u32, u32)>,
}

/// A node (layer or group) of the page's scene tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub node_id: CrdtId,
    pub label: LwwValue<String>,
    pub visible: LwwValue<bool>,
    pub anchor_id: Option<LwwValue<CrdtId>>,
    pub anchor_type: Option<LwwValue<u8>>,
    pub anchor_threshold: Option<LwwValue<f32>>,
    pub anchor_origin_x: Option<LwwValue<f32>>,
}

/// Scene tree membership edge `tree_id -> parent_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneTree {
    pub tree_id: CrdtId,
    pub node_id: CrdtId,
    pub is_update: bool,
    pub parent_id: CrdtId,
}

/// An item stored in the CRDT sequence of a scene tree node.
///
/// `item.value` is `None` for deleted items and for items written without
/// a value subblock.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneItem<T> {
    pub parent_id: CrdtId,
    pub item: CrdtSequenceItem<Option<T>>,
}

impl<T> SceneItem<T> {
    pub fn item_id(&self) -> CrdtId {
        self.item.item_id
    }

    pub fn value(&self) -> Option<&T> {
        self.item.value.as_ref()
    }
}

/// The page's text box.
#[derive(Debug, Clone, PartialEq)]
pub struct RootText {
    pub block_id: CrdtId,
    /// Text fragments in file order; see [`crate::text`] to reconstruct them.
    pub items: Vec<CrdtSequenceItem<TextValue>>,
    /// Paragraph styles keyed by the id of the paragraph's opening newline.
    pub styles: LwwMap<CrdtId, ParagraphStyle>,
    pub pos_x: f64,
    pub pos_y: f64,
    pub width: f32,
}
