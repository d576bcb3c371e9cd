//! Scene tree lookups, page geometry and the rendering seam.
//!
//! Stroke coordinates are relative to the top centre of the page and to the
//! anchor of the layer they belong to. [`SceneIndex`] resolves anchors,
//! [`PageLayout`] computes the translation that puts every stroke on a
//! non-negative canvas, and [`render_page`] hands each drawable item to a
//! [`SceneSink`] together with its translation.

use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::DecodeError;
use crate::limits::{ANCHOR_TYPE_ORIGIN, ROOT_NODE_ID, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::model::{Block, BlockData, CrdtId, Line, RootText, SceneItem, TreeNode};
use crate::text::TextDocument;

/// Id-keyed views over the scene tree blocks of one page.
#[derive(Debug, Clone, Default)]
pub struct SceneIndex<'a> {
    nodes: FxHashMap<CrdtId, &'a TreeNode>,
    /// Node -> parent, from scene tree blocks.
    parents: FxHashMap<CrdtId, CrdtId>,
    /// Node -> parent, from group items.
    groups: FxHashMap<CrdtId, CrdtId>,
}

impl<'a> SceneIndex<'a> {
    /// Indexes tree nodes, scene tree edges and group memberships.
    ///
    /// Later blocks override earlier ones for the same id.
    pub fn from_blocks(blocks: &'a [Block]) -> Self {
        let mut index = SceneIndex::default();
        for block in blocks {
            match &block.data {
                BlockData::TreeNode(node) => {
                    index.nodes.insert(node.node_id, node);
                }
                BlockData::SceneTree(tree) => {
                    index.parents.insert(tree.tree_id, tree.parent_id);
                }
                BlockData::GroupItem(item) => {
                    if let Some(&target) = item.value() {
                        index.groups.insert(target, item.parent_id);
                    }
                }
                _ => {}
            }
        }
        index
    }

    pub fn node(&self, id: CrdtId) -> Option<&'a TreeNode> {
        self.nodes.get(&id).copied()
    }

    pub fn contains_node(&self, id: CrdtId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Parent of `id` according to the scene tree, falling back to the group
    /// that holds it.
    pub fn parent(&self, id: CrdtId) -> Option<CrdtId> {
        self.parents
            .get(&id)
            .or_else(|| self.groups.get(&id))
            .copied()
    }

    /// Parent of `id` according to the group items only.
    pub fn group_parent(&self, id: CrdtId) -> Option<CrdtId> {
        self.groups.get(&id).copied()
    }

    /// Iterates over all indexed tree nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &'a TreeNode> + '_ {
        self.nodes.values().copied()
    }

    /// Horizontal shift of everything drawn below `node`.
    ///
    /// Walks from `node` up to the root layer, adding the `anchor_origin_x`
    /// of every node anchored by origin. The walk stops early at a node
    /// without a known parent or when it revisits a node.
    pub fn anchor_offset(&self, node: CrdtId) -> f32 {
        let mut offset = 0.0;
        let mut current = node;
        let mut seen = FxHashSet::default();
        while current != ROOT_NODE_ID {
            if !seen.insert(current) {
                warn!("scene tree cycle through node {current}");
                break;
            }
            let Some(tree_node) = self.nodes.get(&current) else {
                break;
            };
            let anchored = tree_node
                .anchor_type
                .as_ref()
                .is_some_and(|t| t.value == ANCHOR_TYPE_ORIGIN);
            if anchored {
                if let Some(origin) = &tree_node.anchor_origin_x {
                    offset += origin.value;
                }
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        offset
    }
}

// =============================================================================
// Page layout
// =============================================================================

/// Canvas size and the translation applied to scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width: u32,
    pub height: u32,
    /// Added to every x coordinate (after the anchor offset).
    pub x_offset: f32,
    /// Added to every y coordinate.
    pub y_offset: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::from_bounds(None)
    }
}

impl PageLayout {
    /// Computes the layout of the strokes in `blocks`.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        Self::with_index(blocks, &SceneIndex::from_blocks(blocks))
    }

    /// Computes the layout using an existing index of the same blocks.
    pub fn with_index(blocks: &[Block], index: &SceneIndex<'_>) -> Self {
        Self::from_bounds(stroke_bounds(blocks, index))
    }

    /// Builds the layout for strokes spanning `(min_x, max_x, min_y, max_y)`.
    ///
    /// The canvas is at least one screen large. x is shifted by half a screen
    /// width (scene x is centred) and further if strokes would still land
    /// left of zero; y is shifted only when strokes go above zero.
    pub fn from_bounds(bounds: Option<(f32, f32, f32, f32)>) -> Self {
        let half_width = SCREEN_WIDTH / 2.0;
        let mut x_offset = half_width;
        let mut y_offset = 0.0;
        let mut width = SCREEN_WIDTH;
        let mut height = SCREEN_HEIGHT;

        if let Some((min_x, max_x, min_y, max_y)) = bounds {
            if min_x + half_width < 0.0 {
                x_offset -= min_x + half_width;
            }
            if min_y < 0.0 {
                y_offset = -min_y;
            }
            width = width.max(max_x - min_x);
            height = height.max(max_y - min_y);
        }

        Self {
            width: width.ceil() as u32,
            height: height.ceil() as u32,
            x_offset,
            y_offset,
        }
    }
}

/// Bounds of all live strokes, each shifted by its layer's anchor offset.
fn stroke_bounds(blocks: &[Block], index: &SceneIndex<'_>) -> Option<(f32, f32, f32, f32)> {
    blocks
        .iter()
        .filter_map(|block| match &block.data {
            BlockData::LineItem(item) => {
                let (x0, x1, y0, y1) = item.value()?.bounds()?;
                let dx = index.anchor_offset(item.parent_id);
                Some((x0 + dx, x1 + dx, y0, y1))
            }
            _ => None,
        })
        .reduce(|(a0, a1, b0, b1), (x0, x1, y0, y1)| {
            (a0.min(x0), a1.max(x1), b0.min(y0), b1.max(y1))
        })
}

// =============================================================================
// Rendering seam
// =============================================================================

/// Receiver of the drawable items of a page.
///
/// `render_page` resolves layout and text; implementations only draw.
pub trait SceneSink {
    type Error: From<DecodeError>;

    /// Draws one stroke. Add `origin` to every point of the line.
    fn line(&mut self, item: &SceneItem<Line>, origin: (f32, f32)) -> Result<(), Self::Error>;

    /// Draws the page's text box with its top-left corner at `origin`.
    fn text(
        &mut self,
        text: &RootText,
        document: &TextDocument,
        origin: (f64, f64),
    ) -> Result<(), Self::Error>;
}

/// Feeds every live stroke and text box of `blocks` to `sink`, in file
/// order, and returns the page layout used.
pub fn render_page<S: SceneSink>(blocks: &[Block], sink: &mut S) -> Result<PageLayout, S::Error> {
    let index = SceneIndex::from_blocks(blocks);
    let layout = PageLayout::with_index(blocks, &index);

    for block in blocks {
        match &block.data {
            BlockData::LineItem(item) if item.value().is_some() => {
                let dx = index.anchor_offset(item.parent_id) + layout.x_offset;
                sink.line(item, (dx, layout.y_offset))?;
            }
            BlockData::RootText(text) => {
                let document = TextDocument::from_root_text(text)?;
                let origin = (
                    text.pos_x + f64::from(layout.x_offset),
                    text.pos_y + f64::from(layout.y_offset),
                );
                sink.text(text, &document, origin)?;
            }
            _ => {}
        }
    }
    Ok(layout)
}
