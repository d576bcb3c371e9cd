//! Data model types for decoded scenes.
//!
//! This module contains the typed records produced by the decoder:
//! - Identifiers (compound CRDT ids)
//! - Blocks (the top-level records of a scene file)
//! - Strokes and highlights
//! - Text values and paragraph styles
//! - Tool and color tables

pub mod block;
pub mod id;
pub mod line;
pub mod pen;
pub mod text;

pub use block::{
    AuthorIds, Block, BlockData, BlockHeader, BlockKind, MigrationInfo, PageInfo, RootText,
    SceneInfo, SceneItem, SceneTree, TreeNode,
};
pub use id::{CrdtId, END_MARKER};
pub use line::{GlyphRange, Line, Point, Rect};
pub use pen::{LineCap, Pen, PenColor, ToolStyle};
pub use text::{ParagraphStyle, TextValue};
