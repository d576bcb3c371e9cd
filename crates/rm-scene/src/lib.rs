//! Decoder for the reMarkable v6 binary scene format (`.rm` lines files).
//!
//! A page is stored as a sequence of tagged binary blocks: the scene tree
//! (layers and groups), handwritten strokes, highlighted glyph ranges, page
//! counters and a text box whose characters form a CRDT sequence. This crate
//! reads those blocks into typed records and reconstructs the text.
//!
//! # Quick Start
//!
//! ```rust
//! use rm_scene::{BlockData, TextDocument, read_blocks};
//!
//! # fn main() -> Result<(), rm_scene::DecodeError> {
//! let data: &[u8] = b"reMarkable .lines file, version=6          ";
//! for block in read_blocks(data) {
//!     match block?.data {
//!         BlockData::LineItem(item) => {
//!             if let Some(line) = item.value() {
//!                 println!("{:?} stroke with {} points", line.tool, line.points.len());
//!             }
//!         }
//!         BlockData::RootText(text) => {
//!             println!("{}", TextDocument::from_root_text(&text)?);
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`codec`]: Byte reader, tagged field framing, block decoders, stream driver
//! - [`model`]: Decoded records (blocks, strokes, ids, tools and colors)
//! - [`crdt`]: CRDT sequence ordering and last-writer-wins values
//! - [`text`]: Text expansion, formatting and paragraphs
//! - [`scene`]: Scene tree index, page layout and the rendering seam
//! - [`validate`]: Semantic validation of a decoded page
//! - [`error`]: Error types
//! - [`limits`]: Decoder limits and format constants
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - Block, list and expanded text sizes are bounded before anything is allocated
//! - Implicit character ids that would overflow their counter are rejected
//! - Varints are limited to prevent overflow
//! - Invalid data is rejected with an error carrying its byte offset
//!
//! # Wire Format
//!
//! An optional 43-byte ASCII file header is followed by blocks. Each block
//! has an 8-byte header (body length, reserved byte, minimum and current
//! version, block type) and a body of tagged fields. Blocks of unknown type
//! are skipped by length and reported through [`BlockStream::skipped`].

pub mod codec;
pub mod crdt;
pub mod error;
pub mod limits;
pub mod model;
pub mod scene;
pub mod text;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{
    BlockStream, DecodeOptions, SkippedBlock, Utf8Policy, decode_blocks,
    decode_blocks_with_options, read_blocks, read_blocks_with_options,
};
pub use crdt::{CrdtSequence, CrdtSequenceItem, LwwMap, LwwValue};
pub use error::{DecodeError, ErrorCode, ValidationError};
pub use model::{
    AuthorIds, Block, BlockData, BlockHeader, BlockKind, CrdtId, END_MARKER, GlyphRange, Line,
    MigrationInfo, PageInfo, ParagraphStyle, Pen, PenColor, Point, Rect, RootText, SceneInfo,
    SceneItem, SceneTree, TextValue, TreeNode,
};
pub use scene::{PageLayout, SceneIndex, SceneSink, render_page};
pub use text::{
    CrdtStr, FormatCode, Paragraph, StyledChar, TextDocument, TextProperties, expand_text_items,
    styled_chars,
};
pub use validate::validate_blocks;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scene format version this crate reads.
pub const FORMAT_VERSION: u8 = 6;
