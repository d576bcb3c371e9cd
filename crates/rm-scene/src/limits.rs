//! Decoder limits and format constants.
//!
//! The limits bound allocations driven by untrusted length fields.

use crate::model::CrdtId;

/// Maximum bytes in a varint (enough for a u64).
pub const MAX_VARINT_BYTES: usize = 10;

/// Default maximum size of one top-level block body (64 MiB).
pub const MAX_BLOCK_SIZE: usize = 64 * 1024 * 1024;

/// Maximum number of entries in a count-prefixed list inside a block.
pub const MAX_LIST_ITEMS: usize = 1_000_000;

/// Maximum number of single-character slots one text block may expand to,
/// deleted runs included.
pub const MAX_TEXT_SLOTS: usize = 1_000_000;

/// Maximum length of a length-prefixed string or byte field.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Prefix shared by every lines file header, followed by the version digit.
pub const FILE_HEADER_PREFIX: &[u8] = b"reMarkable .lines file, version=";

/// Full v6 file header, space-padded.
pub const FILE_HEADER_V6: &[u8; HEADER_LEN] = b"reMarkable .lines file, version=6          ";

/// Length of the file header in bytes.
pub const HEADER_LEN: usize = 43;

/// Size of a top-level block header: length, reserved, min/current version, type.
pub const BLOCK_HEADER_LEN: usize = 8;

/// Tablet screen width in scene units.
pub const SCREEN_WIDTH: f32 = 1404.0;

/// Tablet screen height in scene units.
pub const SCREEN_HEIGHT: f32 = 1872.0;

/// Id of the root layer group of a page.
pub const ROOT_NODE_ID: CrdtId = CrdtId::new(0, 1);

/// Anchor type whose `anchor_origin_x` shifts the anchored subtree horizontally.
pub const ANCHOR_TYPE_ORIGIN: u8 = 2;
