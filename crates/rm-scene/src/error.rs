//! Error types for scene decoding and validation.

use thiserror::Error;

use crate::model::{BlockKind, CrdtId};

/// Coarse error classes, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Input ended before a field or block was complete
    TruncatedInput,
    /// E002: Varint did not terminate or overflowed
    MalformedVarint,
    /// E003: Block or field structure violates the wire format
    MalformedBlock,
    /// E004: Invalid UTF-8 in a text payload
    InvalidEncoding,
    /// E005: CRDT neighbour links contain a cycle
    CyclicSequence,
    /// E006: Unsupported file version or I/O failure
    Unsupported,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::TruncatedInput => "E001",
            ErrorCode::MalformedVarint => "E002",
            ErrorCode::MalformedBlock => "E003",
            ErrorCode::InvalidEncoding => "E004",
            ErrorCode::CyclicSequence => "E005",
            ErrorCode::Unsupported => "E006",
        }
    }
}

/// Error during binary decoding.
///
/// Offsets are absolute byte positions in the decoded document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("[E001] unexpected end of input at offset {offset} while reading {context}")]
    TruncatedInput { context: &'static str, offset: usize },

    #[error("[E002] varint at offset {offset} is malformed (too long or overflows u64)")]
    MalformedVarint { offset: usize },

    #[error("[E003] malformed {} block at offset {offset}: {reason}", kind_name(.kind))]
    MalformedBlock {
        kind: Option<BlockKind>,
        offset: usize,
        reason: &'static str,
    },

    #[error("[E003] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[E003] text fragment {id} spanning {len} ids overflows the id counter")]
    IdOverflow { id: CrdtId, len: u64 },

    #[error("[E004] invalid UTF-8 in {field} at offset {offset}")]
    InvalidEncoding { field: &'static str, offset: usize },

    #[error("[E005] text sequence has a cycle ({unresolved} items unresolved)")]
    CyclicSequence { unresolved: usize },

    #[error("[E006] unsupported lines file version: {version}")]
    UnsupportedVersion { version: String },

    #[error("[E006] I/O error: {0}")]
    Io(String),
}

fn kind_name(kind: &Option<BlockKind>) -> &'static str {
    kind.map(BlockKind::name).unwrap_or("scene")
}

impl DecodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::TruncatedInput { .. } => ErrorCode::TruncatedInput,
            DecodeError::MalformedVarint { .. } => ErrorCode::MalformedVarint,
            DecodeError::MalformedBlock { .. }
            | DecodeError::LengthExceedsLimit { .. }
            | DecodeError::IdOverflow { .. } => ErrorCode::MalformedBlock,
            DecodeError::InvalidEncoding { .. } => ErrorCode::InvalidEncoding,
            DecodeError::CyclicSequence { .. } => ErrorCode::CyclicSequence,
            DecodeError::UnsupportedVersion { .. } | DecodeError::Io(_) => ErrorCode::Unsupported,
        }
    }

    /// Attaches the block kind to a `MalformedBlock` raised below the block
    /// decoder, leaving any kind already recorded untouched.
    pub(crate) fn in_block(self, block: BlockKind) -> Self {
        match self {
            DecodeError::MalformedBlock {
                kind: None,
                offset,
                reason,
            } => DecodeError::MalformedBlock {
                kind: Some(block),
                offset,
                reason,
            },
            other => other,
        }
    }
}

/// Error during semantic validation of decoded blocks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("scene item {item} appears more than once under parent {parent}")]
    DuplicateItem { parent: CrdtId, item: CrdtId },

    #[error("scene tree edge {node} -> {parent} references an undeclared node")]
    UnknownParent { node: CrdtId, parent: CrdtId },

    #[error("group item {item} references undeclared node {node}")]
    UnknownGroupTarget { item: CrdtId, node: CrdtId },

    #[error("node {node} has parent {tree_parent} in the scene tree but {group_parent} as a group")]
    ConflictingParent {
        node: CrdtId,
        tree_parent: CrdtId,
        group_parent: CrdtId,
    },
}
