//! Lazy iteration over the blocks of a scene document.

use std::io::{self, Read};
use std::iter::FusedIterator;

use log::warn;

use crate::codec::block::decode_block;
use crate::codec::primitives::Utf8Policy;
use crate::FORMAT_VERSION;
use crate::error::DecodeError;
use crate::limits::{BLOCK_HEADER_LEN, FILE_HEADER_PREFIX, HEADER_LEN, MAX_BLOCK_SIZE};
use crate::model::{Block, BlockHeader};

/// Options for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Handling of invalid UTF-8 in labels and text.
    pub utf8: Utf8Policy,
    /// Largest block body accepted before reading it into memory.
    pub max_block_size: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeOptions {
    /// Creates default (strict) decoding options.
    pub const fn new() -> Self {
        Self {
            utf8: Utf8Policy::Strict,
            max_block_size: MAX_BLOCK_SIZE,
        }
    }

    /// Creates options that replace invalid UTF-8 instead of failing.
    pub const fn lossy() -> Self {
        Self {
            utf8: Utf8Policy::Lossy,
            max_block_size: MAX_BLOCK_SIZE,
        }
    }

    /// Returns these options with a different block size bound.
    pub const fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size;
        self
    }
}

/// A block of unknown type that was stepped over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedBlock {
    pub header: BlockHeader,
}

/// Byte source with a replay buffer for the bytes read while sniffing the
/// file header.
#[derive(Debug)]
struct Source<R> {
    inner: R,
    pending: Vec<u8>,
    pending_pos: usize,
}

impl<R: Read> Source<R> {
    /// Reads until `buf` is full or the source ends; returns the byte count.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, DecodeError> {
        let mut filled = 0;
        let pending = &self.pending[self.pending_pos..];
        if !pending.is_empty() {
            let n = pending.len().min(buf.len());
            buf[..n].copy_from_slice(&pending[..n]);
            self.pending_pos += n;
            filled = n;
        }
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecodeError::Io(e.to_string())),
            }
        }
        Ok(filled)
    }

    fn unread(&mut self, bytes: &[u8]) {
        self.pending = bytes.to_vec();
        self.pending_pos = 0;
    }
}

/// Iterator over the blocks of one document.
///
/// Created by [`read_blocks`]. Yields each known block in file order. Blocks
/// of unknown type are skipped by their declared length and recorded in
/// [`BlockStream::skipped`]. After the first error the iterator is finished;
/// blocks yielded before it remain valid.
#[derive(Debug)]
pub struct BlockStream<R> {
    source: Source<R>,
    options: DecodeOptions,
    offset: usize,
    started: bool,
    done: bool,
    body: Vec<u8>,
    skipped: Vec<SkippedBlock>,
}

/// Returns a lazy iterator over the blocks read from `source`.
///
/// The v6 file header is optional; when present it is consumed before the
/// first block.
pub fn read_blocks<R: Read>(source: R) -> BlockStream<R> {
    read_blocks_with_options(source, DecodeOptions::default())
}

/// Like [`read_blocks`], with explicit options.
pub fn read_blocks_with_options<R: Read>(source: R, options: DecodeOptions) -> BlockStream<R> {
    BlockStream {
        source: Source {
            inner: source,
            pending: Vec::new(),
            pending_pos: 0,
        },
        options,
        offset: 0,
        started: false,
        done: false,
        body: Vec::new(),
        skipped: Vec::new(),
    }
}

/// Decodes every block of an in-memory document.
pub fn decode_blocks(input: &[u8]) -> Result<Vec<Block>, DecodeError> {
    read_blocks(input).collect()
}

/// Like [`decode_blocks`], with explicit options.
pub fn decode_blocks_with_options(
    input: &[u8],
    options: DecodeOptions,
) -> Result<Vec<Block>, DecodeError> {
    read_blocks_with_options(input, options).collect()
}

impl<R: Read> BlockStream<R> {
    /// Blocks of unknown type skipped so far.
    pub fn skipped(&self) -> &[SkippedBlock] {
        &self.skipped
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read_file_header(&mut self) -> Result<(), DecodeError> {
        let mut buf = [0u8; HEADER_LEN];
        let n = self.source.fill(&mut buf)?;
        if n > 0 && n < FILE_HEADER_PREFIX.len() && FILE_HEADER_PREFIX.starts_with(&buf[..n]) {
            return Err(DecodeError::TruncatedInput {
                context: "file header",
                offset: n,
            });
        }
        if !buf[..n].starts_with(FILE_HEADER_PREFIX) {
            self.source.unread(&buf[..n]);
            return Ok(());
        }
        if n < HEADER_LEN {
            return Err(DecodeError::TruncatedInput {
                context: "file header",
                offset: n,
            });
        }

        let version = String::from_utf8_lossy(&buf[FILE_HEADER_PREFIX.len()..]);
        let version = version.trim_end_matches(' ');
        if version.parse::<u8>().ok() != Some(FORMAT_VERSION) {
            return Err(DecodeError::UnsupportedVersion {
                version: version.to_string(),
            });
        }
        self.offset = HEADER_LEN;
        Ok(())
    }

    fn read_header(&mut self) -> Result<Option<BlockHeader>, DecodeError> {
        let mut buf = [0u8; BLOCK_HEADER_LEN];
        let n = self.source.fill(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        if n < BLOCK_HEADER_LEN {
            return Err(DecodeError::TruncatedInput {
                context: "block header",
                offset: self.offset + n,
            });
        }

        let header = BlockHeader {
            offset: self.offset,
            length: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            min_version: buf[5],
            current_version: buf[6],
            block_type: buf[7],
        };
        if buf[4] != 0 {
            return Err(DecodeError::MalformedBlock {
                kind: header.kind(),
                offset: self.offset + 4,
                reason: "reserved header byte is not zero",
            });
        }
        let len = header.length as usize;
        if len > self.options.max_block_size {
            return Err(DecodeError::LengthExceedsLimit {
                field: "block",
                len,
                max: self.options.max_block_size,
            });
        }
        self.offset += BLOCK_HEADER_LEN;
        Ok(Some(header))
    }

    fn read_body(&mut self, header: &BlockHeader) -> Result<(), DecodeError> {
        let len = header.length as usize;
        self.body.clear();
        self.body.resize(len, 0);
        let n = self.source.fill(&mut self.body)?;
        if n < len {
            return Err(DecodeError::TruncatedInput {
                context: "block body",
                offset: self.offset + n,
            });
        }
        self.offset += len;
        Ok(())
    }

    fn next_block(&mut self) -> Result<Option<Block>, DecodeError> {
        if !self.started {
            self.started = true;
            self.read_file_header()?;
        }
        loop {
            let Some(header) = self.read_header()? else {
                return Ok(None);
            };
            self.read_body(&header)?;
            match decode_block(header, &self.body, &self.options)? {
                Some(block) => return Ok(Some(block)),
                None => {
                    warn!(
                        "skipping unknown block type {:#04x} ({} bytes) at offset {}",
                        header.block_type, header.length, header.offset
                    );
                    self.skipped.push(SkippedBlock { header });
                }
            }
        }
    }
}

impl<R: Read> Iterator for BlockStream<R> {
    type Item = Result<Block, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> FusedIterator for BlockStream<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::{Writer, line_block};
    use crate::limits::FILE_HEADER_V6;
    use crate::model::{BlockData, BlockKind, CrdtId};
    use proptest::prelude::*;

    fn two_lines(header: bool) -> Vec<u8> {
        let mut w = Writer::new();
        if header {
            w.file_header();
        }
        line_block(&mut w, CrdtId::new(0, 11), CrdtId::new(1, 1), &[(0.0, 0.0)]);
        line_block(&mut w, CrdtId::new(0, 11), CrdtId::new(1, 2), &[(5.0, 5.0), (6.0, 6.0)]);
        w.into_bytes()
    }

    #[test]
    fn test_with_file_header() {
        let blocks = decode_blocks(&two_lines(true)).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].header.offset, HEADER_LEN);
        let next = blocks[0].header.body_offset() + blocks[0].header.length as usize;
        assert_eq!(blocks[1].header.offset, next);
    }

    #[test]
    fn test_without_file_header() {
        let blocks = decode_blocks(&two_lines(false)).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].header.offset, 0);
        assert_eq!(blocks[1].kind(), BlockKind::LineItem);
    }

    #[test]
    fn test_empty_input() {
        assert!(decode_blocks(&[]).unwrap().is_empty());

        let mut w = Writer::new();
        w.file_header();
        assert!(decode_blocks(w.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = b"reMarkable .lines file, version=5          ".to_vec();
        data.extend_from_slice(&two_lines(false));
        assert_eq!(
            decode_blocks(&data).unwrap_err(),
            DecodeError::UnsupportedVersion {
                version: "5".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_block_between_lines() {
        let mut w = Writer::new();
        w.file_header();
        line_block(&mut w, CrdtId::new(0, 11), CrdtId::new(1, 1), &[(0.0, 0.0)]);
        w.block(0x42, 1, |w| w.write_bytes(&[9u8; 17]));
        line_block(&mut w, CrdtId::new(0, 11), CrdtId::new(1, 2), &[(1.0, 1.0)]);

        let mut stream = read_blocks(w.as_bytes());
        let blocks: Vec<_> = stream.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.kind() == BlockKind::LineItem));

        let skipped = stream.skipped();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].header.block_type, 0x42);
        assert_eq!(skipped[0].header.length, 17);
    }

    /// Header, a line, an unknown block and another line.
    fn mixed_blocks() -> Vec<u8> {
        let mut w = Writer::new();
        w.file_header();
        line_block(&mut w, CrdtId::new(0, 11), CrdtId::new(1, 1), &[(0.0, 0.0)]);
        w.block(0x42, 1, |w| w.write_bytes(&[9u8; 17]));
        line_block(&mut w, CrdtId::new(0, 11), CrdtId::new(1, 2), &[(1.0, 1.0), (2.0, 2.0)]);
        w.into_bytes()
    }

    /// Byte ranges of every block body, read straight from the framing.
    fn body_ranges(data: &[u8]) -> Vec<std::ops::Range<usize>> {
        let mut ranges = Vec::new();
        let mut pos = HEADER_LEN;
        while pos < data.len() {
            let len = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
            let start = pos + BLOCK_HEADER_LEN;
            ranges.push(start..start + len as usize);
            pos = start + len as usize;
        }
        ranges
    }

    #[test]
    fn test_truncated_file_header() {
        for cut in [1, 5, 20, FILE_HEADER_PREFIX.len() - 1] {
            assert_eq!(
                decode_blocks(&FILE_HEADER_V6[..cut]),
                Err(DecodeError::TruncatedInput {
                    context: "file header",
                    offset: cut,
                })
            );
        }
        assert!(matches!(
            decode_blocks(&FILE_HEADER_V6[..HEADER_LEN - 1]),
            Err(DecodeError::TruncatedInput {
                context: "file header",
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let mut data = two_lines(false);
        data.extend_from_slice(&[1, 0, 0]);
        assert!(matches!(
            decode_blocks(&data),
            Err(DecodeError::TruncatedInput {
                context: "block header",
                ..
            })
        ));
    }

    #[test]
    fn test_reserved_byte() {
        let mut data = two_lines(false);
        data[4] = 1;
        assert!(matches!(
            decode_blocks(&data),
            Err(DecodeError::MalformedBlock {
                kind: Some(BlockKind::LineItem),
                offset: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_block_size_limit() {
        let data = two_lines(false);
        let options = DecodeOptions::new().with_max_block_size(4);
        assert!(matches!(
            decode_blocks_with_options(&data, options),
            Err(DecodeError::LengthExceedsLimit { field: "block", .. })
        ));
    }

    #[test]
    fn test_lossy_labels() {
        let mut w = Writer::new();
        w.block(0x02, 1, |w| {
            w.field_id(1, CrdtId::new(0, 11));
            w.subblock(2, |w| {
                w.field_id(1, CrdtId::new(0, 12));
                w.subblock(2, |w| {
                    w.write_varuint(3);
                    w.write_u8(0);
                    w.write_bytes(&[b'a', 0xFF, b'b']);
                });
            });
            w.lww_bool(3, CrdtId::new(0, 0), true);
        });

        assert!(matches!(
            decode_blocks(w.as_bytes()),
            Err(DecodeError::InvalidEncoding { .. })
        ));

        let blocks = decode_blocks_with_options(w.as_bytes(), DecodeOptions::lossy()).unwrap();
        let BlockData::TreeNode(node) = &blocks[0].data else {
            panic!("expected tree node");
        };
        assert_eq!(node.label.value, "a\u{FFFD}b");
    }

    /// Yields `limit` bytes of `data`, then fails.
    struct FailAfter<'a> {
        data: &'a [u8],
        limit: usize,
    }

    impl Read for FailAfter<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.limit == 0 {
                return Err(io::Error::other("device unplugged"));
            }
            let n = buf.len().min(self.limit).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            self.limit -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_io_error_after_first_block() {
        let data = two_lines(false);
        let first_len = decode_blocks(&data).unwrap()[1].header.offset;

        let mut stream = read_blocks(FailAfter {
            data: &data,
            limit: first_len,
        });
        assert!(stream.next().unwrap().is_ok());
        assert_eq!(stream.offset(), first_len);
        assert!(matches!(stream.next(), Some(Err(DecodeError::Io(_)))));
        assert!(stream.next().is_none());
    }

    proptest! {
        #[test]
        fn prop_truncated_body(pick in any::<proptest::sample::Index>()) {
            let data = mixed_blocks();
            let ranges = body_ranges(&data);
            prop_assert_eq!(ranges.len(), 3);
            let cuts: Vec<usize> = ranges.into_iter().flatten().collect();
            let cut = *pick.get(&cuts);

            let mut stream = read_blocks(&data[..cut]);
            let results: Vec<_> = stream.by_ref().collect();
            let (last, before) = results.split_last().unwrap();
            prop_assert!(before.iter().all(Result::is_ok));
            prop_assert_eq!(
                last,
                &Err(DecodeError::TruncatedInput {
                    context: "block body",
                    offset: cut,
                })
            );
            prop_assert!(stream.next().is_none());
        }

        #[test]
        fn prop_block_boundaries(unknown in 0usize..12, payload in any::<u32>()) {
            let mut w = Writer::new();
            w.block(0x0A, 1, |w| {
                for i in 0..unknown {
                    w.field_u32(30 + i as u64, payload);
                }
                for i in 1..=4 {
                    w.field_u32(i, 1);
                }
            });
            line_block(&mut w, CrdtId::new(0, 11), CrdtId::new(1, 1), &[(0.0, 0.0)]);

            let blocks = decode_blocks(w.as_bytes()).unwrap();
            prop_assert_eq!(blocks.len(), 2);
            let first = &blocks[0].header;
            prop_assert_eq!(
                blocks[1].header.offset,
                first.offset + BLOCK_HEADER_LEN + first.length as usize
            );
            // Two-byte tag plus a four-byte payload per unknown field.
            prop_assert_eq!(blocks[0].extra_data.len(), unknown * 6);
        }
    }
}
