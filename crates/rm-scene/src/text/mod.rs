//! Text reconstruction for root text blocks.
//!
//! A root text block stores its characters as CRDT fragments that may each
//! hold several characters, interleaved with inline formatting directives.
//! Reconstruction expands fragments into single characters
//! ([`expand_text_items`]), orders them ([`CrdtSequence`]), applies the
//! formatting directives ([`styled_chars`]) and splits the result into
//! paragraphs ([`TextDocument`]).

use std::fmt;

use log::warn;

use crate::crdt::{CrdtSequence, CrdtSequenceItem, LwwValue};
use crate::error::DecodeError;
use crate::limits::MAX_TEXT_SLOTS;
use crate::model::{CrdtId, END_MARKER, ParagraphStyle, RootText, TextValue};

/// Inline formatting directive carried by a [`TextValue::Format`] fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FormatCode {
    BoldOn = 1,
    BoldOff = 2,
    ItalicOn = 3,
    ItalicOff = 4,
}

impl FormatCode {
    /// Creates a FormatCode from its wire representation.
    pub fn from_u32(v: u32) -> Option<FormatCode> {
        match v {
            1 => Some(FormatCode::BoldOn),
            2 => Some(FormatCode::BoldOff),
            3 => Some(FormatCode::ItalicOn),
            4 => Some(FormatCode::ItalicOff),
            _ => None,
        }
    }
}

/// Character-level formatting in effect at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextProperties {
    pub bold: bool,
    pub italic: bool,
}

impl TextProperties {
    /// Returns the properties after applying `code`.
    pub fn apply(self, code: FormatCode) -> TextProperties {
        match code {
            FormatCode::BoldOn => TextProperties { bold: true, ..self },
            FormatCode::BoldOff => TextProperties { bold: false, ..self },
            FormatCode::ItalicOn => TextProperties {
                italic: true,
                ..self
            },
            FormatCode::ItalicOff => TextProperties {
                italic: false,
                ..self
            },
        }
    }
}

// =============================================================================
// Expansion
// =============================================================================

/// Fragment currently being split into single slots.
#[derive(Debug)]
struct Splitting {
    item_id: CrdtId,
    left_id: CrdtId,
    right_id: CrdtId,
    /// Empty for deleted fragments.
    chars: Vec<char>,
    len: u64,
    next: u64,
}

impl Splitting {
    fn slot(&mut self) -> Option<CrdtSequenceItem<TextValue>> {
        if self.next >= self.len {
            return None;
        }
        let i = self.next;
        self.next += 1;

        let item_id = self.item_id.offset(i)?;
        let left_id = if i == 0 {
            self.left_id
        } else {
            self.item_id.offset(i - 1)?
        };
        let right_id = if i + 1 == self.len {
            self.right_id
        } else {
            self.item_id.offset(i + 1)?
        };
        let (deleted_length, value) = match self.chars.get(i as usize) {
            Some(ch) => (0, TextValue::Str(ch.to_string())),
            None => (1, TextValue::Str(String::new())),
        };
        Some(CrdtSequenceItem {
            item_id,
            left_id,
            right_id,
            deleted_length,
            value,
        })
    }
}

/// Iterator adaptor splitting text fragments into one slot per character.
///
/// See [`expand_text_items`].
#[derive(Debug)]
pub struct ExpandTextItems<I> {
    inner: I,
    current: Option<Splitting>,
}

/// Expands multi-character fragments into single-character fragments.
///
/// The n-th character of a fragment gets the fragment id with its low part
/// advanced by n. The first character keeps the fragment's `left_id`, the
/// last its `right_id`; inner links point at the adjacent characters.
/// A deleted fragment of length n becomes n deleted slots. Formatting
/// fragments pass through unchanged. Live fragments with no text are
/// dropped.
///
/// A fragment is cut short where its implicit ids would overflow the id
/// counter; [`styled_chars`] rejects such fragments before expanding.
pub fn expand_text_items<I>(items: I) -> ExpandTextItems<I::IntoIter>
where
    I: IntoIterator<Item = CrdtSequenceItem<TextValue>>,
{
    ExpandTextItems {
        inner: items.into_iter(),
        current: None,
    }
}

impl<I> Iterator for ExpandTextItems<I>
where
    I: Iterator<Item = CrdtSequenceItem<TextValue>>,
{
    type Item = CrdtSequenceItem<TextValue>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(slot) = self.current.as_mut().and_then(Splitting::slot) {
                return Some(slot);
            }
            self.current = None;

            let item = self.inner.next()?;
            let chars: Vec<char> = match item.value {
                TextValue::Format(_) => return Some(item),
                TextValue::Str(_) if item.is_deleted() => Vec::new(),
                TextValue::Str(ref s) if s.is_empty() => {
                    warn!("dropping empty text fragment {}", item.item_id);
                    continue;
                }
                TextValue::Str(ref s) => s.chars().collect(),
            };
            let len = if item.is_deleted() {
                u64::from(item.deleted_length)
            } else {
                chars.len() as u64
            };
            self.current = Some(Splitting {
                item_id: item.item_id,
                left_id: item.left_id,
                right_id: item.right_id,
                chars,
                len,
                next: 0,
            });
        }
    }
}

// =============================================================================
// Styled characters
// =============================================================================

/// One visible character with the formatting in effect at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyledChar {
    pub id: CrdtId,
    pub ch: char,
    pub style: TextProperties,
}

/// Number of single slots `item` expands to.
pub(crate) fn slot_count(item: &CrdtSequenceItem<TextValue>) -> u64 {
    match &item.value {
        TextValue::Format(_) => 1,
        TextValue::Str(_) if item.is_deleted() => u64::from(item.deleted_length),
        TextValue::Str(s) => s.chars().count() as u64,
    }
}

/// Checks that `items` expand to a bounded number of slots with ids that fit
/// the id counter.
fn check_expansion(items: &[CrdtSequenceItem<TextValue>]) -> Result<(), DecodeError> {
    let mut total: u64 = 0;
    for item in items {
        let slots = slot_count(item);
        if item.item_id.offset(slots.saturating_sub(1)).is_none() {
            return Err(DecodeError::IdOverflow {
                id: item.item_id,
                len: slots,
            });
        }
        total = total.saturating_add(slots);
    }
    if total > MAX_TEXT_SLOTS as u64 {
        return Err(DecodeError::LengthExceedsLimit {
            field: "text slots",
            len: usize::try_from(total).unwrap_or(usize::MAX),
            max: MAX_TEXT_SLOTS,
        });
    }
    Ok(())
}

/// Orders the text of `text` and resolves its formatting directives.
///
/// Deleted characters are left out. Unknown formatting codes are logged and
/// ignored. Fails with `IdOverflow` or `LengthExceedsLimit` before expanding
/// fragments whose ids overflow or that expand past [`MAX_TEXT_SLOTS`].
pub fn styled_chars(text: &RootText) -> Result<Vec<StyledChar>, DecodeError> {
    check_expansion(&text.items)?;
    let sequence = CrdtSequence::from_items(expand_text_items(text.items.iter().cloned()))?;
    let mut style = TextProperties::default();
    let mut out = Vec::with_capacity(sequence.len());
    for item in sequence.visible() {
        match &item.value {
            TextValue::Format(code) => match FormatCode::from_u32(*code) {
                Some(code) => style = style.apply(code),
                None => warn!("ignoring unknown format code {code} at {}", item.item_id),
            },
            TextValue::Str(s) => out.extend(s.chars().map(|ch| StyledChar {
                id: item.item_id,
                ch,
                style,
            })),
        }
    }
    Ok(out)
}

// =============================================================================
// Paragraphs
// =============================================================================

/// A run of characters sharing one set of [`TextProperties`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdtStr {
    pub text: String,
    /// Id of each character of `text`, in order.
    pub char_ids: Vec<CrdtId>,
    pub properties: TextProperties,
}

/// One line of text, split at newline characters.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub contents: Vec<CrdtStr>,
    /// Id of the newline that opens the paragraph, `END_MARKER` for a first
    /// paragraph not opened by one.
    pub start_id: CrdtId,
    pub style: LwwValue<ParagraphStyle>,
}

impl Paragraph {
    fn new(start_id: CrdtId, text: &RootText) -> Self {
        let style = text
            .styles
            .get(&start_id)
            .cloned()
            .unwrap_or_else(|| LwwValue::new(END_MARKER, ParagraphStyle::Plain));
        Self {
            contents: Vec::new(),
            start_id,
            style,
        }
    }

    fn push(&mut self, ch: &StyledChar) {
        match self.contents.last_mut() {
            Some(run) if run.properties == ch.style => {
                run.text.push(ch.ch);
                run.char_ids.push(ch.id);
            }
            _ => self.contents.push(CrdtStr {
                text: ch.ch.to_string(),
                char_ids: vec![ch.id],
                properties: ch.style,
            }),
        }
    }
}

impl fmt::Display for Paragraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for run in &self.contents {
            f.write_str(&run.text)?;
        }
        Ok(())
    }
}

/// Reconstructed text of a root text block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextDocument {
    pub paragraphs: Vec<Paragraph>,
}

impl TextDocument {
    /// Orders, formats and splits the text of `text` into paragraphs.
    ///
    /// A document with no visible characters has no paragraphs; a trailing
    /// newline opens a final empty paragraph. A leading newline opens the
    /// first paragraph itself, so no `END_MARKER` paragraph precedes it.
    pub fn from_root_text(text: &RootText) -> Result<Self, DecodeError> {
        let chars = styled_chars(text)?;
        if chars.is_empty() {
            return Ok(Self::default());
        }

        let mut chars = chars.iter().peekable();
        let first_id = match chars.next_if(|ch| ch.ch == '\n') {
            Some(newline) => newline.id,
            None => END_MARKER,
        };
        let mut paragraphs = Vec::new();
        let mut current = Paragraph::new(first_id, text);
        for ch in chars {
            if ch.ch == '\n' {
                let next = Paragraph::new(ch.id, text);
                paragraphs.push(std::mem::replace(&mut current, next));
            } else {
                current.push(ch);
            }
        }
        paragraphs.push(current);
        Ok(Self { paragraphs })
    }
}

impl fmt::Display for TextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, paragraph) in self.paragraphs.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{paragraph}")?;
        }
        Ok(())
    }
}
