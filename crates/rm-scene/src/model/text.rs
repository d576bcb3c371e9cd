//! Text payload types.

/// Value of one text CRDT fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextValue {
    /// A run of characters (empty for deleted fragments).
    Str(String),
    /// Inline formatting directive, see [`crate::text::FormatCode`].
    Format(u32),
}

impl TextValue {
    /// Returns true for an empty string value.
    pub fn is_empty(&self) -> bool {
        matches!(self, TextValue::Str(s) if s.is_empty())
    }

    /// Returns the string contents, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TextValue::Str(s) => Some(s),
            TextValue::Format(_) => None,
        }
    }
}

impl From<&str> for TextValue {
    fn from(s: &str) -> Self {
        TextValue::Str(s.to_string())
    }
}

/// Block-level style of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParagraphStyle {
    Basic,
    #[default]
    Plain,
    Heading,
    Bold,
    Bullet,
    Bullet2,
    Checkbox,
    CheckboxChecked,
    Unknown(u8),
}

impl ParagraphStyle {
    /// Creates a ParagraphStyle from its wire code.
    pub fn from_u8(v: u8) -> ParagraphStyle {
        match v {
            0 => ParagraphStyle::Basic,
            1 => ParagraphStyle::Plain,
            2 => ParagraphStyle::Heading,
            3 => ParagraphStyle::Bold,
            4 => ParagraphStyle::Bullet,
            5 => ParagraphStyle::Bullet2,
            6 => ParagraphStyle::Checkbox,
            7 => ParagraphStyle::CheckboxChecked,
            other => ParagraphStyle::Unknown(other),
        }
    }
}
