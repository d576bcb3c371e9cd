//! Compound identifiers for scene nodes, items and CRDT fragments.

use std::fmt;

/// A two-part identifier `(high, low)`.
///
/// `high` is the author slot (see the author id table) and `low` a counter
/// local to that author. Ids order lexicographically on `(high, low)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CrdtId {
    pub high: u64,
    pub low: u64,
}

/// Sentinel id: no value, root, or end of a sequence.
pub const END_MARKER: CrdtId = CrdtId::new(0, 0);

impl CrdtId {
    /// Creates an id from its two parts.
    pub const fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    /// Returns true for the `(0, 0)` sentinel.
    pub fn is_end_marker(&self) -> bool {
        *self == END_MARKER
    }

    /// Returns the id `n` positions further along the same author's counter,
    /// or `None` if the counter would overflow.
    ///
    /// Multi-character text fragments give each character an implicit id
    /// derived this way.
    pub fn offset(&self, n: u64) -> Option<CrdtId> {
        Some(CrdtId::new(self.high, self.low.checked_add(n)?))
    }
}

impl fmt::Display for CrdtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.high, self.low)
    }
}

impl From<(u64, u64)> for CrdtId {
    fn from((high, low): (u64, u64)) -> Self {
        CrdtId::new(high, low)
    }
}
