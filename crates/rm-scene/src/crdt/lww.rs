//! Last-writer-wins values.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::model::CrdtId;

/// A value tagged with the id of the edit that wrote it.
///
/// Competing writes for the same logical field are resolved in favour of
/// the greater timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LwwValue<T> {
    pub timestamp: CrdtId,
    pub value: T,
}

impl<T> LwwValue<T> {
    pub fn new(timestamp: CrdtId, value: T) -> Self {
        Self { timestamp, value }
    }

    /// Keeps whichever of `self` and `other` was written last.
    ///
    /// On equal timestamps the current value stays.
    pub fn merge(self, other: LwwValue<T>) -> LwwValue<T> {
        if other.timestamp > self.timestamp {
            other
        } else {
            self
        }
    }
}

/// A map of independently merged LWW registers.
#[derive(Debug, Clone, PartialEq)]
pub struct LwwMap<K: Eq + Hash, T> {
    entries: FxHashMap<K, LwwValue<T>>,
}

impl<K: Eq + Hash, T> Default for LwwMap<K, T> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<K: Eq + Hash, T> LwwMap<K, T> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `value` into the register for `key`.
    ///
    /// Returns `true` if the stored value changed.
    pub fn merge(&mut self, key: K, value: LwwValue<T>) -> bool {
        match self.entries.get_mut(&key) {
            Some(current) if value.timestamp > current.timestamp => {
                *current = value;
                true
            }
            Some(_) => false,
            None => {
                self.entries.insert(key, value);
                true
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&LwwValue<T>> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &LwwValue<T>)> {
        self.entries.iter()
    }
}

impl<K: Eq + Hash, T> FromIterator<(K, LwwValue<T>)> for LwwMap<K, T> {
    fn from_iter<I: IntoIterator<Item = (K, LwwValue<T>)>>(iter: I) -> Self {
        let mut map = LwwMap::new();
        for (key, value) in iter {
            map.merge(key, value);
        }
        map
    }
}
