//! CRDT sequence reconstruction.
//!
//! Sequence items carry the ids of their left and right neighbours at the
//! time they were inserted. The visible order is recovered by a layered
//! topological sort over those links: an item comes after its left
//! neighbour, and its right neighbour comes after it. `END_MARKER` on the
//! left means "start of sequence", on the right "end of sequence".
//!
//! Items that become ready in the same layer are emitted in `CrdtId` order.
//! That tie-break is what makes concurrent inserts at one position
//! deterministic, independent of the order items were read.

pub mod lww;

use log::trace;
use rustc_hash::FxHashMap;

use crate::error::DecodeError;
use crate::model::CrdtId;

pub use lww::{LwwMap, LwwValue};

/// One fragment of a CRDT sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct CrdtSequenceItem<T> {
    pub item_id: CrdtId,
    pub left_id: CrdtId,
    pub right_id: CrdtId,
    /// Number of deleted slots this fragment stands for; `0` for live items.
    pub deleted_length: u32,
    pub value: T,
}

impl<T> CrdtSequenceItem<T> {
    pub fn is_deleted(&self) -> bool {
        self.deleted_length > 0
    }
}

/// An ordered view over a set of sequence items.
#[derive(Debug, Clone)]
pub struct CrdtSequence<T> {
    items: FxHashMap<CrdtId, CrdtSequenceItem<T>>,
    order: Vec<CrdtId>,
}

impl<T> CrdtSequence<T> {
    /// Indexes and orders `items`.
    ///
    /// A later item with an id already seen replaces the earlier one.
    /// Fails with `CyclicSequence` if the neighbour links contain a cycle.
    pub fn from_items<I>(items: I) -> Result<Self, DecodeError>
    where
        I: IntoIterator<Item = CrdtSequenceItem<T>>,
    {
        let mut index = FxHashMap::default();
        for item in items {
            index.insert(item.item_id, item);
        }
        let order = toposort(&index)?;
        Ok(Self {
            items: index,
            order,
        })
    }

    /// Ids of all items, deleted ones included, in sequence order.
    pub fn keys(&self) -> &[CrdtId] {
        &self.order
    }

    pub fn get(&self, id: &CrdtId) -> Option<&CrdtSequenceItem<T>> {
        self.items.get(id)
    }

    /// All items in sequence order, deleted ones included.
    pub fn iter(&self) -> impl Iterator<Item = &CrdtSequenceItem<T>> + '_ {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    /// Live items in sequence order.
    pub fn visible(&self) -> impl Iterator<Item = &CrdtSequenceItem<T>> + '_ {
        self.iter().filter(|item| !item.is_deleted())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Node {
    Start,
    Item(CrdtId),
    End,
}

fn left_node(id: CrdtId) -> Node {
    if id.is_end_marker() { Node::Start } else { Node::Item(id) }
}

fn right_node(id: CrdtId) -> Node {
    if id.is_end_marker() { Node::End } else { Node::Item(id) }
}

/// Orders item ids so every item follows its left neighbour and precedes
/// its right neighbour.
///
/// Neighbours that are not in `items` (e.g. fragments of another text
/// stream, or ids trimmed by the device) take part in the ordering as
/// anonymous placeholders but are not emitted.
fn toposort<T>(items: &FxHashMap<CrdtId, CrdtSequenceItem<T>>) -> Result<Vec<CrdtId>, DecodeError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    // pending[n] = number of nodes n must come after; after[n] = nodes
    // waiting on n.
    let mut pending: FxHashMap<Node, usize> = FxHashMap::default();
    let mut after: FxHashMap<Node, Vec<Node>> = FxHashMap::default();
    let mut add_edge = |before: Node, later: Node| {
        *pending.entry(later).or_insert(0) += 1;
        pending.entry(before).or_insert(0);
        after.entry(before).or_default().push(later);
    };
    for item in items.values() {
        let node = Node::Item(item.item_id);
        add_edge(left_node(item.left_id), node);
        add_edge(node, right_node(item.right_id));
    }

    let mut layer: Vec<Node> = pending
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&node, _)| node)
        .collect();
    let mut resolved = 0;
    let mut order = Vec::with_capacity(items.len());

    while !layer.is_empty() {
        layer.sort_unstable();
        resolved += layer.len();
        let mut next = Vec::new();
        for node in &layer {
            if let Node::Item(id) = node {
                if items.contains_key(id) {
                    order.push(*id);
                }
            }
            for later in after.get(node).into_iter().flatten() {
                if let Some(count) = pending.get_mut(later) {
                    *count -= 1;
                    if *count == 0 {
                        next.push(*later);
                    }
                }
            }
        }
        layer = next;
    }

    if resolved != pending.len() {
        return Err(DecodeError::CyclicSequence {
            unresolved: pending.len() - resolved,
        });
    }
    trace!("ordered {} sequence items", order.len());
    Ok(order)
}
