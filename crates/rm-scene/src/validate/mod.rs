//! Semantic validation for decoded pages.
//!
//! Structural checks happen during decode; these checks need the whole page
//! (every tree node must be declared somewhere in the file before references
//! to it can be judged).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ValidationError;
use crate::limits::ROOT_NODE_ID;
use crate::model::{Block, BlockData, CrdtId};

/// Validates the scene tree of a decoded page.
///
/// Checks, in order of the blocks:
/// - no scene item id appears twice under the same parent
/// - scene tree edges only connect declared tree nodes
/// - live group items only reference declared tree nodes
/// - a node placed by both a scene tree edge and a group item has the same
///   parent in both
///
/// The root layer counts as declared even without a tree node block.
pub fn validate_blocks(blocks: &[Block]) -> Result<(), ValidationError> {
    let mut declared: FxHashSet<CrdtId> = blocks
        .iter()
        .filter_map(|block| match &block.data {
            BlockData::TreeNode(node) => Some(node.node_id),
            _ => None,
        })
        .collect();
    declared.insert(ROOT_NODE_ID);

    let mut seen_items = FxHashSet::default();
    let mut tree_parents = FxHashMap::default();
    let mut group_parents = FxHashMap::default();

    for block in blocks {
        if let Some((parent, item)) = scene_item_key(&block.data) {
            if !seen_items.insert((parent, item)) {
                return Err(ValidationError::DuplicateItem { parent, item });
            }
        }

        match &block.data {
            BlockData::SceneTree(tree) => {
                for id in [tree.tree_id, tree.parent_id] {
                    if !declared.contains(&id) {
                        return Err(ValidationError::UnknownParent {
                            node: tree.tree_id,
                            parent: id,
                        });
                    }
                }
                tree_parents.insert(tree.tree_id, tree.parent_id);
            }
            BlockData::GroupItem(item) => {
                if let Some(&node) = item.value() {
                    if !declared.contains(&node) {
                        return Err(ValidationError::UnknownGroupTarget {
                            item: item.item_id(),
                            node,
                        });
                    }
                    group_parents.insert(node, item.parent_id);
                }
            }
            _ => {}
        }
    }

    for (&node, &group_parent) in &group_parents {
        if let Some(&tree_parent) = tree_parents.get(&node) {
            if tree_parent != group_parent {
                return Err(ValidationError::ConflictingParent {
                    node,
                    tree_parent,
                    group_parent,
                });
            }
        }
    }
    Ok(())
}

fn scene_item_key(data: &BlockData) -> Option<(CrdtId, CrdtId)> {
    match data {
        BlockData::GlyphItem(item) => Some((item.parent_id, item.item_id())),
        BlockData::GroupItem(item) => Some((item.parent_id, item.item_id())),
        BlockData::LineItem(item) => Some((item.parent_id, item.item_id())),
        BlockData::TombstoneItem(item) => Some((item.parent_id, item.item_id())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_blocks;
    use crate::codec::testing::{
        Writer, group_block, line_block, scene_tree_block, tree_node_block,
    };

    const LAYER: CrdtId = CrdtId::new(0, 11);

    fn page(extra: impl FnOnce(&mut Writer)) -> Vec<Block> {
        let mut w = Writer::new();
        tree_node_block(&mut w, LAYER, "Layer 1", None);
        scene_tree_block(&mut w, LAYER, ROOT_NODE_ID);
        group_block(&mut w, ROOT_NODE_ID, CrdtId::new(0, 13), LAYER);
        line_block(&mut w, LAYER, CrdtId::new(1, 1), &[(0.0, 0.0)]);
        extra(&mut w);
        decode_blocks(w.as_bytes()).unwrap()
    }

    #[test]
    fn test_valid_page() {
        assert_eq!(validate_blocks(&page(|_| {})), Ok(()));
    }

    #[test]
    fn test_duplicate_item() {
        let blocks = page(|w| line_block(w, LAYER, CrdtId::new(1, 1), &[(1.0, 1.0)]));
        assert_eq!(
            validate_blocks(&blocks),
            Err(ValidationError::DuplicateItem {
                parent: LAYER,
                item: CrdtId::new(1, 1),
            })
        );
    }

    #[test]
    fn test_same_item_id_under_other_parent() {
        let blocks = page(|w| {
            tree_node_block(w, CrdtId::new(2, 1), "", None);
            line_block(w, CrdtId::new(2, 1), CrdtId::new(1, 1), &[(1.0, 1.0)]);
        });
        assert_eq!(validate_blocks(&blocks), Ok(()));
    }

    #[test]
    fn test_unknown_parent() {
        let blocks = page(|w| scene_tree_block(w, LAYER, CrdtId::new(5, 5)));
        assert_eq!(
            validate_blocks(&blocks),
            Err(ValidationError::UnknownParent {
                node: LAYER,
                parent: CrdtId::new(5, 5),
            })
        );
    }

    #[test]
    fn test_unknown_group_target() {
        let blocks = page(|w| group_block(w, LAYER, CrdtId::new(1, 9), CrdtId::new(6, 6)));
        assert_eq!(
            validate_blocks(&blocks),
            Err(ValidationError::UnknownGroupTarget {
                item: CrdtId::new(1, 9),
                node: CrdtId::new(6, 6),
            })
        );
    }

    #[test]
    fn test_conflicting_parent() {
        let blocks = page(|w| {
            tree_node_block(w, CrdtId::new(2, 1), "", None);
            scene_tree_block(w, CrdtId::new(2, 1), LAYER);
            group_block(w, ROOT_NODE_ID, CrdtId::new(1, 9), CrdtId::new(2, 1));
        });
        assert_eq!(
            validate_blocks(&blocks),
            Err(ValidationError::ConflictingParent {
                node: CrdtId::new(2, 1),
                tree_parent: LAYER,
                group_parent: ROOT_NODE_ID,
            })
        );
    }
}
