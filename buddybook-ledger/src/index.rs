//! Parent to children adjacency, maintained one insert at a time.
//!
//! Edges are recorded by id alone. A child that arrives before its parent
//! lands in the parent's bucket immediately, so nothing is reprocessed when
//! the parent shows up later.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::block::{Block, BlockId, ChainId};

/// A node in a rendered subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub block_id: BlockId,
    /// Distance from the node the tree was built from.
    pub depth: usize,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Total number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

#[derive(Debug, Default, Clone)]
pub struct GraphIndex {
    children: HashMap<BlockId, Vec<BlockId>>,
    roots: HashMap<ChainId, Vec<BlockId>>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly inserted block.
    ///
    /// Must be called exactly once per block the store accepted.
    pub fn record(&mut self, block: &Block) {
        match &block.parent_block_id {
            Some(parent) => self
                .children
                .entry(parent.clone())
                .or_default()
                .push(block.block_id.clone()),
            None => self
                .roots
                .entry(block.chain_id.clone())
                .or_default()
                .push(block.block_id.clone()),
        }
    }

    /// Child ids in arrival order. Empty for unknown ids.
    pub fn children_of(&self, block_id: &str) -> &[BlockId] {
        self.children
            .get(block_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every root of a chain, in arrival order.
    ///
    /// More than one root means participants raced to create the chain.
    pub fn roots_of(&self, chain_id: &str) -> &[BlockId] {
        self.roots
            .get(chain_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Build the subtree under `block_id`.
    ///
    /// Each id appears at most once, so corrupted cyclic input still yields a
    /// finite tree.
    pub fn tree_of(&self, block_id: &str) -> TreeNode {
        struct Slot<'a> {
            block_id: &'a str,
            depth: usize,
            children: Vec<usize>,
        }

        let mut slots = vec![Slot {
            block_id,
            depth: 0,
            children: Vec::new(),
        }];
        let mut visited: HashSet<&str> = HashSet::from([block_id]);
        let mut stack = vec![0];

        while let Some(current) = stack.pop() {
            let depth = slots[current].depth + 1;
            for child in self.children_of(slots[current].block_id) {
                if !visited.insert(child.as_str()) {
                    continue;
                }
                let slot = slots.len();
                slots.push(Slot {
                    block_id: child,
                    depth,
                    children: Vec::new(),
                });
                slots[current].children.push(slot);
                stack.push(slot);
            }
        }

        // Children always sit in later slots than their parent.
        let mut built: Vec<Option<TreeNode>> = vec![None; slots.len()];
        for index in (0..slots.len()).rev() {
            let children = slots[index]
                .children
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            built[index] = Some(TreeNode {
                block_id: slots[index].block_id.to_string(),
                depth: slots[index].depth,
                children,
            });
        }

        built[0].take().unwrap_or(TreeNode {
            block_id: block_id.to_string(),
            depth: 0,
            children: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BlockStore;
    use buddybook_relay::source::mock_blocks::{self, make_address};
    use buddybook_relay::RawBlock;

    fn ingest(store: &mut BlockStore, index: &mut GraphIndex, raw: RawBlock) {
        let id = raw.block_id.clone().unwrap();
        if store.upsert(raw).unwrap().inserted {
            index.record(store.get(&id).unwrap());
        }
    }

    fn root(id: &str) -> RawBlock {
        mock_blocks::root_block("chain", id, &make_address(1))
    }

    fn child(parent: &str, id: &str) -> RawBlock {
        mock_blocks::with_parent(root(id), parent)
    }

    #[test]
    fn test_children_in_arrival_order() {
        let mut store = BlockStore::new();
        let mut index = GraphIndex::new();

        ingest(&mut store, &mut index, root("r"));
        ingest(&mut store, &mut index, child("r", "b"));
        ingest(&mut store, &mut index, child("r", "a"));
        ingest(&mut store, &mut index, child("r", "a"));

        assert_eq!(index.children_of("r"), ["b", "a"]);
        assert!(index.children_of("a").is_empty());
        assert!(index.children_of("unknown").is_empty());
    }

    #[test]
    fn test_child_before_parent() {
        let mut store = BlockStore::new();
        let mut index = GraphIndex::new();

        ingest(&mut store, &mut index, child("r", "c1"));
        assert_eq!(index.children_of("r"), ["c1"]);

        ingest(&mut store, &mut index, root("r"));
        assert_eq!(index.children_of("r"), ["c1"]);
        assert_eq!(index.roots_of("chain"), ["r"]);
    }

    #[test]
    fn test_multiple_roots() {
        let mut store = BlockStore::new();
        let mut index = GraphIndex::new();

        ingest(&mut store, &mut index, root("r2"));
        ingest(&mut store, &mut index, root("r1"));

        assert_eq!(index.roots_of("chain"), ["r2", "r1"]);
        assert!(index.roots_of("other").is_empty());
    }

    #[test]
    fn test_tree_of_depths() {
        let mut store = BlockStore::new();
        let mut index = GraphIndex::new();

        ingest(&mut store, &mut index, root("r"));
        ingest(&mut store, &mut index, child("r", "c1"));
        ingest(&mut store, &mut index, child("r", "c2"));
        ingest(&mut store, &mut index, child("c1", "c3"));

        let tree = index.tree_of("r");
        assert_eq!(tree.size(), 4);
        assert_eq!(tree.children[0].block_id, "c1");
        assert_eq!(tree.children[1].block_id, "c2");
        assert_eq!(tree.children[0].children[0].block_id, "c3");
        assert_eq!(tree.children[0].children[0].depth, 2);
    }

    #[test]
    fn test_tree_of_cycle_terminates() {
        let mut store = BlockStore::new();
        let mut index = GraphIndex::new();

        ingest(&mut store, &mut index, child("b", "a"));
        ingest(&mut store, &mut index, child("a", "b"));

        let tree = index.tree_of("a");
        assert_eq!(tree.size(), 2);
        assert_eq!(tree.children[0].block_id, "b");
        assert!(tree.children[0].children.is_empty());
    }
}
