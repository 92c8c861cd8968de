//! Chain-of-custody query.
//!
//! Answers "has this address signed anywhere in this block's lineage". The
//! search starts at the target block, climbs toward the root through parent
//! links, and descends into children on the way. Every ancestor reached also
//! has its other children searched, and the target's own children are
//! searched after the climb. One visited set is shared by the whole search,
//! so each block is checked at most once and cyclic parent links terminate.
//!
//! The search runs on an explicit work stack. The parent is pushed on top of
//! the children, so the climb always happens before the descent.

use std::collections::HashSet;

use crate::block::BlockId;
use crate::index::GraphIndex;
use crate::store::BlockStore;

/// Whether `address` signed `block_id`, any ancestor, or any descendant.
///
/// Unknown blocks return `false`.
pub fn has_signed(store: &BlockStore, index: &GraphIndex, block_id: &str, address: &str) -> bool {
    find_signature(store, index, block_id, address).is_some()
}

/// The first block in the lineage of `block_id` that `address` signed.
pub fn find_signature(
    store: &BlockStore,
    index: &GraphIndex,
    block_id: &str,
    address: &str,
) -> Option<BlockId> {
    if !store.contains(block_id) {
        return None;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![block_id];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }

        // Dangling ids are never stored and are only reachable as parents.
        let Some(block) = store.get(current) else {
            continue;
        };

        if block.is_signed_by(address) {
            return Some(block.block_id.clone());
        }

        stack.extend(
            index
                .children_of(current)
                .iter()
                .rev()
                .map(String::as_str)
                .filter(|child| !visited.contains(child)),
        );

        if let Some(parent) = block.parent_block_id.as_deref() {
            if !visited.contains(parent) {
                stack.push(parent);
            }
        }
    }

    None
}

/// Number of distinct blocks a custody search from `block_id` can reach.
///
/// Upper bound on the work done by [`has_signed`] for a signer that is absent.
pub fn lineage_size(store: &BlockStore, index: &GraphIndex, block_id: &str) -> usize {
    if !store.contains(block_id) {
        return 0;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![block_id];

    while let Some(current) = stack.pop() {
        let Some(block) = store.get(current) else {
            continue;
        };
        if !visited.insert(current) {
            continue;
        }

        stack.extend(index.children_of(current).iter().map(String::as_str));
        stack.extend(block.parent_block_id.as_deref());
    }

    visited.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use buddybook_relay::source::mock_blocks::{self, make_address};
    use buddybook_relay::RawBlock;

    struct Fixture {
        store: BlockStore,
        index: GraphIndex,
    }

    impl Fixture {
        fn new(blocks: Vec<RawBlock>) -> Self {
            let mut store = BlockStore::new();
            let mut index = GraphIndex::new();
            for raw in blocks {
                let id = raw.block_id.clone().unwrap();
                if store.upsert(raw).unwrap().inserted {
                    index.record(store.get(&id).unwrap());
                }
            }
            Self { store, index }
        }

        fn has_signed(&self, block_id: &str, address: &str) -> bool {
            has_signed(&self.store, &self.index, block_id, address)
        }
    }

    fn signed(id: &str, parent: Option<&str>, signer: u8) -> RawBlock {
        let raw = mock_blocks::root_block("chain", id, &make_address(signer));
        match parent {
            Some(parent) => mock_blocks::with_parent(raw, parent),
            None => raw,
        }
    }

    fn unsigned(id: &str, parent: Option<&str>) -> RawBlock {
        mock_blocks::unsigned(signed(id, parent, 0))
    }

    #[test]
    fn test_signature_propagates_through_lineage() {
        let addr = make_address(0xaa);
        let fixture = Fixture::new(vec![
            unsigned("R", None),
            unsigned("C1", Some("R")),
            signed("C2", Some("C1"), 0xaa),
            unsigned("D", None),
        ]);

        assert!(fixture.has_signed("R", &addr));
        assert!(fixture.has_signed("C1", &addr));
        assert!(fixture.has_signed("C2", &addr));
        assert!(!fixture.has_signed("D", &addr));
    }

    #[test]
    fn test_sibling_branch_reached_through_ancestor() {
        let addr = make_address(0xaa);
        let fixture = Fixture::new(vec![
            unsigned("R", None),
            unsigned("left", Some("R")),
            signed("right", Some("R"), 0xaa),
        ]);

        assert!(fixture.has_signed("left", &addr));
        assert_eq!(
            find_signature(&fixture.store, &fixture.index, "left", &addr).as_deref(),
            Some("right")
        );
    }

    #[test]
    fn test_unknown_block_is_false() {
        let fixture = Fixture::new(vec![signed("R", None, 0xaa)]);

        assert!(!fixture.has_signed("missing", &make_address(0xaa)));
        assert_eq!(lineage_size(&fixture.store, &fixture.index, "missing"), 0);
    }

    #[test]
    fn test_dangling_parent_is_skipped() {
        let addr = make_address(0xaa);
        let fixture = Fixture::new(vec![
            unsigned("orphan", Some("not-yet")),
            signed("grandchild", Some("orphan"), 0xaa),
        ]);

        assert!(fixture.has_signed("orphan", &addr));
        assert!(!fixture.has_signed("orphan", &make_address(0xbb)));
    }

    #[test]
    fn test_two_cycle_terminates() {
        let addr = make_address(0xaa);
        let fixture = Fixture::new(vec![unsigned("A", Some("B")), unsigned("B", Some("A"))]);

        assert!(!fixture.has_signed("A", &addr));
        assert!(!fixture.has_signed("B", &addr));
        assert_eq!(lineage_size(&fixture.store, &fixture.index, "A"), 2);
    }

    #[test]
    fn test_self_parent_block() {
        let addr = make_address(0xaa);
        let fixture = Fixture::new(vec![
            signed("X", Some("X"), 0xaa),
            unsigned("Y", Some("X")),
        ]);

        assert!(fixture.has_signed("X", &addr));
        assert!(fixture.has_signed("Y", &addr));
        assert!(!fixture.has_signed("X", &make_address(0xbb)));
        assert_eq!(lineage_size(&fixture.store, &fixture.index, "X"), 2);
    }

    #[test]
    fn test_cycle_with_signer() {
        let addr = make_address(0xaa);
        let fixture = Fixture::new(vec![
            unsigned("A", Some("C")),
            unsigned("B", Some("A")),
            signed("C", Some("B"), 0xaa),
        ]);

        assert!(fixture.has_signed("A", &addr));
        assert!(fixture.has_signed("B", &addr));
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let addr = make_address(0xaa);
        let mut blocks = vec![unsigned("b0", None)];
        for n in 1..50_000 {
            blocks.push(unsigned(&format!("b{}", n), Some(&format!("b{}", n - 1))));
        }
        blocks.push(signed("leaf", Some("b49999"), 0xaa));
        let fixture = Fixture::new(blocks);

        assert!(fixture.has_signed("b0", &addr));
        assert!(fixture.has_signed("b25000", &addr));
    }
}
