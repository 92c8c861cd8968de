//! Append-only block store keyed by block id.
//!
//! Blocks live in an arena in insertion order; a map from id to arena slot
//! gives O(1) lookup. The slot doubles as the block's insertion sequence,
//! which ranking uses to break ties.

use std::collections::{HashMap, HashSet};

use buddybook_relay::RawBlock;

use crate::block::{Block, BlockId, ChainId};
use crate::errors::ValidationError;

/// Result of a successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// `false` when a block with the same id was already stored.
    pub inserted: bool,
}

#[derive(Debug, Default, Clone)]
pub struct BlockStore {
    blocks: Vec<Block>,
    slots: HashMap<BlockId, usize>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a raw record.
    ///
    /// First writer wins: a record whose id is already present is ignored
    /// even if its other fields differ.
    pub fn upsert(&mut self, raw: RawBlock) -> Result<UpsertOutcome, ValidationError> {
        let block = Block::try_from(raw)?;
        Ok(self.insert(block))
    }

    /// Store an already validated block.
    pub fn insert(&mut self, block: Block) -> UpsertOutcome {
        if self.slots.contains_key(&block.block_id) {
            return UpsertOutcome { inserted: false };
        }

        self.slots.insert(block.block_id.clone(), self.blocks.len());
        self.blocks.push(block);
        UpsertOutcome { inserted: true }
    }

    pub fn get(&self, block_id: &str) -> Option<&Block> {
        self.slots.get(block_id).map(|&slot| &self.blocks[slot])
    }

    pub fn contains(&self, block_id: &str) -> bool {
        self.slots.contains_key(block_id)
    }

    /// Every stored block, in insertion order.
    pub fn all(&self) -> &[Block] {
        &self.blocks
    }

    /// Insertion rank of a block, starting at zero.
    pub fn sequence_of(&self, block_id: &str) -> Option<usize> {
        self.slots.get(block_id).copied()
    }

    /// Look up a block through a shared link, which names both ids.
    pub fn find_in_chain(&self, chain_id: &str, block_id: &str) -> Option<&Block> {
        self.get(block_id).filter(|block| block.chain_id == chain_id)
    }

    /// Distinct chain ids in order of first appearance.
    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut seen = HashSet::new();
        self.blocks
            .iter()
            .filter(|block| seen.insert(block.chain_id.as_str()))
            .map(|block| block.chain_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buddybook_relay::source::mock_blocks::{self, make_address};

    fn root(chain: &str, id: &str) -> RawBlock {
        mock_blocks::root_block(chain, id, &make_address(1))
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = BlockStore::new();

        let first = store.upsert(root("chain", "a")).unwrap();
        let second = store.upsert(root("chain", "a")).unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_first_writer_wins() {
        let mut store = BlockStore::new();
        store.upsert(root("chain", "a")).unwrap();

        let mut conflicting = root("chain", "a");
        conflicting.title = Some("Rewritten".to_string());
        let outcome = store.upsert(conflicting).unwrap();

        assert!(!outcome.inserted);
        assert_eq!(store.get("a").unwrap().title, "Chain chain");
    }

    #[test]
    fn test_invalid_record_not_stored() {
        let mut store = BlockStore::new();
        let mut raw = root("chain", "a");
        raw.signatures = None;

        assert!(store.upsert(raw).is_err());
        assert!(store.is_empty());
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_insertion_order_and_sequence() {
        let mut store = BlockStore::new();
        for id in ["c", "a", "b"] {
            store.upsert(root("chain", id)).unwrap();
        }
        store.upsert(root("chain", "a")).unwrap();

        let ids: Vec<&str> = store.all().iter().map(|b| b.block_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(store.sequence_of("b"), Some(2));
        assert_eq!(store.sequence_of("missing"), None);
    }

    #[test]
    fn test_find_in_chain_checks_chain() {
        let mut store = BlockStore::new();
        store.upsert(root("card", "a")).unwrap();

        assert!(store.find_in_chain("card", "a").is_some());
        assert!(store.find_in_chain("petition", "a").is_none());
        assert!(store.find_in_chain("card", "b").is_none());
    }

    #[test]
    fn test_chain_ids_first_appearance() {
        let mut store = BlockStore::new();
        store.upsert(root("petition", "p1")).unwrap();
        store.upsert(root("card", "c1")).unwrap();
        store.upsert(root("petition", "p2")).unwrap();

        assert_eq!(store.chain_ids(), vec!["petition", "card"]);
    }
}
