//! Subtree signature counts and deterministic ranking.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::Serialize;

use crate::block::BlockId;
use crate::index::GraphIndex;
use crate::store::BlockStore;

/// A block and its aggregate signature count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedBlock {
    pub block_id: BlockId,
    pub score: u64,
}

/// Own signatures plus those of every descendant.
///
/// Each block is counted once even if corrupted input links it twice.
/// Unknown blocks score zero.
pub fn aggregate_signature_count(store: &BlockStore, index: &GraphIndex, block_id: &str) -> u64 {
    if !store.contains(block_id) {
        return 0;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![block_id];
    let mut total = 0;

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        if let Some(block) = store.get(current) {
            total += block.signature_count();
        }
        stack.extend(index.children_of(current).iter().map(String::as_str));
    }

    total
}

/// Sort blocks by descending aggregate count.
///
/// Ties go to the block ingested first. Unknown ids score zero and sort after
/// known blocks of equal score, keeping their input order.
pub fn rank_by_aggregate<I, S>(
    store: &BlockStore,
    index: &GraphIndex,
    block_ids: I,
) -> Vec<RankedBlock>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ranked: Vec<(RankedBlock, usize)> = block_ids
        .into_iter()
        .map(|block_id| {
            let block_id = block_id.as_ref();
            let score = aggregate_signature_count(store, index, block_id);
            let sequence = store.sequence_of(block_id).unwrap_or(usize::MAX);
            (
                RankedBlock {
                    block_id: block_id.to_string(),
                    score,
                },
                sequence,
            )
        })
        .collect();

    ranked.sort_by_key(|(block, sequence)| (Reverse(block.score), *sequence));
    ranked.into_iter().map(|(block, _)| block).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use buddybook_relay::source::mock_blocks::{self, make_address};
    use buddybook_relay::RawBlock;

    fn build(blocks: Vec<RawBlock>) -> (BlockStore, GraphIndex) {
        let mut store = BlockStore::new();
        let mut index = GraphIndex::new();
        for raw in blocks {
            let id = raw.block_id.clone().unwrap();
            if store.upsert(raw).unwrap().inserted {
                index.record(store.get(&id).unwrap());
            }
        }
        (store, index)
    }

    fn block(id: &str, parent: Option<&str>) -> RawBlock {
        let raw = mock_blocks::root_block("chain", id, &make_address(1));
        match parent {
            Some(parent) => mock_blocks::with_parent(raw, parent),
            None => raw,
        }
    }

    fn example() -> (BlockStore, GraphIndex) {
        build(vec![
            block("R", None),
            block("C1", Some("R")),
            block("C2", Some("R")),
            block("C3", Some("C1")),
        ])
    }

    #[test]
    fn test_aggregate_example() {
        let (store, index) = example();

        assert_eq!(aggregate_signature_count(&store, &index, "R"), 4);
        assert_eq!(aggregate_signature_count(&store, &index, "C1"), 2);
        assert_eq!(aggregate_signature_count(&store, &index, "C2"), 1);
        assert_eq!(aggregate_signature_count(&store, &index, "C3"), 1);
        assert_eq!(aggregate_signature_count(&store, &index, "missing"), 0);
    }

    #[test]
    fn test_rank_ties_by_insertion() {
        let (store, index) = example();

        let ranked = rank_by_aggregate(&store, &index, ["C3", "C2", "C1", "R"]);
        let ids: Vec<&str> = ranked.iter().map(|r| r.block_id.as_str()).collect();
        let scores: Vec<u64> = ranked.iter().map(|r| r.score).collect();

        assert_eq!(ids, vec!["R", "C1", "C2", "C3"]);
        assert_eq!(scores, vec![4, 2, 1, 1]);
    }

    #[test]
    fn test_rank_unknown_ids_last() {
        let (mut store, mut index) = example();
        store.upsert(mock_blocks::unsigned(block("Z", None))).unwrap();
        index.record(store.get("Z").unwrap());

        let ranked = rank_by_aggregate(&store, &index, ["ghost", "Z", "C2"]);
        let ids: Vec<&str> = ranked.iter().map(|r| r.block_id.as_str()).collect();

        assert_eq!(ids, vec!["C2", "Z", "ghost"]);
    }

    #[test]
    fn test_aggregate_cycle_counts_once() {
        let (store, index) = build(vec![block("A", Some("B")), block("B", Some("A"))]);

        assert_eq!(aggregate_signature_count(&store, &index, "A"), 2);
    }

    #[test]
    fn test_aggregate_self_parent_counts_once() {
        let (store, index) = build(vec![block("X", Some("X"))]);

        assert_eq!(aggregate_signature_count(&store, &index, "X"), 1);
        assert_eq!(index.tree_of("X").size(), 1);
    }

    #[test]
    fn test_aggregate_counts_multi_signature_blocks() {
        let mut root = block("R", None);
        root.signatures = Some(vec![
            buddybook_relay::RawSignature::new("0x01", "a"),
            buddybook_relay::RawSignature::new("0x02", "b"),
        ]);
        let (store, index) = build(vec![root, block("C", Some("R"))]);

        assert_eq!(aggregate_signature_count(&store, &index, "R"), 3);
    }
}
