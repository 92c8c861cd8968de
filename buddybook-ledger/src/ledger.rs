//! Block store and graph index behind a single apply path.
//!
//! [`Ledger`] is the mutable state owned by the coordinator.
//! [`LedgerReader`] is the shared, read-only view handed to callers; every
//! query takes a read lock, so it never sees a block without its index entry.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use buddybook_relay::RawBlock;

use crate::aggregate::{self, RankedBlock};
use crate::block::{Block, BlockId, ChainId};
use crate::custody;
use crate::errors::ValidationError;
use crate::index::{GraphIndex, TreeNode};
use crate::store::{BlockStore, UpsertOutcome};

#[derive(Debug, Default, Clone)]
pub struct Ledger {
    store: BlockStore,
    index: GraphIndex,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, store and index one raw record.
    pub fn apply(&mut self, raw: RawBlock) -> Result<UpsertOutcome, ValidationError> {
        let block_id = raw.block_id.clone();

        let outcome = self.store.upsert(raw)?;
        if outcome.inserted {
            if let Some(block) = block_id.as_deref().and_then(|id| self.store.get(id)) {
                self.index.record(block);
            }
        }

        Ok(outcome)
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn index(&self) -> &GraphIndex {
        &self.index
    }

    pub fn get(&self, block_id: &str) -> Option<&Block> {
        self.store.get(block_id)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Subtree rooted at a stored block.
    pub fn tree_of(&self, block_id: &str) -> Option<TreeNode> {
        self.store
            .contains(block_id)
            .then(|| self.index.tree_of(block_id))
    }

    /// Every root of a chain with its subtree, roots in arrival order.
    pub fn forest_of(&self, chain_id: &str) -> Vec<TreeNode> {
        self.index
            .roots_of(chain_id)
            .iter()
            .map(|root| self.index.tree_of(root))
            .collect()
    }

    pub fn has_signed(&self, block_id: &str, address: &str) -> bool {
        custody::has_signed(&self.store, &self.index, block_id, address)
    }

    pub fn find_signature(&self, block_id: &str, address: &str) -> Option<BlockId> {
        custody::find_signature(&self.store, &self.index, block_id, address)
    }

    pub fn aggregate_signature_count(&self, block_id: &str) -> u64 {
        aggregate::aggregate_signature_count(&self.store, &self.index, block_id)
    }

    pub fn rank_by_aggregate<I, S>(&self, block_ids: I) -> Vec<RankedBlock>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        aggregate::rank_by_aggregate(&self.store, &self.index, block_ids)
    }
}

/// Cloneable read handle over the coordinator's ledger.
///
/// Queries are synchronous and never wait on feed activity beyond the time a
/// single record takes to apply.
#[derive(Debug, Clone)]
pub struct LedgerReader {
    ledger: Arc<RwLock<Ledger>>,
}

impl LedgerReader {
    pub(crate) fn new(ledger: Arc<RwLock<Ledger>>) -> Self {
        Self { ledger }
    }

    fn read(&self) -> RwLockReadGuard<'_, Ledger> {
        // Writers never leave the ledger half-applied, so a poisoned lock is
        // still consistent.
        self.ledger.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run several queries against one consistent snapshot.
    pub fn with_ledger<R>(&self, query: impl FnOnce(&Ledger) -> R) -> R {
        query(&*self.read())
    }

    pub fn get(&self, block_id: &str) -> Option<Block> {
        self.read().get(block_id).cloned()
    }

    pub fn all(&self) -> Vec<Block> {
        self.read().store().all().to_vec()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn find_in_chain(&self, chain_id: &str, block_id: &str) -> Option<Block> {
        self.read().store().find_in_chain(chain_id, block_id).cloned()
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        self.read().store().chain_ids()
    }

    pub fn children_of(&self, block_id: &str) -> Vec<BlockId> {
        self.read().index().children_of(block_id).to_vec()
    }

    pub fn roots_of(&self, chain_id: &str) -> Vec<BlockId> {
        self.read().index().roots_of(chain_id).to_vec()
    }

    pub fn tree_of(&self, block_id: &str) -> Option<TreeNode> {
        self.read().tree_of(block_id)
    }

    pub fn forest_of(&self, chain_id: &str) -> Vec<TreeNode> {
        self.read().forest_of(chain_id)
    }

    pub fn has_signed(&self, block_id: &str, address: &str) -> bool {
        self.read().has_signed(block_id, address)
    }

    pub fn find_signature(&self, block_id: &str, address: &str) -> Option<BlockId> {
        self.read().find_signature(block_id, address)
    }

    pub fn aggregate_signature_count(&self, block_id: &str) -> u64 {
        self.read().aggregate_signature_count(block_id)
    }

    pub fn rank_by_aggregate<I, S>(&self, block_ids: I) -> Vec<RankedBlock>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.read().rank_by_aggregate(block_ids)
    }
}
