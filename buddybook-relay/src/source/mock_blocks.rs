//! Mock block builders mirroring what BuddyBook clients publish.
//!
//! - `root_block` → a new chain, signed by its creator
//! - `child_block` → a co-signer's block referencing the block they signed
//!
//! # Example
//!
//! ```ignore
//! use buddybook_relay::source::mock_blocks;
//!
//! let root = mock_blocks::root_block("chain-1", "root", &mock_blocks::make_address(0x01));
//! let child = mock_blocks::child_block(&root, "child", &mock_blocks::make_address(0x02));
//! ```

use crate::wire::{RawBlock, RawSignature};

/// Creation time of every mock root block (2024-11-01T00:00:00Z).
pub const MOCK_EPOCH_MS: u64 = 1_730_419_200_000;

/// Gap between a mock parent and its child.
pub const CHILD_DELAY_MS: u64 = 60_000;

// =============================================================================
// Builders
// =============================================================================

/// Deterministic stand-in for a wallet signature by `address`.
pub fn signature_for(address: &str, block_id: &str) -> String {
    format!("sig:{}:{}", address, block_id)
}

/// Create the first block of a chain, signed by `creator`.
pub fn root_block(chain_id: &str, block_id: &str, creator: &str) -> RawBlock {
    let signature = signature_for(creator, block_id);

    RawBlock {
        chain_id: Some(chain_id.to_string()),
        block_id: Some(block_id.to_string()),
        title: Some(format!("Chain {}", chain_id)),
        description: Some(format!("Mock chain {}", chain_id)),
        signed_payload: Some(signature.clone()),
        created_at_epoch_ms: Some(MOCK_EPOCH_MS),
        signatures: Some(vec![RawSignature::new(creator, signature)]),
        parent_block_id: None,
    }
}

/// Create a block that `signer` publishes after signing `parent`.
///
/// Title and description are carried over from the parent, as the signing
/// flow does.
pub fn child_block(parent: &RawBlock, block_id: &str, signer: &str) -> RawBlock {
    let signature = signature_for(signer, block_id);

    RawBlock {
        chain_id: parent.chain_id.clone(),
        block_id: Some(block_id.to_string()),
        title: parent.title.clone(),
        description: parent.description.clone(),
        signed_payload: Some(signature.clone()),
        created_at_epoch_ms: parent
            .created_at_epoch_ms
            .map(|created| created + CHILD_DELAY_MS),
        signatures: Some(vec![RawSignature::new(signer, signature)]),
        parent_block_id: parent.block_id.clone(),
    }
}

/// Strip all signatures from a block.
pub fn unsigned(mut block: RawBlock) -> RawBlock {
    block.signatures = Some(Vec::new());
    block
}

/// Point `block` at an arbitrary parent id, known or not.
pub fn with_parent(mut block: RawBlock, parent_block_id: &str) -> RawBlock {
    block.parent_block_id = Some(parent_block_id.to_string());
    block
}

/// Helper to create a well-known address from a single byte.
///
/// Example: `make_address(0x0A)` produces `0x000000000000000000000000000000000000000a`
pub fn make_address(last_byte: u8) -> String {
    format!("0x{:040x}", last_byte)
}

// =============================================================================
// Convenience: deterministic test chains
// =============================================================================

/// Well-known chains used by the mock feed source.
///
/// ```text
/// birthday-card                    petition (two concurrent roots)
///
///   card-root (alice)                petition-a (erin)   petition-b (frank)
///   ├── card-bob (bob)               └── petition-alice (alice)
///   │   └── card-dave (dave)
///   │       └── card-frank (frank)   live only
///   │           └── card-erin (erin) live only, arrives before card-frank
///   └── card-carol (carol)
/// ```
pub mod test_chains {
    use super::*;

    pub const CARD_CHAIN: &str = "birthday-card";
    pub const PETITION_CHAIN: &str = "petition";

    pub const CARD_ROOT: &str = "card-root";
    pub const CARD_BOB: &str = "card-bob";
    pub const CARD_CAROL: &str = "card-carol";
    pub const CARD_DAVE: &str = "card-dave";
    pub const CARD_FRANK: &str = "card-frank";
    pub const CARD_ERIN: &str = "card-erin";

    pub const PETITION_A: &str = "petition-a";
    pub const PETITION_B: &str = "petition-b";
    pub const PETITION_ALICE: &str = "petition-alice";

    pub fn alice() -> String {
        make_address(0xa1)
    }

    pub fn bob() -> String {
        make_address(0xb0)
    }

    pub fn carol() -> String {
        make_address(0xc0)
    }

    pub fn dave() -> String {
        make_address(0xd0)
    }

    pub fn erin() -> String {
        make_address(0xe0)
    }

    pub fn frank() -> String {
        make_address(0xf0)
    }

    fn card_root() -> RawBlock {
        root_block(CARD_CHAIN, CARD_ROOT, &alice())
    }

    fn card_bob() -> RawBlock {
        child_block(&card_root(), CARD_BOB, &bob())
    }

    fn card_dave() -> RawBlock {
        child_block(&card_bob(), CARD_DAVE, &dave())
    }

    fn card_frank() -> RawBlock {
        child_block(&card_dave(), CARD_FRANK, &frank())
    }

    fn petition_a() -> RawBlock {
        root_block(PETITION_CHAIN, PETITION_A, &erin())
    }

    /// Blocks served by the historical feed.
    ///
    /// Includes one record without a chain id, which validation must reject.
    pub fn history() -> Vec<RawBlock> {
        let mut broken = root_block(CARD_CHAIN, "card-broken", &carol());
        broken.chain_id = None;

        vec![
            card_root(),
            card_bob(),
            child_block(&card_root(), CARD_CAROL, &carol()),
            card_dave(),
            petition_a(),
            root_block(PETITION_CHAIN, PETITION_B, &frank()),
            broken,
        ]
    }

    /// Blocks pushed by the live feed after subscription.
    ///
    /// Re-delivers `card-bob` and sends `card-erin` before its parent.
    pub fn live() -> Vec<RawBlock> {
        vec![
            card_bob(),
            child_block(&card_frank(), CARD_ERIN, &erin()),
            card_frank(),
            child_block(&petition_a(), PETITION_ALICE, &alice()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_block_format() {
        let creator = make_address(0x01);
        let root = root_block("chain", "root", &creator);

        assert_eq!(root.parent_block_id, None);
        assert_eq!(root.created_at_epoch_ms, Some(MOCK_EPOCH_MS));
        assert_eq!(
            root.signatures,
            Some(vec![RawSignature::new(creator.clone(), signature_for(&creator, "root"))])
        );
    }

    #[test]
    fn test_child_block_format() {
        let root = root_block("chain", "root", &make_address(0x01));
        let child = child_block(&root, "child", &make_address(0x02));

        assert_eq!(child.chain_id, root.chain_id);
        assert_eq!(child.title, root.title);
        assert_eq!(child.parent_block_id.as_deref(), Some("root"));
        assert_eq!(
            child.created_at_epoch_ms,
            Some(MOCK_EPOCH_MS + CHILD_DELAY_MS)
        );
    }

    #[test]
    fn test_make_address() {
        assert_eq!(
            make_address(0x0a),
            "0x000000000000000000000000000000000000000a"
        );
        assert_eq!(make_address(0x0a).len(), 42);
    }

    #[test]
    fn test_chains_counts() {
        let history = test_chains::history();
        let live = test_chains::live();

        assert_eq!(history.len(), 7);
        assert_eq!(live.len(), 4);

        let roots = history
            .iter()
            .filter(|b| b.parent_block_id.is_none())
            .count();
        // card-root, petition-a, petition-b, and the broken record
        assert_eq!(roots, 4);
    }

    #[test]
    fn test_live_redelivers_history_block() {
        let history = test_chains::history();
        let live = test_chains::live();

        assert!(history.contains(&live[0]));
    }
}
