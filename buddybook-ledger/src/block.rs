//! Validated block model.
//!
//! A [`Block`] is built from a transport [`RawBlock`] through `TryFrom`, which
//! is the only place wire payloads are checked. Once built, a block is never
//! mutated.

use buddybook_relay::{RawBlock, RawSignature};
use serde::Serialize;

use crate::errors::ValidationError;

/// Globally unique block identifier.
pub type BlockId = String;

/// Chain identifier shared by every block of one document.
pub type ChainId = String;

/// Signer address as published by the wallet.
pub type Address = String;

/// One signer of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub address: Address,
    pub signature: String,
}

/// A validated, immutable block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub chain_id: ChainId,
    pub block_id: BlockId,
    pub title: String,
    pub description: String,
    pub signed_payload: String,
    /// Creation instant in epoch milliseconds.
    pub created_at: u64,
    /// Ordered signer list. Zero, one or many entries are all valid.
    pub signatures: Vec<Signature>,
    /// `None` marks a root. The parent may not be known locally.
    pub parent_block_id: Option<BlockId>,
}

impl Block {
    pub fn is_root(&self) -> bool {
        self.parent_block_id.is_none()
    }

    pub fn signature_count(&self) -> u64 {
        self.signatures.len() as u64
    }

    /// Whether `address` is among this block's own signers.
    ///
    /// Addresses compare ASCII case-insensitively, so checksummed and
    /// lowercase hex forms match.
    pub fn is_signed_by(&self, address: &str) -> bool {
        self.signatures
            .iter()
            .any(|entry| entry.address.eq_ignore_ascii_case(address))
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn signature(index: usize, raw: RawSignature) -> Result<Signature, ValidationError> {
    let address = raw
        .address
        .filter(|address| !address.trim().is_empty())
        .ok_or(ValidationError::InvalidSignature {
            index,
            reason: "missing address",
        })?;
    let signature = raw
        .signature
        .filter(|signature| !signature.trim().is_empty())
        .ok_or(ValidationError::InvalidSignature {
            index,
            reason: "missing signature",
        })?;

    Ok(Signature { address, signature })
}

impl TryFrom<RawBlock> for Block {
    type Error = ValidationError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let chain_id = required(raw.chain_id, "chainId")?;
        let block_id = required(raw.block_id, "blockId")?;
        let title = raw.title.ok_or(ValidationError::MissingField("title"))?;
        let description = raw
            .description
            .ok_or(ValidationError::MissingField("description"))?;
        let signed_payload = required(raw.signed_payload, "signedPayload")?;
        let created_at = raw
            .created_at_epoch_ms
            .ok_or(ValidationError::MissingField("createdAtEpochMs"))?;

        let signatures = raw
            .signatures
            .ok_or(ValidationError::MissingField("signatures"))?
            .into_iter()
            .enumerate()
            .map(|(index, entry)| signature(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        // An empty parent id is how some clients spell "root". A block may
        // name itself as parent; traversals treat that as a cycle.
        let parent_block_id = raw.parent_block_id.filter(|parent| !parent.is_empty());

        Ok(Self {
            chain_id,
            block_id,
            title,
            description,
            signed_payload,
            created_at,
            signatures,
            parent_block_id,
        })
    }
}
