//! Wire types for blocks as they arrive from the messaging network.
//!
//! The transport hands over either a protobuf-encoded [`BlockMessage`] or a JSON
//! document (share links, replay files). Both are decoded into a [`RawBlock`],
//! whose fields are all optional: a missing field is something the ledger's
//! validation step reports, not a decoding failure.
//!
//! proto3 cannot tell an empty string from an absent one. Identifier fields
//! decode empty as absent; `title`, `description` and `timestamp` keep their
//! default values, which are legitimate content.
//!
//! ## Protobuf layout
//!
//! | tag | field             | type                       |
//! |-----|-------------------|----------------------------|
//! | 1   | `timestamp`       | uint64 (epoch ms)          |
//! | 2   | `signed_message`  | string                     |
//! | 3   | `title`           | string                     |
//! | 4   | `description`     | string                     |
//! | 5   | `chain_id`        | string                     |
//! | 6   | `block_id`        | string                     |
//! | 7   | `signatures`      | repeated `SignatureMessage`|
//! | 8   | `parent_block_id` | string                     |

use prost::Message;
use serde::{Deserialize, Serialize};

/// A single `{address, signature}` entry as delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl RawSignature {
    pub fn new(address: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            signature: Some(signature.into()),
        }
    }
}

/// Unvalidated block record, consumed verbatim by the ledger.
///
/// JSON field names are camelCase. The names used by the first BuddyBook
/// clients (`chainUUID`, `blockUUID`, `signedMessage`, `timestamp`,
/// `parentBlockUUID`) are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    #[serde(default, alias = "chainUUID", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, alias = "blockUUID", skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "signedMessage", skip_serializing_if = "Option::is_none")]
    pub signed_payload: Option<String>,
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at_epoch_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<RawSignature>>,
    #[serde(default, alias = "parentBlockUUID")]
    pub parent_block_id: Option<String>,
}

impl RawBlock {
    /// Decode a JSON document into a raw block.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Decode a protobuf payload into a raw block.
    pub fn from_proto_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Ok(BlockMessage::decode(bytes)?.into())
    }

    /// Encode this block as the transport's protobuf payload.
    ///
    /// Absent fields are written as proto3 defaults. Absent ids decode back as
    /// absent; absent title, description and timestamp decode as defaults.
    pub fn to_proto_bytes(&self) -> Vec<u8> {
        BlockMessage::from(self).encode_to_vec()
    }

    /// The block id, or `"<unknown>"` when absent. Used for log fields.
    pub fn display_id(&self) -> &str {
        self.block_id.as_deref().unwrap_or("<unknown>")
    }
}

/// Protobuf form of a signature entry.
#[derive(Clone, PartialEq, Message)]
pub struct SignatureMessage {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(string, tag = "2")]
    pub signature: String,
}

/// Protobuf form of a block, as published on the content topic.
#[derive(Clone, PartialEq, Message)]
pub struct BlockMessage {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(string, tag = "2")]
    pub signed_message: String,
    #[prost(string, tag = "3")]
    pub title: String,
    #[prost(string, tag = "4")]
    pub description: String,
    #[prost(string, tag = "5")]
    pub chain_id: String,
    #[prost(string, tag = "6")]
    pub block_id: String,
    #[prost(message, repeated, tag = "7")]
    pub signatures: Vec<SignatureMessage>,
    #[prost(string, tag = "8")]
    pub parent_block_id: String,
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl From<BlockMessage> for RawBlock {
    fn from(message: BlockMessage) -> Self {
        let signatures = message
            .signatures
            .into_iter()
            .map(|entry| RawSignature {
                address: non_empty(entry.address),
                signature: non_empty(entry.signature),
            })
            .collect();

        Self {
            chain_id: non_empty(message.chain_id),
            block_id: non_empty(message.block_id),
            title: Some(message.title),
            description: Some(message.description),
            signed_payload: non_empty(message.signed_message),
            created_at_epoch_ms: Some(message.timestamp),
            signatures: Some(signatures),
            parent_block_id: non_empty(message.parent_block_id),
        }
    }
}

impl From<&RawBlock> for BlockMessage {
    fn from(block: &RawBlock) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        Self {
            timestamp: block.created_at_epoch_ms.unwrap_or_default(),
            signed_message: text(&block.signed_payload),
            title: text(&block.title),
            description: text(&block.description),
            chain_id: text(&block.chain_id),
            block_id: text(&block.block_id),
            signatures: block
                .signatures
                .iter()
                .flatten()
                .map(|entry| SignatureMessage {
                    address: text(&entry.address),
                    signature: text(&entry.signature),
                })
                .collect(),
            parent_block_id: text(&block.parent_block_id),
        }
    }
}
