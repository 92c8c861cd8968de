//! BuddyBook Ledger - block-graph synchronization and chain-of-custody engine
//!
//! Rebuilds signed, branching chains of blocks from the unordered feeds
//! delivered by `buddybook-relay` and answers structural queries over them:
//! - Has this address signed anywhere in a block's lineage?
//! - How many signatures does a block's subtree carry?
//!
//! Ingestion tolerates out-of-order, duplicate and malformed records, as well
//! as cyclic parent references.

pub mod aggregate;
pub mod block;
pub mod config;
pub mod coordinator;
pub mod custody;
pub mod errors;
pub mod index;
pub mod ledger;
pub mod store;
pub mod telemetry;

pub use aggregate::RankedBlock;
pub use block::{Address, Block, BlockId, ChainId, Signature};
pub use config::{LedgerConfig, TelemetryMode};
pub use coordinator::{
    Coordinator, CoordinatorHandle, CoordinatorState, CoordinatorStatus, FeedStatus, IngestStats,
};
pub use errors::{ConfigError, CoordinatorError, ValidationError};
pub use index::{GraphIndex, TreeNode};
pub use ledger::{Ledger, LedgerReader};
pub use store::{BlockStore, UpsertOutcome};
pub use telemetry::{
    NoopTelemetry, Protocol, RecordingTelemetry, Telemetry, TelemetryEvent, TelemetryKind,
    TracingTelemetry,
};
