//! Feed sources and mock block builders.
//!
//! Builders create `RawBlock` records in the shape the network delivers them:
//!
//! - `root_block` → first block of a new chain, signed by its creator
//! - `child_block` → a co-signer's block referencing its parent
//!
//! # Example
//!
//! ```ignore
//! use buddybook_relay::source::{mock_blocks, FeedSource, MockClient};
//!
//! let root = mock_blocks::root_block("chain-1", "root", "0xcreator");
//! let child = mock_blocks::child_block(&root, "child", "0xfriend");
//!
//! let client = MockClient::builder()
//!     .history(vec![root])
//!     .live(vec![child])
//!     .build();
//!
//! // Or use the full test chains
//! let client = FeedSource::mock().into_client().await?;
//! ```

mod jsonl;
mod mock;
pub mod mock_blocks;

pub use jsonl::JsonLinesClient;
pub use mock::{MockClient, MockClientBuilder, MockPublisher};

use std::path::PathBuf;
use std::sync::Arc;

use crate::feed::{FeedClient, FeedError};

/// Default number of records per historical page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Configuration for the feed source.
///
/// Use this to explicitly choose between mock and file-backed feeds.
#[derive(Debug, Clone)]
pub enum FeedSource {
    /// Use the deterministic test chains.
    ///
    /// History holds two chains (one with concurrent roots); the live feed
    /// re-delivers one historical block and adds children that arrive
    /// before their parents.
    Mock,

    /// Replay a JSON-lines file as history and read live records from stdin.
    JsonLines {
        /// File with one JSON block per line
        history_path: PathBuf,
        /// Records per historical page
        page_size: usize,
    },
}

impl FeedSource {
    /// Create a mock source backed by the test chains.
    pub fn mock() -> Self {
        Self::Mock
    }

    /// Create the client for this source.
    pub async fn into_client(self) -> Result<Arc<dyn FeedClient>, FeedError> {
        match self {
            Self::Mock => {
                let client = MockClient::builder()
                    .history(mock_blocks::test_chains::history())
                    .live(mock_blocks::test_chains::live())
                    .build();
                Ok(Arc::new(client))
            }
            Self::JsonLines {
                history_path,
                page_size,
            } => {
                let client = JsonLinesClient::open(history_path, page_size).await;
                Ok(Arc::new(client))
            }
        }
    }
}
