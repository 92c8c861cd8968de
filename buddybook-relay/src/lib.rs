//! BuddyBook Relay
//!
//! Shared library for connecting to the messaging network that carries blocks.
//!
//! Provides:
//! - Wire types (`RawBlock`) and decoding from the transport's protobuf or JSON payloads
//! - Feed traits for bounded historical replay and unbounded live push
//! - The `FeedAdapter` that pairs both feeds behind an injected connection client
//! - Feed sources (mock topology, JSON-lines replay) selected via `FeedSource`

pub mod feed;
pub mod source;
pub mod wire;

pub use feed::{
    FeedAdapter, FeedClient, FeedError, HistoricalFeed, HistoryStream, LiveCallback, LiveEvent,
    LiveFeed, SubscriptionHandle,
};
pub use source::FeedSource;
pub use wire::{BlockMessage, RawBlock, RawSignature, SignatureMessage};
