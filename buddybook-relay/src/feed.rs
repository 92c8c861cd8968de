//! Feed traits and the adapter that pairs them.
//!
//! A [`FeedClient`] is the ambient connection object of the surrounding
//! application (peer set, protocol handles). It is passed explicitly to
//! [`FeedAdapter::connect`], which fails when no feed can be provided.
//!
//! # Example
//!
//! ```ignore
//! use buddybook_relay::{FeedAdapter, FeedSource, LiveEvent};
//!
//! let client = FeedSource::mock().into_client().await?;
//! let adapter = FeedAdapter::connect(client)?;
//!
//! let mut pages = adapter.historical().fetch_all();
//! while let Some(page) = pages.next().await {
//!     for raw in page? {
//!         // apply...
//!     }
//! }
//!
//! let handle = adapter
//!     .live()
//!     .subscribe(Arc::new(|event: LiveEvent| println!("{:?}", event)))
//!     .await?;
//! handle.cancel();
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::wire::RawBlock;

/// Errors raised at the transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Feed unavailable: {0}")]
    Unavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// Lazy stream of historical pages.
///
/// An `Err` item ends the replay. Pages yielded before it remain valid.
pub type HistoryStream = BoxStream<'static, Result<Vec<RawBlock>, FeedError>>;

/// Events delivered by a live subscription.
#[derive(Debug)]
pub enum LiveEvent {
    /// A newly published record.
    Block(RawBlock),
    /// The subscription ended. `Some` carries the fatal transport error.
    Closed(Option<FeedError>),
}

/// Callback invoked once per live event.
pub type LiveCallback = Arc<dyn Fn(LiveEvent) + Send + Sync>;

/// Bounded replay of everything the network has stored.
pub trait HistoricalFeed: Send + Sync {
    /// Start a replay from scratch. May be called again after a reconnect.
    fn fetch_all(&self) -> HistoryStream;
}

/// Unbounded push of newly published records.
#[async_trait]
pub trait LiveFeed: Send + Sync {
    /// Register `on_event` and start delivering.
    ///
    /// Returns an error only when the subscription cannot be established.
    /// Malformed records never surface here.
    async fn subscribe(&self, on_event: LiveCallback) -> Result<SubscriptionHandle, FeedError>;
}

/// Connection object shared with the rest of the application.
pub trait FeedClient: Send + Sync {
    /// Number of peers the client is currently connected to.
    fn connected_peers(&self) -> usize;

    /// Historical (store) protocol handle.
    fn historical(&self) -> Option<Arc<dyn HistoricalFeed>>;

    /// Live (filter) protocol handle.
    fn live(&self) -> Option<Arc<dyn LiveFeed>>;
}

/// Handle to a running live subscription.
///
/// Dropping the handle drops the cancellation signal, which stops delivery
/// just like [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct SubscriptionHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Wrap a delivery task together with its cancellation signal.
    pub fn new(cancel: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            cancel: Some(cancel),
            task: Some(task),
        }
    }

    /// Stop delivery. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Cancel and wait for the delivery task to exit.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Pairs the historical and live feeds of one connected client.
#[derive(Clone)]
pub struct FeedAdapter {
    historical: Arc<dyn HistoricalFeed>,
    live: Arc<dyn LiveFeed>,
}

impl FeedAdapter {
    /// Build the adapter from an injected client.
    ///
    /// Fails with [`FeedError::Unavailable`] when the client has no peers or
    /// does not expose both protocols.
    pub fn connect(client: Arc<dyn FeedClient>) -> Result<Self, FeedError> {
        let peers = client.connected_peers();
        if peers == 0 {
            return Err(FeedError::unavailable("no connected peers"));
        }

        let historical = client
            .historical()
            .ok_or_else(|| FeedError::unavailable("historical feed not supported by client"))?;
        let live = client
            .live()
            .ok_or_else(|| FeedError::unavailable("live feed not supported by client"))?;

        tracing::debug!(peers, "Feed adapter connected");

        Ok(Self { historical, live })
    }

    pub fn historical(&self) -> &Arc<dyn HistoricalFeed> {
        &self.historical
    }

    pub fn live(&self) -> &Arc<dyn LiveFeed> {
        &self.live
    }
}

impl std::fmt::Debug for FeedAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedAdapter").finish_non_exhaustive()
    }
}
