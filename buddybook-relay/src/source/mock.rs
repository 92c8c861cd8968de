//! Mock feed client for testing the ingestion pipeline.
//!
//! # Example
//!
//! ```ignore
//! use buddybook_relay::source::{mock_blocks, MockClient};
//!
//! let client = MockClient::builder()
//!     .history(mock_blocks::test_chains::history())
//!     .page_size(2)
//!     .fail_history_after(1)
//!     .build();
//!
//! let publisher = client.publisher();
//! publisher.publish(mock_blocks::root_block("late", "late-root", "0x01"));
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::{mpsc, oneshot};

use crate::feed::{
    FeedClient, FeedError, HistoricalFeed, HistoryStream, LiveCallback, LiveEvent, LiveFeed,
    SubscriptionHandle,
};
use crate::wire::RawBlock;

use super::DEFAULT_PAGE_SIZE;

/// What the publisher hands to the live delivery task.
#[derive(Debug)]
enum Delivery {
    Record(RawBlock),
    Payload(Vec<u8>),
    Fatal(String),
}

/// Pushes records into a [`MockClient`]'s live feed.
#[derive(Debug, Clone)]
pub struct MockPublisher {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl MockPublisher {
    /// Publish a decoded record.
    pub fn publish(&self, block: RawBlock) {
        let _ = self.tx.send(Delivery::Record(block));
    }

    /// Publish a protobuf payload. Undecodable payloads are dropped by the feed.
    pub fn publish_bytes(&self, payload: Vec<u8>) {
        let _ = self.tx.send(Delivery::Payload(payload));
    }

    /// Simulate a fatal transport error, which ends the subscription.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Delivery::Fatal(reason.into()));
    }
}

/// In-memory [`FeedClient`] with scripted history and live delivery.
pub struct MockClient {
    peers: usize,
    history: Arc<MockHistory>,
    live: Option<Arc<MockLive>>,
    publisher: MockPublisher,
}

impl MockClient {
    pub fn builder() -> MockClientBuilder {
        MockClientBuilder::default()
    }

    /// Handle for pushing live records after subscription.
    pub fn publisher(&self) -> MockPublisher {
        self.publisher.clone()
    }
}

impl FeedClient for MockClient {
    fn connected_peers(&self) -> usize {
        self.peers
    }

    fn historical(&self) -> Option<Arc<dyn HistoricalFeed>> {
        Some(self.history.clone())
    }

    fn live(&self) -> Option<Arc<dyn LiveFeed>> {
        self.live.clone().map(|live| live as Arc<dyn LiveFeed>)
    }
}

pub struct MockClientBuilder {
    history: Vec<RawBlock>,
    page_size: usize,
    fail_after_pages: Option<usize>,
    live: Vec<RawBlock>,
    subscribe_error: Option<String>,
    live_supported: bool,
    peers: usize,
}

impl Default for MockClientBuilder {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            fail_after_pages: None,
            live: Vec::new(),
            subscribe_error: None,
            live_supported: true,
            peers: 1,
        }
    }
}

impl MockClientBuilder {
    /// Records replayed by the historical feed.
    pub fn history(mut self, blocks: Vec<RawBlock>) -> Self {
        self.history = blocks;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fail the replay with a transport error after `pages` pages.
    pub fn fail_history_after(mut self, pages: usize) -> Self {
        self.fail_after_pages = Some(pages);
        self
    }

    /// Records delivered as soon as the live subscription starts.
    pub fn live(mut self, blocks: Vec<RawBlock>) -> Self {
        self.live = blocks;
        self
    }

    /// Make `subscribe` fail with a transport error.
    pub fn fail_subscribe(mut self, reason: impl Into<String>) -> Self {
        self.subscribe_error = Some(reason.into());
        self
    }

    /// Build a client that does not expose a live feed at all.
    pub fn without_live(mut self) -> Self {
        self.live_supported = false;
        self
    }

    /// Build a client with no connected peers.
    pub fn disconnected(mut self) -> Self {
        self.peers = 0;
        self
    }

    pub fn build(self) -> MockClient {
        let (tx, rx) = mpsc::unbounded_channel();

        let history = Arc::new(MockHistory {
            blocks: self.history,
            page_size: self.page_size,
            fail_after_pages: self.fail_after_pages,
        });

        let live = self.live_supported.then(|| {
            Arc::new(MockLive {
                scripted: self.live,
                subscribe_error: self.subscribe_error,
                rx: Mutex::new(Some(rx)),
            })
        });

        MockClient {
            peers: self.peers,
            history,
            live,
            publisher: MockPublisher { tx },
        }
    }
}

struct MockHistory {
    blocks: Vec<RawBlock>,
    page_size: usize,
    fail_after_pages: Option<usize>,
}

impl HistoricalFeed for MockHistory {
    fn fetch_all(&self) -> HistoryStream {
        let mut pages: Vec<Result<Vec<RawBlock>, FeedError>> = self
            .blocks
            .chunks(self.page_size)
            .map(|page| Ok(page.to_vec()))
            .collect();

        if let Some(limit) = self.fail_after_pages {
            pages.truncate(limit);
            pages.push(Err(FeedError::transport("mock history query failed")));
        }

        Box::pin(stream::iter(pages))
    }
}

struct MockLive {
    scripted: Vec<RawBlock>,
    subscribe_error: Option<String>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>,
}

#[async_trait]
impl LiveFeed for MockLive {
    async fn subscribe(&self, on_event: LiveCallback) -> Result<SubscriptionHandle, FeedError> {
        if let Some(reason) = &self.subscribe_error {
            return Err(FeedError::transport(reason.clone()));
        }

        let mut rx = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| FeedError::transport("mock live feed already subscribed"))?;

        let scripted = self.scripted.clone();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            for block in scripted {
                on_event(LiveEvent::Block(block));
            }

            loop {
                tokio::select! {
                    _ = &mut cancel_rx => {
                        tracing::debug!("Mock live subscription cancelled");
                        break;
                    }
                    delivery = rx.recv() => {
                        match delivery {
                            Some(Delivery::Record(block)) => on_event(LiveEvent::Block(block)),
                            Some(Delivery::Payload(payload)) => match RawBlock::from_proto_bytes(&payload) {
                                Ok(block) => on_event(LiveEvent::Block(block)),
                                Err(error) => {
                                    tracing::warn!(error = %error, "Dropping undecodable live payload");
                                }
                            },
                            Some(Delivery::Fatal(reason)) => {
                                on_event(LiveEvent::Closed(Some(FeedError::Transport(reason))));
                                break;
                            }
                            None => {
                                on_event(LiveEvent::Closed(None));
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(SubscriptionHandle::new(cancel_tx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock_blocks::{self, make_address};
    use futures::StreamExt;
    use std::time::Duration;

    fn blocks(count: usize) -> Vec<RawBlock> {
        (0..count)
            .map(|n| mock_blocks::root_block("chain", &format!("block-{}", n), &make_address(1)))
            .collect()
    }

    fn collector() -> (LiveCallback, mpsc::UnboundedReceiver<LiveEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: LiveCallback = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        (callback, rx)
    }

    #[tokio::test]
    async fn test_history_pages() {
        let client = MockClient::builder().history(blocks(5)).page_size(2).build();

        let pages: Vec<_> = client.history.fetch_all().collect().await;

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].as_ref().unwrap().len(), 2);
        assert_eq!(pages[2].as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_fails_after_pages() {
        let client = MockClient::builder()
            .history(blocks(5))
            .page_size(2)
            .fail_history_after(1)
            .build();

        let pages: Vec<_> = client.history.fetch_all().collect().await;

        assert_eq!(pages.len(), 2);
        assert!(pages[0].is_ok());
        assert!(pages[1].is_err());
    }

    #[tokio::test]
    async fn test_history_replays_from_scratch() {
        let client = MockClient::builder().history(blocks(3)).build();

        let first: Vec<_> = client.history.fetch_all().collect().await;
        let second: Vec<_> = client.history.fetch_all().collect().await;

        assert_eq!(first.len(), second.len());
    }

    #[tokio::test]
    async fn test_live_delivers_scripted_then_published() {
        let client = MockClient::builder().live(blocks(2)).build();
        let publisher = client.publisher();
        let (callback, mut rx) = collector();

        let live = client.live().unwrap();
        let mut handle = live.subscribe(callback).await.unwrap();

        publisher.publish(mock_blocks::root_block("chain", "late", &make_address(2)));
        publisher.publish_bytes(vec![0xff, 0xff, 0xff]);
        publisher.publish_bytes(
            mock_blocks::root_block("chain", "encoded", &make_address(3)).to_proto_bytes(),
        );

        let mut ids = Vec::new();
        for _ in 0..4 {
            match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
                Ok(Some(LiveEvent::Block(block))) => ids.push(block.block_id.unwrap()),
                other => panic!("unexpected live event: {:?}", other),
            }
        }

        assert_eq!(ids, vec!["block-0", "block-1", "late", "encoded"]);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_live_fatal_error_closes() {
        let client = MockClient::builder().build();
        let publisher = client.publisher();
        let (callback, mut rx) = collector();

        let handle = client.live().unwrap().subscribe(callback).await.unwrap();
        publisher.fail("connection reset");

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert!(matches!(event, Some(LiveEvent::Closed(Some(FeedError::Transport(_))))));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_subscribe_error() {
        let client = MockClient::builder().fail_subscribe("filter refused").build();
        let (callback, _rx) = collector();

        let result = client.live().unwrap().subscribe(callback).await;
        assert!(matches!(result, Err(FeedError::Transport(_))));
    }

    #[tokio::test]
    async fn test_second_subscription_rejected() {
        let client = MockClient::builder().build();
        let live = client.live().unwrap();

        let (first, _rx1) = collector();
        let (second, _rx2) = collector();

        let handle = live.subscribe(first).await.unwrap();
        assert!(live.subscribe(second).await.is_err());
        handle.shutdown().await;
    }
}
