//! Ingestion coordinator.
//!
//! Owns the only write path into the [`Ledger`]. On start it:
//! - builds the [`FeedAdapter`] from the injected client (or enters `Failed`)
//! - subscribes to the live feed, queueing arrivals in a single mpsc channel
//! - drains the historical feed page by page
//! - applies the queued and future live arrivals, in order, until shutdown
//!
//! Every record is validated, stored and indexed under one write lock, so a
//! reader never observes half of an apply.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use buddybook_relay::{
    FeedAdapter, FeedClient, LiveCallback, LiveEvent, RawBlock, SubscriptionHandle,
};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::CoordinatorError;
use crate::ledger::{Ledger, LedgerReader};
use crate::telemetry::{Protocol, Telemetry, TelemetryEvent, TelemetryKind};

/// Lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoordinatorState {
    Idle,
    DrainingHistory,
    Live,
    /// No feed adapter could be built. Nothing was ingested.
    Failed,
}

/// Per-feed indicator surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedStatus {
    InProgress,
    Success,
    Error,
}

/// Ingestion counters since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Records received from the historical feed.
    pub historical: u64,
    /// Records received from the live feed.
    pub live: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub rejected: u64,
}

impl IngestStats {
    pub fn received(&self) -> u64 {
        self.historical + self.live
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub history: FeedStatus,
    pub live: FeedStatus,
    pub stats: IngestStats,
}

impl Default for CoordinatorStatus {
    fn default() -> Self {
        Self {
            state: CoordinatorState::Idle,
            history: FeedStatus::InProgress,
            live: FeedStatus::InProgress,
            stats: IngestStats::default(),
        }
    }
}

impl CoordinatorStatus {
    /// Whether either feed failed, leaving data possibly incomplete.
    pub fn is_degraded(&self) -> bool {
        self.history == FeedStatus::Error || self.live == FeedStatus::Error
    }
}

pub struct Coordinator {
    client: Arc<dyn FeedClient>,
    telemetry: Arc<dyn Telemetry>,
    ledger: Arc<RwLock<Ledger>>,
    status: watch::Sender<CoordinatorStatus>,
}

impl Coordinator {
    pub fn new(client: Arc<dyn FeedClient>, telemetry: Arc<dyn Telemetry>) -> Self {
        let (status, _) = watch::channel(CoordinatorStatus::default());

        Self {
            client,
            telemetry,
            ledger: Arc::new(RwLock::new(Ledger::new())),
            status,
        }
    }

    /// Read handle over the ledger this coordinator fills.
    pub fn reader(&self) -> LedgerReader {
        LedgerReader::new(self.ledger.clone())
    }

    /// Status updates. The last value stays readable after the coordinator
    /// is gone, including the `Failed` state.
    pub fn status(&self) -> watch::Receiver<CoordinatorStatus> {
        self.status.subscribe()
    }

    /// Connect the feeds and spawn the ingestion task.
    ///
    /// Must be called from within a Tokio runtime. Fails only when the feed
    /// adapter cannot be built; feed errors after that are reported through
    /// the status channel.
    pub fn start(self) -> Result<CoordinatorHandle, CoordinatorError> {
        let adapter = match FeedAdapter::connect(self.client.clone()) {
            Ok(adapter) => adapter,
            Err(e) => {
                error!(error = %e, "Feed adapter unavailable");
                self.status.send_modify(|status| {
                    status.state = CoordinatorState::Failed;
                    status.history = FeedStatus::Error;
                    status.live = FeedStatus::Error;
                });
                return Err(CoordinatorError::AdapterUnavailable(e));
            }
        };

        let reader = self.reader();
        let status = self.status.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = Worker {
            adapter,
            ledger: self.ledger,
            telemetry: self.telemetry,
            status: self.status,
            stats: IngestStats::default(),
        };
        let task = tokio::spawn(worker.run(shutdown_rx));

        Ok(CoordinatorHandle {
            shutdown: Some(shutdown_tx),
            task,
            reader,
            status,
        })
    }
}

/// Handle to a running coordinator.
///
/// Dropping the handle stops ingestion.
pub struct CoordinatorHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<IngestStats>,
    reader: LedgerReader,
    status: watch::Receiver<CoordinatorStatus>,
}

impl CoordinatorHandle {
    pub fn reader(&self) -> LedgerReader {
        self.reader.clone()
    }

    /// Latest published status.
    pub fn status(&self) -> CoordinatorStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<CoordinatorStatus> {
        self.status.clone()
    }

    /// Wait until the status satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&CoordinatorStatus) -> bool,
    ) -> Result<CoordinatorStatus, CoordinatorError> {
        let mut status = self.status.clone();
        let matched = status
            .wait_for(predicate)
            .await
            .map_err(|_| CoordinatorError::channel("coordinator stopped"))?;
        Ok((*matched).clone())
    }

    /// Wait until the historical drain has ended.
    pub async fn wait_until_live(&self) -> Result<CoordinatorStatus, CoordinatorError> {
        self.wait_for(|status| status.state == CoordinatorState::Live)
            .await
    }

    /// Cancel the live subscription and wait for the coordinator to stop.
    ///
    /// A historical drain in progress runs to completion first.
    pub async fn shutdown(mut self) -> Result<IngestStats, CoordinatorError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        self.task
            .await
            .map_err(|e| CoordinatorError::channel(e.to_string()))
    }
}

struct Worker {
    adapter: FeedAdapter,
    ledger: Arc<RwLock<Ledger>>,
    telemetry: Arc<dyn Telemetry>,
    status: watch::Sender<CoordinatorStatus>,
    stats: IngestStats,
}

impl Worker {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> IngestStats {
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();

        self.set_state(CoordinatorState::DrainingHistory);
        let mut subscription = self.subscribe_live(live_tx).await;
        self.drain_history().await;

        let buffered = live_rx.len();
        self.set_state(CoordinatorState::Live);
        info!(buffered, "Applying live arrivals");

        let mut live_open = subscription.is_some();
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
                event = live_rx.recv(), if live_open => {
                    match event {
                        Some(LiveEvent::Block(raw)) => {
                            self.apply(raw, Protocol::Filter);
                            self.publish_stats();
                        }
                        Some(LiveEvent::Closed(None)) | None => {
                            info!("Live feed closed");
                            live_open = false;
                        }
                        Some(LiveEvent::Closed(Some(e))) => {
                            warn!(error = %e, "Live feed failed");
                            self.status.send_modify(|status| status.live = FeedStatus::Error);
                            self.push(Protocol::Filter, TelemetryKind::LiveFailed { error: e.to_string() });
                            live_open = false;
                        }
                    }
                }
            }
        }

        if let Some(subscription) = subscription.take() {
            subscription.shutdown().await;
        }

        info!(
            historical = self.stats.historical,
            live = self.stats.live,
            inserted = self.stats.inserted,
            duplicates = self.stats.duplicates,
            rejected = self.stats.rejected,
            "Coordinator shutdown complete"
        );
        self.stats
    }

    async fn subscribe_live(
        &mut self,
        queue: mpsc::UnboundedSender<LiveEvent>,
    ) -> Option<SubscriptionHandle> {
        let on_event: LiveCallback = Arc::new(move |event| {
            let _ = queue.send(event);
        });

        match self.adapter.live().subscribe(on_event).await {
            Ok(handle) => {
                info!("Live subscription established");
                self.status.send_modify(|status| status.live = FeedStatus::Success);
                self.push(Protocol::Filter, TelemetryKind::LiveSubscribed);
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Live subscription failed, continuing with history only");
                self.status.send_modify(|status| status.live = FeedStatus::Error);
                self.push(Protocol::Filter, TelemetryKind::LiveFailed { error: e.to_string() });
                None
            }
        }
    }

    async fn drain_history(&mut self) {
        let started = Instant::now();
        let mut pages: u64 = 0;
        let mut records: u64 = 0;

        let mut stream = self.adapter.historical().fetch_all();
        while let Some(page) = stream.next().await {
            match page {
                Ok(blocks) => {
                    pages += 1;
                    records += blocks.len() as u64;
                    debug!(page = pages, records = blocks.len(), "Applying history page");

                    for raw in blocks {
                        self.apply(raw, Protocol::Store);
                    }
                    self.publish_stats();
                }
                Err(e) => {
                    warn!(error = %e, pages, records, "History replay failed, keeping partial history");
                    self.status.send_modify(|status| status.history = FeedStatus::Error);
                    self.push(
                        Protocol::Store,
                        TelemetryKind::HistoryFailed {
                            pages,
                            error: e.to_string(),
                        },
                    );
                    return;
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(pages, records, elapsed_ms, "History drained");
        self.status.send_modify(|status| status.history = FeedStatus::Success);
        self.push(
            Protocol::Store,
            TelemetryKind::HistoryDrained {
                pages,
                records,
                elapsed_ms,
            },
        );
    }

    /// The single apply path for both feeds.
    fn apply(&mut self, raw: RawBlock, protocol: Protocol) {
        match protocol {
            Protocol::Store => self.stats.historical += 1,
            Protocol::Filter => self.stats.live += 1,
        }

        let block_id = raw.display_id().to_string();
        let result = self
            .ledger
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(raw);

        match result {
            Ok(outcome) if outcome.inserted => {
                self.stats.inserted += 1;
                debug!(block_id = %block_id, protocol = protocol.as_str(), "Block applied");
            }
            Ok(_) => {
                self.stats.duplicates += 1;
                debug!(block_id = %block_id, protocol = protocol.as_str(), "Duplicate block ignored");
            }
            Err(e) => {
                self.stats.rejected += 1;
                warn!(
                    block_id = %block_id,
                    protocol = protocol.as_str(),
                    error = %e,
                    "Rejected block"
                );
                self.push(
                    protocol,
                    TelemetryKind::RecordRejected {
                        block_id,
                        reason: e.kind().to_string(),
                    },
                );
            }
        }
    }

    fn set_state(&self, state: CoordinatorState) {
        info!(state = ?state, "Coordinator state changed");
        self.status.send_modify(|status| status.state = state);
    }

    fn publish_stats(&self) {
        let stats = self.stats;
        self.status.send_modify(|status| status.stats = stats);
    }

    fn push(&self, protocol: Protocol, kind: TelemetryKind) {
        self.telemetry.push(vec![TelemetryEvent::new(protocol, kind)]);
    }
}
