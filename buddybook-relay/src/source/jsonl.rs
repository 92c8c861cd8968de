//! JSON-lines feed client.
//!
//! History is replayed from a file holding one JSON block per line, read in
//! pages. Live records are read line by line from stdin, on a thread of
//! their own, until EOF or cancellation. Lines that are not JSON objects are
//! logged and skipped.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use async_stream::stream;
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use crate::feed::{
    FeedClient, FeedError, HistoricalFeed, HistoryStream, LiveCallback, LiveEvent, LiveFeed,
    SubscriptionHandle,
};
use crate::wire::RawBlock;

/// [`FeedClient`] backed by a replay file and stdin.
#[derive(Debug)]
pub struct JsonLinesClient {
    history: Arc<JsonLinesHistory>,
    available: bool,
}

impl JsonLinesClient {
    /// Open a client for `history_path`.
    ///
    /// A missing replay file leaves the client without peers, so adapter
    /// construction fails.
    pub async fn open(history_path: impl Into<PathBuf>, page_size: usize) -> Self {
        let history_path = history_path.into();
        let available = tokio::fs::metadata(&history_path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);

        if !available {
            tracing::warn!(path = %history_path.display(), "History file not found");
        }

        Self {
            history: Arc::new(JsonLinesHistory {
                path: history_path,
                page_size: page_size.max(1),
            }),
            available,
        }
    }
}

impl FeedClient for JsonLinesClient {
    fn connected_peers(&self) -> usize {
        usize::from(self.available)
    }

    fn historical(&self) -> Option<Arc<dyn HistoricalFeed>> {
        Some(self.history.clone())
    }

    fn live(&self) -> Option<Arc<dyn LiveFeed>> {
        Some(Arc::new(StdinLive))
    }
}

/// Parse one line, skipping blanks and logging malformed input.
fn parse_line(line: &str, line_number: usize) -> Option<RawBlock> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match RawBlock::from_json(trimmed) {
        Ok(block) => Some(block),
        Err(error) => {
            tracing::warn!(line = line_number, error = %error, "Skipping malformed JSON line");
            None
        }
    }
}

#[derive(Debug)]
struct JsonLinesHistory {
    path: PathBuf,
    page_size: usize,
}

impl HistoricalFeed for JsonLinesHistory {
    fn fetch_all(&self) -> HistoryStream {
        let path = self.path.clone();
        let page_size = self.page_size;

        Box::pin(stream! {
            let file = match File::open(&path).await {
                Ok(file) => file,
                Err(error) => {
                    yield Err(FeedError::Io(error));
                    return;
                }
            };

            let mut lines = BufReader::new(file).lines();
            let mut page = Vec::with_capacity(page_size);
            let mut line_number = 0;

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        line_number += 1;
                        if let Some(block) = parse_line(&line, line_number) {
                            page.push(block);
                        }
                        if page.len() == page_size {
                            yield Ok(std::mem::replace(&mut page, Vec::with_capacity(page_size)));
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        if !page.is_empty() {
                            yield Ok(std::mem::take(&mut page));
                        }
                        yield Err(FeedError::Io(error));
                        return;
                    }
                }
            }

            if !page.is_empty() {
                yield Ok(page);
            }
        })
    }
}

struct StdinLive;

#[async_trait]
impl LiveFeed for StdinLive {
    async fn subscribe(&self, on_event: LiveCallback) -> Result<SubscriptionHandle, FeedError> {
        follow_lines(|| std::io::stdin().lock(), on_event)
    }
}

/// Deliver each line produced by `open` as a live record.
///
/// Lines are read on a dedicated OS thread, since a blocking read cannot be
/// interrupted. Cancelling stops delivery at once and leaves the reader
/// thread detached until its next read returns.
fn follow_lines<R, F>(open: F, on_event: LiveCallback) -> Result<SubscriptionHandle, FeedError>
where
    R: BufRead,
    F: FnOnce() -> R + Send + 'static,
{
    let (line_tx, mut line_rx) = mpsc::unbounded_channel();

    thread::Builder::new()
        .name("buddybook-live-lines".to_string())
        .spawn(move || {
            for line in BufRead::lines(open()) {
                let failed = line.is_err();
                if line_tx.send(line).is_err() || failed {
                    break;
                }
            }
        })?;

    let (cancel_tx, mut cancel_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut line_number = 0;

        loop {
            tokio::select! {
                _ = &mut cancel_rx => break,
                next = line_rx.recv() => {
                    match next {
                        Some(Ok(line)) => {
                            line_number += 1;
                            if let Some(block) = parse_line(&line, line_number) {
                                on_event(LiveEvent::Block(block));
                            }
                        }
                        Some(Err(error)) => {
                            on_event(LiveEvent::Closed(Some(FeedError::Io(error))));
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
