//! Fire-and-forget diagnostic events.
//!
//! The coordinator pushes an event whenever a feed finishes, fails, or a
//! record is rejected. Delivery is best effort: implementations must not
//! block and the coordinator never waits on them.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Which feed an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Historical replay.
    Store,
    /// Live push.
    Filter,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Filter => "filter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryKind {
    HistoryDrained {
        pages: u64,
        records: u64,
        elapsed_ms: u64,
    },
    HistoryFailed {
        pages: u64,
        error: String,
    },
    LiveSubscribed,
    LiveFailed {
        error: String,
    },
    RecordRejected {
        block_id: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub protocol: Protocol,
    #[serde(flatten)]
    pub kind: TelemetryKind,
}

impl TelemetryEvent {
    pub fn new(protocol: Protocol, kind: TelemetryKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            protocol,
            kind,
        }
    }
}

/// Sink for diagnostic events.
pub trait Telemetry: Send + Sync {
    fn push(&self, events: Vec<TelemetryEvent>);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn push(&self, _events: Vec<TelemetryEvent>) {}
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn push(&self, events: Vec<TelemetryEvent>) {
        for event in events {
            match serde_json::to_string(&event.kind) {
                Ok(payload) => tracing::info!(
                    telemetry_id = %event.id,
                    protocol = event.protocol.as_str(),
                    payload = %payload,
                    "Telemetry event"
                ),
                Err(error) => tracing::warn!(error = %error, "Failed to encode telemetry event"),
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events pushed so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Telemetry for RecordingTelemetry {
    fn push(&self, events: Vec<TelemetryEvent>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(events);
    }
}
