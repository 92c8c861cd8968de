//! Configuration read from the environment.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use buddybook_relay::source::DEFAULT_PAGE_SIZE;
use buddybook_relay::FeedSource;
use tracing::info;

use crate::errors::ConfigError;
use crate::telemetry::{NoopTelemetry, RecordingTelemetry, Telemetry, TracingTelemetry};

/// Default feed source.
const DEFAULT_FEED_SOURCE: &str = "mock";

/// Default replay file for the `jsonl` source.
const DEFAULT_HISTORY_PATH: &str = "history.jsonl";

/// Default telemetry mode.
const DEFAULT_TELEMETRY: &str = "log";

/// Where telemetry events go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryMode {
    Off,
    Log,
    /// Keep events in memory and report the count on shutdown.
    Memory,
}

impl TelemetryMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "log" => Ok(Self::Log),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::invalid(
                "BUDDYBOOK_TELEMETRY",
                value,
                "expected off, log or memory",
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub feed_source: FeedSource,
    pub telemetry: TelemetryMode,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BUDDYBOOK_FEED_SOURCE`: `mock` or `jsonl` (default: mock)
    /// - `BUDDYBOOK_HISTORY_PATH`: replay file for `jsonl` (default: history.jsonl)
    /// - `BUDDYBOOK_HISTORY_PAGE_SIZE`: records per history page (default: 20)
    /// - `BUDDYBOOK_TELEMETRY`: `off`, `log` or `memory` (default: log)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let source =
            lookup("BUDDYBOOK_FEED_SOURCE").unwrap_or_else(|| DEFAULT_FEED_SOURCE.to_string());
        let telemetry =
            lookup("BUDDYBOOK_TELEMETRY").unwrap_or_else(|| DEFAULT_TELEMETRY.to_string());

        let feed_source = match source.to_lowercase().as_str() {
            "mock" => FeedSource::mock(),
            "jsonl" | "json-lines" => {
                let history_path = lookup("BUDDYBOOK_HISTORY_PATH")
                    .unwrap_or_else(|| DEFAULT_HISTORY_PATH.to_string());
                let page_size = match lookup("BUDDYBOOK_HISTORY_PAGE_SIZE") {
                    Some(value) => parse_page_size(&value)?,
                    None => DEFAULT_PAGE_SIZE,
                };

                FeedSource::JsonLines {
                    history_path: PathBuf::from(history_path),
                    page_size,
                }
            }
            _ => {
                return Err(ConfigError::invalid(
                    "BUDDYBOOK_FEED_SOURCE",
                    source,
                    "expected mock or jsonl",
                ))
            }
        };

        let config = Self {
            feed_source,
            telemetry: TelemetryMode::parse(&telemetry)?,
        };

        info!(
            feed_source = ?config.feed_source,
            telemetry = ?config.telemetry,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Build the telemetry sink. The recording sink is also returned so the
    /// caller can inspect it.
    pub fn telemetry(&self) -> (Arc<dyn Telemetry>, Option<Arc<RecordingTelemetry>>) {
        match self.telemetry {
            TelemetryMode::Off => (Arc::new(NoopTelemetry), None),
            TelemetryMode::Log => (Arc::new(TracingTelemetry), None),
            TelemetryMode::Memory => {
                let recording = Arc::new(RecordingTelemetry::new());
                (recording.clone(), Some(recording))
            }
        }
    }
}

fn parse_page_size(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::invalid(
            "BUDDYBOOK_HISTORY_PAGE_SIZE",
            value,
            "must be at least 1",
        )),
        Ok(size) => Ok(size),
        Err(e) => Err(ConfigError::invalid(
            "BUDDYBOOK_HISTORY_PAGE_SIZE",
            value,
            e.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<LedgerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LedgerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert!(matches!(config.feed_source, FeedSource::Mock));
        assert_eq!(config.telemetry, TelemetryMode::Log);
    }

    #[test]
    fn test_json_lines_source() {
        let config = load(&[
            ("BUDDYBOOK_FEED_SOURCE", "JSONL"),
            ("BUDDYBOOK_HISTORY_PATH", "/tmp/replay.jsonl"),
            ("BUDDYBOOK_HISTORY_PAGE_SIZE", "5"),
            ("BUDDYBOOK_TELEMETRY", "memory"),
        ])
        .unwrap();

        match config.feed_source {
            FeedSource::JsonLines {
                history_path,
                page_size,
            } => {
                assert_eq!(history_path, PathBuf::from("/tmp/replay.jsonl"));
                assert_eq!(page_size, 5);
            }
            other => panic!("unexpected source: {:?}", other),
        }
        assert_eq!(config.telemetry, TelemetryMode::Memory);
    }

    #[test]
    fn test_json_lines_default_page_size() {
        let config = load(&[("BUDDYBOOK_FEED_SOURCE", "jsonl")]).unwrap();

        assert!(matches!(
            config.feed_source,
            FeedSource::JsonLines { page_size, .. } if page_size == DEFAULT_PAGE_SIZE
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("BUDDYBOOK_FEED_SOURCE", "kafka")]).is_err());
        assert!(load(&[("BUDDYBOOK_TELEMETRY", "loud")]).is_err());

        let err = load(&[
            ("BUDDYBOOK_FEED_SOURCE", "jsonl"),
            ("BUDDYBOOK_HISTORY_PAGE_SIZE", "0"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("BUDDYBOOK_HISTORY_PAGE_SIZE"));
    }

    #[test]
    fn test_memory_telemetry_is_shared() {
        let config = load(&[("BUDDYBOOK_TELEMETRY", "memory")]).unwrap();
        let (sink, recording) = config.telemetry();

        sink.push(vec![crate::telemetry::TelemetryEvent::new(
            crate::telemetry::Protocol::Store,
            crate::telemetry::TelemetryKind::LiveSubscribed,
        )]);
        assert_eq!(recording.unwrap().len(), 1);
    }
}
