//! Error types for the ledger.

use buddybook_relay::FeedError;
use thiserror::Error;

/// A raw record that cannot become a [`Block`](crate::block::Block).
///
/// The record is rejected and not stored. Ingestion continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A signature entry cannot be used.
    #[error("Invalid signature entry at index {index}: {reason}")]
    InvalidSignature { index: usize, reason: &'static str },
}

impl ValidationError {
    /// Short label used for counters and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::InvalidSignature { .. } => "invalid_signature",
        }
    }
}

/// Errors that stop the ingestion coordinator.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// No feed could be constructed from the injected client.
    #[error("Feed adapter unavailable: {0}")]
    AdapterUnavailable(#[from] FeedError),

    /// The coordinator task could not be reached or joined.
    #[error("Channel error: {0}")]
    Channel(String),
}

impl CoordinatorError {
    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    /// Create an invalid value error.
    pub fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}
