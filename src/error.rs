//! Error types for tracking and detection
//!
//! Errors are classified by recoverability:
//! - Retryable: storage backend outages, sink delivery failures, market fetch failures
//! - NonRetryable: malformed persisted state (degraded to defaults at read time)

use thiserror::Error;

/// Errors surfaced by the tracker, detector, and their collaborators.
#[derive(Debug, Error)]
pub enum TrackerError {
    // Retryable errors
    #[error("Storage backend unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Notification delivery failed: {0}")]
    SinkDelivery(String),

    #[error("Market data fetch failed: {0}")]
    Market(String),

    // Non-retryable: persisted JSON failed to parse. Read paths degrade to
    // default state instead of surfacing this; it exists for backends that
    // refuse to silently drop corrupt payloads.
    #[error("Stored state under '{key}' is malformed: {source}")]
    MalformedState {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TrackerError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::StorageUnavailable(_)
                | TrackerError::SinkDelivery(_)
                | TrackerError::Market(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
