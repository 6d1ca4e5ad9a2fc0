//! Error taxonomy for worker lifecycle and per-frame faults.

use thiserror::Error;

use crate::detect::Family;
use crate::SourceId;

/// Result type alias for sentinel operations.
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Errors surfaced by the sentinel core.
///
/// Lifecycle errors (`AlreadyRunning`, `NotRunning`, `SourceUnavailable`) are
/// returned synchronously from `start`/`stop`. `DetectorFailure` and
/// `DeliveryFailure` are absorbed where they happen and only logged.
#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("detection already running for source {0}")]
    AlreadyRunning(SourceId),

    #[error("no detection running for source {0}")]
    NotRunning(SourceId),

    #[error("frame source {source_id} unavailable: {reason}")]
    SourceUnavailable { source_id: SourceId, reason: String },

    #[error("{family} detector failed: {reason}")]
    DetectorFailure { family: Family, reason: String },

    #[error("alert delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("worker thread error: {0}")]
    Worker(String),
}

impl SentinelError {
    pub fn source_unavailable(source_id: &SourceId, err: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.clone(),
            reason: err.to_string(),
        }
    }

    pub fn detector(family: Family, err: impl std::fmt::Display) -> Self {
        Self::DetectorFailure {
            family,
            reason: err.to_string(),
        }
    }

    /// True for errors that end a `start`/`stop` call rather than a frame.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning(_) | Self::NotRunning(_) | Self::SourceUnavailable { .. }
        )
    }
}
