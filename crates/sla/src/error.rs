// Error types for the SLA alert subsystem

use thiserror::Error;

use crate::ack::StoreError;

/// Result type alias for alert store operations
pub type Result<T> = std::result::Result<T, SlaError>;

/// Errors surfaced by the alert store and scheduler
///
/// Per-collection fetch failures and malformed records never show up here;
/// they are logged and degrade the pass instead of aborting it.
#[derive(Debug, Error)]
pub enum SlaError {
    /// Acknowledgement ledger error
    #[error("acknowledgement store error: {0}")]
    Store(#[from] StoreError),

    /// Every source collection failed during a refresh pass
    #[error("all source collections unavailable")]
    AllSourcesUnavailable,

    /// Empty alert id passed to acknowledge
    #[error("alert id must not be empty")]
    EmptyAlertId,

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SlaError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        SlaError::Configuration(msg.into())
    }

    /// Whether the next refresh pass can be expected to succeed without intervention
    pub fn is_transient(&self) -> bool {
        matches!(self, SlaError::Store(_) | SlaError::AllSourcesUnavailable)
    }
}
