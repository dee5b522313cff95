//! Acknowledgement ledger
//!
//! Acknowledging an alert sets `resolved` on a durable record keyed by the
//! alert's deterministic id. The [`AlertStore`](crate::store::AlertStore)
//! keeps an in-memory copy of the acknowledged ids as a cache over this
//! ledger.
//!
//! This module provides:
//! - [`AcknowledgementStore`] trait
//! - [`InMemoryAcknowledgementStore`] for testing
//! - [`PostgresAcknowledgementStore`] backed by the `sla_alerts` table

mod memory;
mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::InMemoryAcknowledgementStore;
pub use postgres::PostgresAcknowledgementStore;

use crate::alert::{Alert, AlertKind, Severity};

/// Error type for ledger operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted view of an alert
///
/// Descriptive fields are `None` when the alert was acknowledged before any
/// pass recorded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: String,
    pub kind: Option<AlertKind>,
    pub severity: Option<Severity>,
    pub source_reference: Option<String>,
    pub message: Option<String>,
    pub detected_at: Option<NaiveDateTime>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AlertRecord {
    /// Record for an alert id that has only been acknowledged
    pub fn acknowledged(id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            severity: None,
            source_reference: None,
            message: None,
            detected_at: None,
            resolved: true,
            resolved_at: Some(at),
        }
    }

    /// Refresh descriptive fields from a freshly evaluated alert, keeping resolution
    pub fn update_from(&mut self, alert: &Alert) {
        self.kind = Some(alert.kind);
        self.severity = Some(alert.severity);
        self.source_reference = Some(alert.source_reference.clone());
        self.message = Some(alert.message.clone());
        self.detected_at = Some(alert.detected_at);
    }
}

impl From<&Alert> for AlertRecord {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id.clone(),
            kind: Some(alert.kind),
            severity: Some(alert.severity),
            source_reference: Some(alert.source_reference.clone()),
            message: Some(alert.message.clone()),
            detected_at: Some(alert.detected_at),
            resolved: false,
            resolved_at: None,
        }
    }
}

/// Durable store for alert acknowledgements
///
/// Implementations must be thread-safe; the UI writes through
/// [`acknowledge`](Self::acknowledge) while refresh passes read.
#[async_trait]
pub trait AcknowledgementStore: Send + Sync + 'static {
    /// Mark an alert resolved
    ///
    /// Idempotent: acknowledging twice keeps the first `resolved_at`.
    async fn acknowledge(&self, alert_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Ids of every resolved alert
    async fn acknowledged(&self) -> Result<HashSet<String>, StoreError>;

    /// The subset of `alert_ids` that is resolved
    async fn acknowledged_among(&self, alert_ids: &[String])
        -> Result<HashSet<String>, StoreError>;

    /// Upsert records for a published alert list without touching `resolved`
    async fn record_alerts(&self, alerts: &[Alert]) -> Result<(), StoreError>;

    /// Read one persisted record
    async fn get_record(&self, alert_id: &str) -> Result<Option<AlertRecord>, StoreError>;
}
