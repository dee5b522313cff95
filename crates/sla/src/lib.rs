//! # Solardesk SLA Alert Engine
//!
//! Derives compliance alerts from the dashboard's operational collections and
//! keeps a published, acknowledgement-aware alert list up to date.
//!
//! ## Features
//!
//! - **Pure rule engine**: stale leads, expired proposals, low stock and overdue
//!   purchase orders, each with an ordered severity table
//! - **Deterministic alert ids**: the same condition always yields the same id,
//!   so acknowledgements survive re-evaluation
//! - **Durable acknowledgements**: stored as a `resolved` flag on alert records,
//!   cached in memory by the [`AlertStore`]
//! - **Partial-failure tolerance**: a failing collection only suppresses the
//!   rules that depend on it
//! - **Refresh scheduler**: periodic and on-demand refreshes gated by an
//!   activation signal, never overlapping
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────────┐
//! │  SnapshotSource  │   │ AcknowledgementStore │
//! │ (documents, 5x)  │   │   (sla_alerts table) │
//! └────────┬─────────┘   └──────────┬───────────┘
//!          │ Snapshot               │ acknowledged ids
//!          ▼                        ▼
//! ┌─────────────────────────────────────────────┐
//! │                 AlertStore                   │
//! │  in-flight guard · ack cache · RuleEngine   │
//! └─────────────────────┬───────────────────────┘
//!                       │ watch<Arc<[Alert]>>
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │              RefreshScheduler                │
//! │  Inactive → Fetching → Published → ...      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use solardesk_sla::prelude::*;
//!
//! let store = Arc::new(AlertStore::new(
//!     Arc::new(PostgresDocumentSource::new(pool.clone())),
//!     Arc::new(PostgresAcknowledgementStore::new(pool)),
//!     RuleEngine::new(config.thresholds.clone()),
//!     Arc::new(SystemClock),
//! ));
//!
//! let (active_tx, active_rx) = tokio::sync::watch::channel(true);
//! let handle = RefreshScheduler::new(Arc::clone(&store), config.refresh_interval).spawn(active_rx);
//!
//! store.acknowledge("SLA_LEAD_L-42").await?;
//! println!("{} active alerts", store.summary().badge_count());
//! ```

pub mod ack;
pub mod alert;
pub mod config;
pub mod dates;
pub mod engine;
pub mod error;
pub mod model;
pub mod refresh;
pub mod source;
pub mod store;

/// Prelude for common imports
pub mod prelude {
    pub use crate::ack::{
        AcknowledgementStore, InMemoryAcknowledgementStore, PostgresAcknowledgementStore,
        StoreError,
    };
    pub use crate::alert::{Alert, AlertKind, AlertSummary, Severity};
    pub use crate::config::SlaConfig;
    pub use crate::engine::{evaluate, RuleEngine, RuleThresholds};
    pub use crate::error::{Result, SlaError};
    pub use crate::model::{Collection, Snapshot};
    pub use crate::refresh::{RefreshHandle, RefreshScheduler, RefreshState};
    pub use crate::source::{
        InMemorySnapshotSource, PostgresDocumentSource, SnapshotSource, SourceError,
    };
    pub use crate::store::{AlertStore, Clock, FixedClock, RefreshOutcome, SystemClock};
}

// Re-export key types at crate root
pub use ack::{AcknowledgementStore, InMemoryAcknowledgementStore, PostgresAcknowledgementStore};
pub use alert::{Alert, AlertKind, AlertSummary, Severity};
pub use config::SlaConfig;
pub use engine::{evaluate, RuleEngine, RuleThresholds};
pub use error::{Result, SlaError};
pub use model::{Collection, Snapshot};
pub use refresh::{RefreshHandle, RefreshScheduler, RefreshState};
pub use source::{InMemorySnapshotSource, PostgresDocumentSource, SnapshotSource, SourceError};
pub use store::{AlertStore, Clock, FixedClock, RefreshOutcome, RefreshReport, SystemClock};
