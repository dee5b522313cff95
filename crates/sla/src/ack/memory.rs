//! In-memory implementation of AcknowledgementStore for testing

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{AcknowledgementStore, AlertRecord, StoreError};
use crate::alert::Alert;

/// In-memory implementation of AcknowledgementStore
///
/// Same semantics as the PostgreSQL implementation. [`set_unavailable`]
/// makes every call fail, to exercise the store's fallback paths.
///
/// [`set_unavailable`]: InMemoryAcknowledgementStore::set_unavailable
pub struct InMemoryAcknowledgementStore {
    records: RwLock<HashMap<String, AlertRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryAcknowledgementStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of persisted records
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryAcknowledgementStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcknowledgementStore for InMemoryAcknowledgementStore {
    async fn acknowledge(&self, alert_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check_available()?;
        let mut records = self.records.write();
        match records.get_mut(alert_id) {
            Some(record) => {
                if !record.resolved {
                    record.resolved = true;
                    record.resolved_at = Some(at);
                }
            }
            None => {
                records.insert(
                    alert_id.to_string(),
                    AlertRecord::acknowledged(alert_id, at),
                );
            }
        }
        Ok(())
    }

    async fn acknowledged(&self) -> Result<HashSet<String>, StoreError> {
        self.check_available()?;
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.resolved)
            .map(|r| r.id.clone())
            .collect())
    }

    async fn acknowledged_among(
        &self,
        alert_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        self.check_available()?;
        let records = self.records.read();
        Ok(alert_ids
            .iter()
            .filter(|id| records.get(id.as_str()).is_some_and(|r| r.resolved))
            .cloned()
            .collect())
    }

    async fn record_alerts(&self, alerts: &[Alert]) -> Result<(), StoreError> {
        self.check_available()?;
        let mut records = self.records.write();
        for alert in alerts {
            records
                .entry(alert.id.clone())
                .and_modify(|record| record.update_from(alert))
                .or_insert_with(|| AlertRecord::from(alert));
        }
        Ok(())
    }

    async fn get_record(&self, alert_id: &str) -> Result<Option<AlertRecord>, StoreError> {
        self.check_available()?;
        Ok(self.records.read().get(alert_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertKind, Severity};
    use chrono::{NaiveDate, TimeZone};

    fn alert(reference: &str) -> Alert {
        let detected = NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Alert::new(
            AlertKind::LeadStale,
            Severity::High,
            reference,
            "stale",
            detected,
        )
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent() {
        let store = InMemoryAcknowledgementStore::new();
        let first = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap();

        store.acknowledge("SLA_LEAD_L-1", first).await.unwrap();
        store.acknowledge("SLA_LEAD_L-1", second).await.unwrap();

        let record = store.get_record("SLA_LEAD_L-1").await.unwrap().unwrap();
        assert!(record.resolved);
        assert_eq!(record.resolved_at, Some(first));
        assert!(record.kind.is_none());
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn test_record_alerts_preserves_resolution() {
        let store = InMemoryAcknowledgementStore::new();
        store.record_alerts(&[alert("L-1"), alert("L-2")]).await.unwrap();
        store.acknowledge("SLA_LEAD_L-1", Utc::now()).await.unwrap();

        let mut updated = alert("L-1");
        updated.severity = Severity::Critical;
        store.record_alerts(&[updated]).await.unwrap();

        let record = store.get_record("SLA_LEAD_L-1").await.unwrap().unwrap();
        assert!(record.resolved);
        assert_eq!(record.severity, Some(Severity::Critical));

        let acknowledged = store.acknowledged().await.unwrap();
        assert_eq!(acknowledged, HashSet::from(["SLA_LEAD_L-1".to_string()]));
    }

    #[tokio::test]
    async fn test_acknowledged_among_only_returns_requested_ids() {
        let store = InMemoryAcknowledgementStore::new();
        store.record_alerts(&[alert("L-2")]).await.unwrap();
        store.acknowledge("SLA_LEAD_L-1", Utc::now()).await.unwrap();
        store.acknowledge("SLA_LEAD_L-9", Utc::now()).await.unwrap();

        let ids = vec![
            "SLA_LEAD_L-1".to_string(),
            "SLA_LEAD_L-2".to_string(),
            "SLA_LEAD_L-3".to_string(),
        ];
        let acknowledged = store.acknowledged_among(&ids).await.unwrap();
        assert_eq!(acknowledged, HashSet::from(["SLA_LEAD_L-1".to_string()]));
        assert!(store.acknowledged_among(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = InMemoryAcknowledgementStore::new();
        store.set_unavailable(true);
        assert!(store.acknowledged().await.is_err());
        assert!(store.acknowledge("x", Utc::now()).await.is_err());
        assert!(store.acknowledged_among(&["x".to_string()]).await.is_err());

        store.set_unavailable(false);
        assert!(store.acknowledged().await.unwrap().is_empty());
    }
}
