//! PostgreSQL implementation of AcknowledgementStore

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};

use super::{AcknowledgementStore, AlertRecord, StoreError};
use crate::alert::{Alert, AlertKind, Severity};

const SCHEMA: &str = include_str!("../../migrations/001_sla_alerts.sql");

/// PostgreSQL implementation of AcknowledgementStore
///
/// Uses the `sla_alerts` table; see `migrations/001_sla_alerts.sql`.
///
/// # Example
///
/// ```ignore
/// use solardesk_sla::PostgresAcknowledgementStore;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgres://localhost/solardesk").await?;
/// let store = PostgresAcknowledgementStore::new(pool);
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresAcknowledgementStore {
    pool: PgPool,
}

impl PostgresAcknowledgementStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `documents` and `sla_alerts` tables if they do not exist
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to apply SLA schema: {}", e);
                StoreError::Database(e.to_string())
            })?;
        Ok(())
    }
}

#[async_trait]
impl AcknowledgementStore for PostgresAcknowledgementStore {
    #[instrument(skip(self))]
    async fn acknowledge(&self, alert_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sla_alerts (id, resolved, resolved_at)
            VALUES ($1, TRUE, $2)
            ON CONFLICT (id) DO UPDATE
            SET resolved = TRUE,
                resolved_at = COALESCE(sla_alerts.resolved_at, EXCLUDED.resolved_at),
                updated_at = now()
            "#,
        )
        .bind(alert_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to acknowledge alert: {}", e);
            StoreError::Database(e.to_string())
        })?;

        debug!(%alert_id, "acknowledged alert");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn acknowledged(&self) -> Result<HashSet<String>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM sla_alerts WHERE resolved
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load acknowledged alerts: {}", e);
            StoreError::Database(e.to_string())
        })?;

        Ok(rows.iter().map(|row| row.get::<String, _>("id")).collect())
    }

    #[instrument(skip(self, alert_ids), fields(count = alert_ids.len()))]
    async fn acknowledged_among(
        &self,
        alert_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        if alert_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id FROM sla_alerts WHERE resolved AND id = ANY($1)
            "#,
        )
        .bind(alert_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load acknowledged alerts: {}", e);
            StoreError::Database(e.to_string())
        })?;

        Ok(rows.iter().map(|row| row.get::<String, _>("id")).collect())
    }

    #[instrument(skip(self, alerts), fields(count = alerts.len()))]
    async fn record_alerts(&self, alerts: &[Alert]) -> Result<(), StoreError> {
        if alerts.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = alerts.iter().map(|a| a.id.clone()).collect();
        let kinds: Vec<String> = alerts.iter().map(|a| a.kind.as_str().to_string()).collect();
        let severities: Vec<String> = alerts
            .iter()
            .map(|a| a.severity.as_str().to_string())
            .collect();
        let references: Vec<String> = alerts.iter().map(|a| a.source_reference.clone()).collect();
        let messages: Vec<String> = alerts.iter().map(|a| a.message.clone()).collect();
        let detected: Vec<NaiveDateTime> = alerts.iter().map(|a| a.detected_at).collect();

        sqlx::query(
            r#"
            INSERT INTO sla_alerts (id, kind, severity, source_reference, message, detected_at)
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::text[], $6::timestamp[])
            ON CONFLICT (id) DO UPDATE
            SET kind = EXCLUDED.kind,
                severity = EXCLUDED.severity,
                source_reference = EXCLUDED.source_reference,
                message = EXCLUDED.message,
                detected_at = EXCLUDED.detected_at,
                updated_at = now()
            "#,
        )
        .bind(&ids)
        .bind(&kinds)
        .bind(&severities)
        .bind(&references)
        .bind(&messages)
        .bind(&detected)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to record alerts: {}", e);
            StoreError::Database(e.to_string())
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_record(&self, alert_id: &str) -> Result<Option<AlertRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, kind, severity, source_reference, message, detected_at, resolved, resolved_at
            FROM sla_alerts
            WHERE id = $1
            "#,
        )
        .bind(alert_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get alert record: {}", e);
            StoreError::Database(e.to_string())
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let kind: Option<String> = row.get("kind");
        let severity: Option<String> = row.get("severity");

        Ok(Some(AlertRecord {
            id: row.get("id"),
            kind: kind.as_deref().map(parse_kind).transpose()?,
            severity: severity.as_deref().map(parse_severity).transpose()?,
            source_reference: row.get("source_reference"),
            message: row.get("message"),
            detected_at: row.get("detected_at"),
            resolved: row.get("resolved"),
            resolved_at: row.get("resolved_at"),
        }))
    }
}

fn parse_kind(s: &str) -> Result<AlertKind, StoreError> {
    AlertKind::parse(s).ok_or_else(|| StoreError::Serialization(format!("unknown alert kind: {s}")))
}

fn parse_severity(s: &str) -> Result<Severity, StoreError> {
    Severity::parse(s).ok_or_else(|| StoreError::Serialization(format!("unknown severity: {s}")))
}
