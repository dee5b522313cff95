//! PostgreSQL implementation of SnapshotSource
//!
//! The dashboard keeps its data as schemaless documents. They are mirrored
//! into a single `documents(collection, id, data JSONB)` table; each fetch
//! reads one collection and decodes documents one at a time so a malformed
//! document is skipped instead of failing the whole collection.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument, warn};

use super::{SnapshotSource, SourceError};
use crate::model::{Collection, InventoryItem, InventoryMovement, Lead, Proposal, PurchaseOrder};

/// PostgreSQL implementation of SnapshotSource
///
/// # Example
///
/// ```ignore
/// use solardesk_sla::PostgresDocumentSource;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgres://localhost/solardesk").await?;
/// let source = PostgresDocumentSource::new(pool);
/// ```
#[derive(Clone)]
pub struct PostgresDocumentSource {
    pool: PgPool,
}

impl PostgresDocumentSource {
    /// Create a new source with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self, collection), fields(collection = %collection))]
    async fn fetch_documents<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<T>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT id, data FROM documents WHERE collection = $1 ORDER BY id
            "#,
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch documents: {}", e);
            SourceError::Database(e.to_string())
        })?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .try_get("id")
                .map_err(|e| SourceError::Serialization(e.to_string()))?;
            let data: Value = row
                .try_get("data")
                .map_err(|e| SourceError::Serialization(e.to_string()))?;

            match decode_document(collection, &id, data) {
                Ok(record) => records.push(record),
                Err(e) => warn!(document_id = %id, error = %e, "Skipping malformed document"),
            }
        }

        debug!(count = records.len(), "fetched documents");
        Ok(records)
    }
}

/// Id field the dashboard writes into documents of each collection
fn legacy_id_field(collection: Collection) -> Option<&'static str> {
    match collection {
        Collection::Leads => Some("leadId"),
        Collection::Proposals => Some("propostaId"),
        Collection::InventoryItems => Some("itemId"),
        Collection::PurchaseOrders => Some("compraId"),
        Collection::InventoryMovements => None,
    }
}

/// Decode a document body, supplying the document key as `id` when the body has none
pub(crate) fn decode_document<T: DeserializeOwned>(
    collection: Collection,
    id: &str,
    mut data: Value,
) -> Result<T, serde_json::Error> {
    if let Some(body) = data.as_object_mut() {
        let has_id = body.contains_key("id")
            || legacy_id_field(collection).is_some_and(|field| body.contains_key(field));
        if !has_id {
            body.insert("id".to_string(), Value::String(id.to_string()));
        }
    }
    serde_json::from_value(data)
}

#[async_trait]
impl SnapshotSource for PostgresDocumentSource {
    async fn fetch_leads(&self) -> Result<Vec<Lead>, SourceError> {
        self.fetch_documents(Collection::Leads).await
    }

    async fn fetch_proposals(&self) -> Result<Vec<Proposal>, SourceError> {
        self.fetch_documents(Collection::Proposals).await
    }

    async fn fetch_inventory_items(&self) -> Result<Vec<InventoryItem>, SourceError> {
        self.fetch_documents(Collection::InventoryItems).await
    }

    async fn fetch_inventory_movements(&self) -> Result<Vec<InventoryMovement>, SourceError> {
        self.fetch_documents(Collection::InventoryMovements).await
    }

    async fn fetch_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, SourceError> {
        self.fetch_documents(Collection::PurchaseOrders).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LeadStatus, MovementKind};
    use serde_json::json;

    #[test]
    fn test_document_key_becomes_id() {
        let lead: Lead = decode_document(
            Collection::Leads,
            "L-1",
            json!({"name": "Solar Farm", "status": "NEW", "entryDate": "01/10/2026"}),
        )
        .unwrap();
        assert_eq!(lead.id, "L-1");
        assert_eq!(lead.status, LeadStatus::New);
    }

    #[test]
    fn test_legacy_id_field_wins_over_document_key() {
        let lead: Lead = decode_document(
            Collection::Leads,
            "doc-abc",
            json!({"leadId": "L-77", "nome": "X", "status": "Novo", "dataEntrada": "01/10/2026"}),
        )
        .unwrap();
        assert_eq!(lead.id, "L-77");
    }

    #[test]
    fn test_movement_ignores_document_key() {
        let movement: InventoryMovement = decode_document(
            Collection::InventoryMovements,
            "M-1",
            json!({"itemId": "I-1", "tipo": "Entrada", "quantidade": 12}),
        )
        .unwrap();
        assert_eq!(movement.item_id, "I-1");
        assert_eq!(movement.kind, MovementKind::Entry);
        assert_eq!(movement.quantity, 12.0);
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let result: Result<PurchaseOrder, _> = decode_document(
            Collection::PurchaseOrders,
            "C-1",
            json!({"statusEntrega": "Perdido", "dataPedido": "01/10/2026"}),
        );
        assert!(result.is_err());
    }
}
