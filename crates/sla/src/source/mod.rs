//! Snapshot sources
//!
//! This module provides:
//! - [`SnapshotSource`] trait, one fetch per collection
//! - [`InMemorySnapshotSource`] for tests and embedding
//! - [`PostgresDocumentSource`] reading the JSONB `documents` table
//! - [`fetch_snapshot`] which reads every collection concurrently and
//!   degrades per collection on failure

mod memory;
mod postgres;

use async_trait::async_trait;
use tracing::warn;

pub use memory::InMemorySnapshotSource;
pub use postgres::PostgresDocumentSource;

use crate::model::{
    Collection, InventoryItem, InventoryMovement, Lead, Proposal, PurchaseOrder, Snapshot,
};

/// Error reading a source collection
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The collection could not be reached
    #[error("collection {0} unavailable")]
    Unavailable(Collection),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// The collection was read but could not be decoded as a whole
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read access to the collections the rules consume
///
/// Each method is independent; a failure in one must not affect the others.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn fetch_leads(&self) -> Result<Vec<Lead>, SourceError>;

    async fn fetch_proposals(&self) -> Result<Vec<Proposal>, SourceError>;

    async fn fetch_inventory_items(&self) -> Result<Vec<InventoryItem>, SourceError>;

    async fn fetch_inventory_movements(&self) -> Result<Vec<InventoryMovement>, SourceError>;

    async fn fetch_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, SourceError>;
}

/// Fetch every collection concurrently
///
/// Failed collections are `None` in the snapshot and reported alongside it.
pub async fn fetch_snapshot(
    source: &dyn SnapshotSource,
) -> (Snapshot, Vec<(Collection, SourceError)>) {
    let (leads, proposals, items, movements, orders) = futures::join!(
        source.fetch_leads(),
        source.fetch_proposals(),
        source.fetch_inventory_items(),
        source.fetch_inventory_movements(),
        source.fetch_purchase_orders(),
    );

    let mut failures = Vec::new();
    let snapshot = Snapshot {
        leads: settle(Collection::Leads, leads, &mut failures),
        proposals: settle(Collection::Proposals, proposals, &mut failures),
        inventory_items: settle(Collection::InventoryItems, items, &mut failures),
        inventory_movements: settle(Collection::InventoryMovements, movements, &mut failures),
        purchase_orders: settle(Collection::PurchaseOrders, orders, &mut failures),
    };

    (snapshot, failures)
}

fn settle<T>(
    collection: Collection,
    result: Result<Vec<T>, SourceError>,
    failures: &mut Vec<(Collection, SourceError)>,
) -> Option<Vec<T>> {
    match result {
        Ok(records) => Some(records),
        Err(e) => {
            warn!(%collection, error = %e, "Collection fetch failed, omitting its alerts");
            failures.push((collection, e));
            None
        }
    }
}
