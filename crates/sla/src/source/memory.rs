//! In-memory implementation of SnapshotSource for testing

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{SnapshotSource, SourceError};
use crate::model::{Collection, InventoryItem, InventoryMovement, Lead, Proposal, PurchaseOrder};

#[derive(Default)]
struct Collections {
    leads: Vec<Lead>,
    proposals: Vec<Proposal>,
    inventory_items: Vec<InventoryItem>,
    inventory_movements: Vec<InventoryMovement>,
    purchase_orders: Vec<PurchaseOrder>,
}

/// In-memory implementation of SnapshotSource
///
/// Collections can be replaced at any time. Individual collections can be
/// made to fail and every fetch can be delayed, which is how refresh
/// resilience and the in-flight guard are exercised in tests.
///
/// # Example
///
/// ```
/// use solardesk_sla::InMemorySnapshotSource;
///
/// let source = InMemorySnapshotSource::new();
/// ```
pub struct InMemorySnapshotSource {
    data: RwLock<Collections>,
    failing: RwLock<HashSet<Collection>>,
    latency: RwLock<Option<Duration>>,
    fetches: AtomicUsize,
}

impl InMemorySnapshotSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Collections::default()),
            failing: RwLock::new(HashSet::new()),
            latency: RwLock::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_leads(&self, leads: Vec<Lead>) {
        self.data.write().leads = leads;
    }

    pub fn set_proposals(&self, proposals: Vec<Proposal>) {
        self.data.write().proposals = proposals;
    }

    pub fn set_inventory_items(&self, items: Vec<InventoryItem>) {
        self.data.write().inventory_items = items;
    }

    pub fn set_inventory_movements(&self, movements: Vec<InventoryMovement>) {
        self.data.write().inventory_movements = movements;
    }

    pub fn push_inventory_movement(&self, movement: InventoryMovement) {
        self.data.write().inventory_movements.push(movement);
    }

    pub fn set_purchase_orders(&self, orders: Vec<PurchaseOrder>) {
        self.data.write().purchase_orders = orders;
    }

    /// Make every fetch of `collection` fail until [`recover`](Self::recover)
    pub fn fail(&self, collection: Collection) {
        self.failing.write().insert(collection);
    }

    pub fn recover(&self, collection: Collection) {
        self.failing.write().remove(&collection);
    }

    /// Delay every fetch by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Number of collection fetches served (including failed ones)
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn read<T, F>(&self, collection: Collection, select: F) -> Result<Vec<T>, SourceError>
    where
        T: Clone,
        F: FnOnce(&Collections) -> &Vec<T>,
    {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.read().contains(&collection) {
            return Err(SourceError::Unavailable(collection));
        }

        Ok(select(&self.data.read()).clone())
    }
}

impl Default for InMemorySnapshotSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotSource for InMemorySnapshotSource {
    async fn fetch_leads(&self) -> Result<Vec<Lead>, SourceError> {
        self.read(Collection::Leads, |c| &c.leads).await
    }

    async fn fetch_proposals(&self) -> Result<Vec<Proposal>, SourceError> {
        self.read(Collection::Proposals, |c| &c.proposals).await
    }

    async fn fetch_inventory_items(&self) -> Result<Vec<InventoryItem>, SourceError> {
        self.read(Collection::InventoryItems, |c| &c.inventory_items)
            .await
    }

    async fn fetch_inventory_movements(&self) -> Result<Vec<InventoryMovement>, SourceError> {
        self.read(Collection::InventoryMovements, |c| &c.inventory_movements)
            .await
    }

    async fn fetch_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, SourceError> {
        self.read(Collection::PurchaseOrders, |c| &c.purchase_orders)
            .await
    }
}
