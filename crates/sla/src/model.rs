//! Read-only snapshots of the dashboard collections the rules consume
//!
//! Only the fields the rules need are modelled. Field and status aliases
//! accept the spellings the dashboard writes into the document store.

use serde::{Deserialize, Serialize};

/// Lead funnel stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    #[serde(alias = "Novo")]
    New,
    #[serde(alias = "Qualificado")]
    Qualified,
    #[serde(alias = "Visita_Agendada")]
    VisitScheduled,
    #[serde(alias = "Convertido")]
    Converted,
    #[serde(alias = "Perdido")]
    Lost,
}

/// A lead as seen by the stale-lead rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    #[serde(alias = "leadId")]
    pub id: String,
    #[serde(default, alias = "nome")]
    pub name: String,
    pub status: LeadStatus,
    /// `dd/mm/yyyy`
    #[serde(alias = "dataEntrada")]
    pub entry_date: String,
}

impl Lead {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        status: LeadStatus,
        entry_date: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            entry_date: entry_date.into(),
        }
    }
}

/// Proposal lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    #[serde(alias = "Em Elaboração")]
    Drafting,
    #[serde(alias = "Enviada")]
    Sent,
    #[serde(alias = "Aprovada")]
    Approved,
    #[serde(alias = "Reprovada")]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    #[serde(alias = "propostaId")]
    pub id: String,
    pub status: ProposalStatus,
    /// `dd/mm/yyyy`, optionally followed by a time
    #[serde(default, alias = "dataEnvio")]
    pub sent_date: String,
}

impl Proposal {
    pub fn new(id: impl Into<String>, status: ProposalStatus, sent_date: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status,
            sent_date: sent_date.into(),
        }
    }
}

/// A stocked item and its reorder point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    #[serde(alias = "itemId")]
    pub id: String,
    #[serde(default, alias = "nome")]
    pub name: String,
    #[serde(default, alias = "unidade")]
    pub unit: String,
    #[serde(alias = "pontoPedido")]
    pub reorder_point: f64,
}

impl InventoryItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        unit: impl Into<String>,
        reorder_point: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit: unit.into(),
            reorder_point,
        }
    }
}

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    #[serde(alias = "Entrada")]
    Entry,
    #[serde(alias = "Saída")]
    Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovement {
    pub item_id: String,
    #[serde(alias = "tipo")]
    pub kind: MovementKind,
    #[serde(alias = "quantidade")]
    pub quantity: f64,
}

impl InventoryMovement {
    pub fn entry(item_id: impl Into<String>, quantity: f64) -> Self {
        Self {
            item_id: item_id.into(),
            kind: MovementKind::Entry,
            quantity,
        }
    }

    pub fn exit(item_id: impl Into<String>, quantity: f64) -> Self {
        Self {
            item_id: item_id.into(),
            kind: MovementKind::Exit,
            quantity,
        }
    }

    /// Quantity with the sign of its effect on the balance
    pub fn signed_quantity(&self) -> f64 {
        match self.kind {
            MovementKind::Entry => self.quantity,
            MovementKind::Exit => -self.quantity,
        }
    }
}

/// Purchase order delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    #[serde(alias = "Pendente")]
    Pending,
    #[serde(alias = "Em Trânsito")]
    InTransit,
    #[serde(alias = "Entregue")]
    Delivered,
    #[serde(alias = "Cancelado")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    #[serde(alias = "compraId")]
    pub id: String,
    #[serde(alias = "statusEntrega")]
    pub delivery_status: DeliveryStatus,
    /// `dd/mm/yyyy`
    #[serde(alias = "dataPedido")]
    pub order_date: String,
}

impl PurchaseOrder {
    pub fn new(
        id: impl Into<String>,
        delivery_status: DeliveryStatus,
        order_date: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            delivery_status,
            order_date: order_date.into(),
        }
    }
}

/// Source collections read by a refresh pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Leads,
    Proposals,
    InventoryItems,
    InventoryMovements,
    PurchaseOrders,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Leads,
        Collection::Proposals,
        Collection::InventoryItems,
        Collection::InventoryMovements,
        Collection::PurchaseOrders,
    ];

    /// Collection name in the document store
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leads => "leads",
            Self::Proposals => "proposals",
            Self::InventoryItems => "inventory_items",
            Self::InventoryMovements => "inventory_movements",
            Self::PurchaseOrders => "purchase_orders",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time read of every source collection
///
/// `None` marks a collection that could not be fetched for this pass; rules
/// depending on it are skipped rather than run against missing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub leads: Option<Vec<Lead>>,
    pub proposals: Option<Vec<Proposal>>,
    pub inventory_items: Option<Vec<InventoryItem>>,
    pub inventory_movements: Option<Vec<InventoryMovement>>,
    pub purchase_orders: Option<Vec<PurchaseOrder>>,
}

impl Snapshot {
    /// Snapshot with every collection present but empty
    pub fn empty() -> Self {
        Self {
            leads: Some(vec![]),
            proposals: Some(vec![]),
            inventory_items: Some(vec![]),
            inventory_movements: Some(vec![]),
            purchase_orders: Some(vec![]),
        }
    }

    pub fn with_leads(mut self, leads: Vec<Lead>) -> Self {
        self.leads = Some(leads);
        self
    }

    pub fn with_proposals(mut self, proposals: Vec<Proposal>) -> Self {
        self.proposals = Some(proposals);
        self
    }

    pub fn with_inventory(
        mut self,
        items: Vec<InventoryItem>,
        movements: Vec<InventoryMovement>,
    ) -> Self {
        self.inventory_items = Some(items);
        self.inventory_movements = Some(movements);
        self
    }

    pub fn with_purchase_orders(mut self, orders: Vec<PurchaseOrder>) -> Self {
        self.purchase_orders = Some(orders);
        self
    }

    /// Collections missing from this snapshot
    pub fn missing(&self) -> Vec<Collection> {
        let present = [
            self.leads.is_some(),
            self.proposals.is_some(),
            self.inventory_items.is_some(),
            self.inventory_movements.is_some(),
            self.purchase_orders.is_some(),
        ];
        Collection::ALL
            .into_iter()
            .zip(present)
            .filter_map(|(collection, present)| (!present).then_some(collection))
            .collect()
    }
}
