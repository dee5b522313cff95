//! Alert rule engine
//!
//! A pure mapping from `(now, snapshot, acknowledged ids)` to alerts. Nothing
//! in here performs I/O or mutates the acknowledged set; the
//! [`AlertStore`](crate::store::AlertStore) owns both.
//!
//! # Rules
//!
//! | Kind               | Applies to               | Alert when                 | Severity                     |
//! |--------------------|--------------------------|----------------------------|------------------------------|
//! | `LEAD_STALE`       | leads in `NEW`           | age > 7 days               | critical > 14, else high     |
//! | `PROPOSAL_EXPIRED` | proposals in `SENT`      | age > 15 days              | critical > 30, else medium   |
//! | `LOW_STOCK`        | every inventory item     | balance <= reorder point   | critical <= 0, else high     |
//! | `PURCHASE_OVERDUE` | orders in `PENDING`      | age > 30 days              | medium                       |
//!
//! Day thresholds come from [`RuleThresholds`].

mod rules;
mod severity;

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use rules::{
    expired_proposals, low_stock, low_stock_table, overdue_purchases, stale_leads, stock_balances,
};
pub use severity::{Comparison, SeverityTable, Tier};

use crate::alert::{Alert, Severity};
use crate::error::SlaError;
use crate::model::Snapshot;

/// Day thresholds for the time-based rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// A `NEW` lead older than this is stale
    #[serde(default = "default_lead_stale_days")]
    pub lead_stale_days: i64,

    /// A stale lead older than this is critical
    #[serde(default = "default_lead_critical_days")]
    pub lead_critical_days: i64,

    /// A `SENT` proposal older than this has expired
    #[serde(default = "default_proposal_expired_days")]
    pub proposal_expired_days: i64,

    /// An expired proposal older than this is critical
    #[serde(default = "default_proposal_critical_days")]
    pub proposal_critical_days: i64,

    /// A `PENDING` purchase order older than this is overdue
    #[serde(default = "default_purchase_overdue_days")]
    pub purchase_overdue_days: i64,
}

fn default_lead_stale_days() -> i64 {
    7
}

fn default_lead_critical_days() -> i64 {
    14
}

fn default_proposal_expired_days() -> i64 {
    15
}

fn default_proposal_critical_days() -> i64 {
    30
}

fn default_purchase_overdue_days() -> i64 {
    30
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            lead_stale_days: default_lead_stale_days(),
            lead_critical_days: default_lead_critical_days(),
            proposal_expired_days: default_proposal_expired_days(),
            proposal_critical_days: default_proposal_critical_days(),
            purchase_overdue_days: default_purchase_overdue_days(),
        }
    }
}

impl RuleThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lead_days(mut self, stale: i64, critical: i64) -> Self {
        self.lead_stale_days = stale;
        self.lead_critical_days = critical;
        self
    }

    pub fn with_proposal_days(mut self, expired: i64, critical: i64) -> Self {
        self.proposal_expired_days = expired;
        self.proposal_critical_days = critical;
        self
    }

    pub fn with_purchase_overdue_days(mut self, days: i64) -> Self {
        self.purchase_overdue_days = days;
        self
    }

    /// Reject negative windows and critical tiers below their base tier
    pub fn validate(&self) -> Result<(), SlaError> {
        let windows = [
            ("lead_stale_days", self.lead_stale_days),
            ("lead_critical_days", self.lead_critical_days),
            ("proposal_expired_days", self.proposal_expired_days),
            ("proposal_critical_days", self.proposal_critical_days),
            ("purchase_overdue_days", self.purchase_overdue_days),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, days)| *days < 0) {
            return Err(SlaError::config(format!("{name} must not be negative")));
        }
        if self.lead_critical_days < self.lead_stale_days {
            return Err(SlaError::config(
                "lead_critical_days must be >= lead_stale_days",
            ));
        }
        if self.proposal_critical_days < self.proposal_expired_days {
            return Err(SlaError::config(
                "proposal_critical_days must be >= proposal_expired_days",
            ));
        }
        Ok(())
    }

    pub fn lead_table(&self) -> SeverityTable {
        SeverityTable::new()
            .above(self.lead_critical_days as f64, Severity::Critical)
            .above(self.lead_stale_days as f64, Severity::High)
    }

    pub fn proposal_table(&self) -> SeverityTable {
        SeverityTable::new()
            .above(self.proposal_critical_days as f64, Severity::Critical)
            .above(self.proposal_expired_days as f64, Severity::Medium)
    }

    pub fn purchase_table(&self) -> SeverityTable {
        SeverityTable::new().above(self.purchase_overdue_days as f64, Severity::Medium)
    }
}

/// Rule engine with precomputed severity tables
#[derive(Debug, Clone)]
pub struct RuleEngine {
    thresholds: RuleThresholds,
    lead_table: SeverityTable,
    proposal_table: SeverityTable,
    purchase_table: SeverityTable,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(RuleThresholds::default())
    }
}

impl RuleEngine {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self {
            lead_table: thresholds.lead_table(),
            proposal_table: thresholds.proposal_table(),
            purchase_table: thresholds.purchase_table(),
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Run every rule whose inputs are present and overlay acknowledgements
    ///
    /// Output is grouped by kind in rule order. Duplicate source records
    /// collapse to the first alert for their id.
    pub fn evaluate(
        &self,
        now: NaiveDateTime,
        snapshot: &Snapshot,
        acknowledged: &HashSet<String>,
    ) -> Vec<Alert> {
        let mut candidates = Vec::new();

        if let Some(leads) = &snapshot.leads {
            candidates.extend(stale_leads(leads, now, &self.lead_table));
        }
        if let Some(proposals) = &snapshot.proposals {
            candidates.extend(expired_proposals(proposals, now, &self.proposal_table));
        }
        match (&snapshot.inventory_items, &snapshot.inventory_movements) {
            (Some(items), Some(movements)) => candidates.extend(low_stock(items, movements, now)),
            (Some(_), None) => debug!("Movements unavailable, skipping low stock rule"),
            _ => {}
        }
        if let Some(orders) = &snapshot.purchase_orders {
            candidates.extend(overdue_purchases(orders, now, &self.purchase_table));
        }

        let mut seen = HashSet::with_capacity(candidates.len());
        let mut alerts: Vec<Alert> = candidates
            .into_iter()
            .filter(|alert| seen.insert(alert.id.clone()))
            .collect();

        apply_acknowledgements(&mut alerts, acknowledged);
        alerts
    }
}

/// Set `resolved` on exactly the alerts whose id is in `acknowledged`
pub fn apply_acknowledgements(alerts: &mut [Alert], acknowledged: &HashSet<String>) {
    for alert in alerts {
        alert.resolved = acknowledged.contains(&alert.id);
    }
}

/// Evaluate with the default thresholds
pub fn evaluate(
    now: NaiveDateTime,
    snapshot: &Snapshot,
    acknowledged: &HashSet<String>,
) -> Vec<Alert> {
    RuleEngine::default().evaluate(now, snapshot, acknowledged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertKind;
    use crate::model::{
        DeliveryStatus, InventoryItem, InventoryMovement, Lead, LeadStatus, Proposal,
        ProposalStatus, PurchaseOrder,
    };
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_default_thresholds() {
        let thresholds = RuleThresholds::default();
        assert_eq!(thresholds.lead_stale_days, 7);
        assert_eq!(thresholds.lead_critical_days, 14);
        assert_eq!(thresholds.proposal_expired_days, 15);
        assert_eq!(thresholds.proposal_critical_days, 30);
        assert_eq!(thresholds.purchase_overdue_days, 30);
        assert!(thresholds.validate().is_ok());
    }

    #[test]
    fn test_thresholds_deserialize_with_defaults() {
        let thresholds: RuleThresholds =
            serde_json::from_str(r#"{"purchase_overdue_days": 20}"#).unwrap();
        assert_eq!(thresholds.purchase_overdue_days, 20);
        assert_eq!(thresholds.lead_stale_days, 7);
    }

    #[test]
    fn test_validate_rejects_inverted_tiers() {
        let thresholds = RuleThresholds::new().with_lead_days(10, 5);
        assert!(matches!(
            thresholds.validate(),
            Err(SlaError::Configuration(_))
        ));
        let thresholds = RuleThresholds::new().with_purchase_overdue_days(-1);
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn test_custom_purchase_threshold() {
        let engine = RuleEngine::new(RuleThresholds::new().with_purchase_overdue_days(20));
        let snapshot = Snapshot::empty().with_purchase_orders(vec![PurchaseOrder::new(
            "C-1",
            DeliveryStatus::Pending,
            "25/09/2026",
        )]);

        let alerts = engine.evaluate(now(), &snapshot, &HashSet::new());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::PurchaseOverdue);

        assert!(evaluate(now(), &snapshot, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_acknowledged_overlay() {
        let snapshot = Snapshot::empty().with_leads(vec![
            Lead::new("L-1", "A", LeadStatus::New, "01/10/2026"),
            Lead::new("L-2", "B", LeadStatus::New, "01/10/2026"),
        ]);
        let acknowledged: HashSet<String> = ["SLA_LEAD_L-2".to_string()].into();

        let alerts = evaluate(now(), &snapshot, &acknowledged);
        assert_eq!(alerts.len(), 2);
        assert!(!alerts[0].resolved);
        assert!(alerts[1].resolved);
    }

    #[test]
    fn test_apply_acknowledgements_clears_stale_flags() {
        let snapshot = Snapshot::empty().with_leads(vec![
            Lead::new("L-1", "A", LeadStatus::New, "01/10/2026"),
            Lead::new("L-2", "B", LeadStatus::New, "01/10/2026"),
        ]);
        let mut alerts = evaluate(now(), &snapshot, &["SLA_LEAD_L-1".to_string()].into());
        assert!(alerts[0].resolved);

        apply_acknowledgements(&mut alerts, &["SLA_LEAD_L-2".to_string()].into());
        assert!(!alerts[0].resolved);
        assert!(alerts[1].resolved);
    }

    #[test]
    fn test_duplicate_records_yield_one_alert() {
        let snapshot = Snapshot::empty().with_proposals(vec![
            Proposal::new("P-1", ProposalStatus::Sent, "01/09/2026"),
            Proposal::new("P-1", ProposalStatus::Sent, "01/09/2026"),
        ]);
        assert_eq!(evaluate(now(), &snapshot, &HashSet::new()).len(), 1);
    }

    #[test]
    fn test_low_stock_needs_movements() {
        let mut snapshot = Snapshot::empty().with_inventory(
            vec![InventoryItem::new("I-1", "Panel", "un", 5.0)],
            vec![InventoryMovement::entry("I-1", 100.0)],
        );
        assert!(evaluate(now(), &snapshot, &HashSet::new()).is_empty());

        snapshot.inventory_movements = None;
        assert!(evaluate(now(), &snapshot, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_output_grouped_by_kind() {
        let snapshot = Snapshot::empty()
            .with_purchase_orders(vec![PurchaseOrder::new(
                "C-1",
                DeliveryStatus::Pending,
                "01/01/2026",
            )])
            .with_leads(vec![Lead::new("L-1", "A", LeadStatus::New, "01/01/2026")])
            .with_inventory(vec![InventoryItem::new("I-1", "Panel", "un", 5.0)], vec![]);

        let kinds: Vec<_> = evaluate(now(), &snapshot, &HashSet::new())
            .into_iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AlertKind::LeadStale,
                AlertKind::LowStock,
                AlertKind::PurchaseOverdue
            ]
        );
    }
}
