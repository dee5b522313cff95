//! The individual SLA rules
//!
//! Each rule yields at most one alert per qualifying record. Records whose
//! dates cannot be parsed are skipped with a warning.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::warn;

use super::severity::SeverityTable;
use crate::alert::{Alert, AlertKind, Severity};
use crate::dates::{days_elapsed, parse_calendar_date};
use crate::model::{
    Collection, DeliveryStatus, InventoryItem, InventoryMovement, Lead, LeadStatus, Proposal,
    ProposalStatus, PurchaseOrder,
};

/// Days since `raw`, or `None` (logged) when the date is malformed
fn age_in_days(
    now: NaiveDateTime,
    raw: &str,
    collection: Collection,
    record_id: &str,
) -> Option<i64> {
    match parse_calendar_date(raw) {
        Ok(date) => Some(days_elapsed(now, date)),
        Err(e) => {
            warn!(%collection, record_id, error = %e, "Skipping record with unparseable date");
            None
        }
    }
}

/// Leads still `NEW` past the follow-up window
pub fn stale_leads(leads: &[Lead], now: NaiveDateTime, table: &SeverityTable) -> Vec<Alert> {
    leads
        .iter()
        .filter(|lead| lead.status == LeadStatus::New)
        .filter_map(|lead| {
            let days = age_in_days(now, &lead.entry_date, Collection::Leads, &lead.id)?;
            let severity = table.classify(days as f64)?;
            Some(Alert::new(
                AlertKind::LeadStale,
                severity,
                &lead.id,
                format!("Lead \"{}\" has had no activity for {} days", lead.name, days),
                now,
            ))
        })
        .collect()
}

/// Sent proposals still waiting for an answer
pub fn expired_proposals(
    proposals: &[Proposal],
    now: NaiveDateTime,
    table: &SeverityTable,
) -> Vec<Alert> {
    proposals
        .iter()
        .filter(|proposal| proposal.status == ProposalStatus::Sent)
        .filter_map(|proposal| {
            let days = age_in_days(now, &proposal.sent_date, Collection::Proposals, &proposal.id)?;
            let severity = table.classify(days as f64)?;
            Some(Alert::new(
                AlertKind::ProposalExpired,
                severity,
                &proposal.id,
                format!(
                    "Proposal \"{}\" has had no response for {} days",
                    proposal.id, days
                ),
                now,
            ))
        })
        .collect()
}

/// Net balance per item id: entries minus exits
pub fn stock_balances(movements: &[InventoryMovement]) -> HashMap<&str, f64> {
    let mut balances: HashMap<&str, f64> = HashMap::new();
    for movement in movements {
        *balances.entry(movement.item_id.as_str()).or_default() += movement.signed_quantity();
    }
    balances
}

/// Items whose balance has fallen to the reorder point
///
/// An item with no movements has a balance of zero. Nothing is raised while
/// the balance is above the reorder point, even for a negative reorder point.
pub fn low_stock(
    items: &[InventoryItem],
    movements: &[InventoryMovement],
    now: NaiveDateTime,
) -> Vec<Alert> {
    let balances = stock_balances(movements);

    items
        .iter()
        .filter_map(|item| {
            let balance = balances.get(item.id.as_str()).copied().unwrap_or_default();
            if balance > item.reorder_point {
                return None;
            }
            let severity = low_stock_table(item.reorder_point).classify(balance)?;
            Some(Alert::new(
                AlertKind::LowStock,
                severity,
                &item.id,
                format!(
                    "Stock of \"{}\" is low: {} {} (reorder point: {})",
                    item.name, balance, item.unit, item.reorder_point
                ),
                now,
            ))
        })
        .collect()
}

/// Severity tiers for an item with the given reorder point
pub fn low_stock_table(reorder_point: f64) -> SeverityTable {
    SeverityTable::new()
        .at_most(0.0, Severity::Critical)
        .at_most(reorder_point, Severity::High)
}

/// Purchase orders still pending delivery
pub fn overdue_purchases(
    orders: &[PurchaseOrder],
    now: NaiveDateTime,
    table: &SeverityTable,
) -> Vec<Alert> {
    orders
        .iter()
        .filter(|order| order.delivery_status == DeliveryStatus::Pending)
        .filter_map(|order| {
            let days = age_in_days(now, &order.order_date, Collection::PurchaseOrders, &order.id)?;
            let severity = table.classify(days as f64)?;
            Some(Alert::new(
                AlertKind::PurchaseOverdue,
                severity,
                &order.id,
                format!(
                    "Purchase order \"{}\" has been pending for {} days",
                    order.id, days
                ),
                now,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    fn lead_table() -> SeverityTable {
        SeverityTable::new()
            .above(14.0, Severity::Critical)
            .above(7.0, Severity::High)
    }

    #[test]
    fn test_stale_lead_message_and_severity() {
        let leads = vec![Lead::new("L-1", "Padaria Sol", LeadStatus::New, "08/10/2026")];
        let alerts = stale_leads(&leads, now(), &lead_table());

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[0].source_reference, "L-1");
        assert_eq!(
            alerts[0].message,
            "Lead \"Padaria Sol\" has had no activity for 10 days"
        );
        assert_eq!(alerts[0].detected_at, now());
    }

    #[test]
    fn test_qualified_lead_never_goes_stale() {
        let leads = vec![Lead::new("L-1", "Old", LeadStatus::Qualified, "01/01/2020")];
        assert!(stale_leads(&leads, now(), &lead_table()).is_empty());
    }

    #[test]
    fn test_malformed_date_skips_only_that_record() {
        let leads = vec![
            Lead::new("L-bad", "Broken", LeadStatus::New, "2026-10-01"),
            Lead::new("L-ok", "Fine", LeadStatus::New, "01/10/2026"),
        ];
        let alerts = stale_leads(&leads, now(), &lead_table());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].source_reference, "L-ok");
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn test_proposal_with_time_suffix() {
        let table = SeverityTable::new()
            .above(30.0, Severity::Critical)
            .above(15.0, Severity::Medium);
        let proposals = vec![
            Proposal::new("P-1", ProposalStatus::Sent, "28/09/2026 16:45"),
            Proposal::new("P-2", ProposalStatus::Approved, "01/01/2026"),
        ];
        let alerts = expired_proposals(&proposals, now(), &table);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "SLA_PROP_P-1");
        assert_eq!(alerts[0].severity, Severity::Medium);
        assert!(alerts[0].message.contains("20 days"));
    }

    #[test]
    fn test_stock_balances_ignore_other_items() {
        let movements = vec![
            InventoryMovement::entry("I-1", 10.0),
            InventoryMovement::exit("I-1", 3.5),
            InventoryMovement::entry("I-2", 7.0),
        ];
        let balances = stock_balances(&movements);
        assert_eq!(balances.get("I-1"), Some(&6.5));
        assert_eq!(balances.get("I-2"), Some(&7.0));
    }

    #[test]
    fn test_item_without_movements_is_critical() {
        let items = vec![InventoryItem::new("I-9", "Inverter 5kW", "un", 2.0)];
        let alerts = low_stock(&items, &[], now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(
            alerts[0].message,
            "Stock of \"Inverter 5kW\" is low: 0 un (reorder point: 2)"
        );
    }

    #[test]
    fn test_negative_balance_is_critical() {
        let items = vec![InventoryItem::new("I-1", "Cable", "m", 50.0)];
        let movements = vec![
            InventoryMovement::entry("I-1", 10.0),
            InventoryMovement::exit("I-1", 12.0),
        ];
        let alerts = low_stock(&items, &movements, now());
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn test_balance_above_negative_reorder_point_is_not_low() {
        let items = vec![InventoryItem::new("I-1", "Backorder slot", "un", -5.0)];
        assert!(low_stock(&items, &[], now()).is_empty());

        let movements = vec![InventoryMovement::exit("I-1", 6.0)];
        let alerts = low_stock(&items, &movements, now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn test_malformed_proposal_date_skips_only_that_record() {
        let table = SeverityTable::new()
            .above(30.0, Severity::Critical)
            .above(15.0, Severity::Medium);
        let proposals = vec![
            Proposal::new("P-bad", ProposalStatus::Sent, "31/02/2026"),
            Proposal::new("P-empty", ProposalStatus::Sent, ""),
            Proposal::new("P-ok", ProposalStatus::Sent, "01/09/2026"),
        ];
        let alerts = expired_proposals(&proposals, now(), &table);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].source_reference, "P-ok");
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn test_malformed_order_date_skips_only_that_record() {
        let table = SeverityTable::new().above(30.0, Severity::Medium);
        let orders = vec![
            PurchaseOrder::new("C-bad", DeliveryStatus::Pending, "2026/01/01"),
            PurchaseOrder::new("C-ok", DeliveryStatus::Pending, "01/01/2026"),
        ];
        let alerts = overdue_purchases(&orders, now(), &table);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].source_reference, "C-ok");
    }

    #[test]
    fn test_purchase_overdue_is_medium_only() {
        let table = SeverityTable::new().above(30.0, Severity::Medium);
        let orders = vec![
            PurchaseOrder::new("C-1", DeliveryStatus::Pending, "01/01/2026"),
            PurchaseOrder::new("C-2", DeliveryStatus::Pending, "18/09/2026"),
            PurchaseOrder::new("C-3", DeliveryStatus::Delivered, "01/01/2026"),
        ];
        let alerts = overdue_purchases(&orders, now(), &table);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "SLA_PURCHASE_C-1");
        assert_eq!(alerts[0].severity, Severity::Medium);
    }
}
