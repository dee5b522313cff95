//! Alert types
//!
//! Alerts are recomputed on every pass. The id is a pure function of
//! `(kind, source_reference)`, which is what lets acknowledgements survive
//! re-evaluation without a separate alert table being authoritative.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Kind of SLA breach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// Lead still in intake status past the follow-up window
    LeadStale,
    /// Sent proposal without a response
    ProposalExpired,
    /// Stock balance at or below the reorder point
    LowStock,
    /// Purchase order pending delivery for too long
    PurchaseOverdue,
    /// Reserved; no rule produces it yet
    ProjectDelayed,
}

impl AlertKind {
    /// Prefix of every alert id of this kind
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::LeadStale => "SLA_LEAD_",
            Self::ProposalExpired => "SLA_PROP_",
            Self::LowStock => "SLA_STOCK_",
            Self::PurchaseOverdue => "SLA_PURCHASE_",
            Self::ProjectDelayed => "SLA_PROJECT_",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadStale => "LEAD_STALE",
            Self::ProposalExpired => "PROPOSAL_EXPIRED",
            Self::LowStock => "LOW_STOCK",
            Self::PurchaseOverdue => "PURCHASE_OVERDUE",
            Self::ProjectDelayed => "PROJECT_DELAYED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LEAD_STALE" => Some(Self::LeadStale),
            "PROPOSAL_EXPIRED" => Some(Self::ProposalExpired),
            "LOW_STOCK" => Some(Self::LowStock),
            "PURCHASE_OVERDUE" => Some(Self::PurchaseOverdue),
            "PROJECT_DELAYED" => Some(Self::ProjectDelayed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity, ordered `Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived SLA alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// `<kind prefix><source reference>`, stable across passes
    pub id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    /// Id of the entity that triggered the alert
    pub source_reference: String,
    pub message: String,
    /// When the pass that produced this alert ran (not when the condition began)
    pub detected_at: NaiveDateTime,
    /// Acknowledged by a user; the condition may still hold
    pub resolved: bool,
}

impl Alert {
    /// Deterministic id for a condition
    pub fn id_for(kind: AlertKind, source_reference: &str) -> String {
        format!("{}{}", kind.id_prefix(), source_reference)
    }

    /// Build an unresolved alert; the id is derived from kind and reference
    pub fn new(
        kind: AlertKind,
        severity: Severity,
        source_reference: impl Into<String>,
        message: impl Into<String>,
        detected_at: NaiveDateTime,
    ) -> Self {
        let source_reference = source_reference.into();
        Self {
            id: Self::id_for(kind, &source_reference),
            kind,
            severity,
            source_reference,
            message: message.into(),
            detected_at,
            resolved: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.resolved
    }
}

/// Order alerts for display: most severe first, detection order otherwise
pub fn sort_for_display(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
}

/// Roll-up of a published alert list, as shown on the compliance panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total: usize,
    pub active: usize,
    pub resolved: usize,
    /// Active alerts per severity
    pub active_by_severity: BTreeMap<Severity, usize>,
    /// Active alerts per kind
    pub active_by_kind: BTreeMap<AlertKind, usize>,
    /// Percentage of alerts already acknowledged, 100 when there are none
    pub compliance_index: f64,
}

impl AlertSummary {
    pub fn from_alerts(alerts: &[Alert]) -> Self {
        let total = alerts.len();
        let mut active = 0;
        let mut active_by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        let mut active_by_kind = BTreeMap::new();

        for alert in alerts.iter().filter(|a| a.is_active()) {
            active += 1;
            *active_by_severity.entry(alert.severity).or_default() += 1;
            *active_by_kind.entry(alert.kind).or_default() += 1;
        }

        let compliance_index = (1.0 - active as f64 / total.max(1) as f64) * 100.0;

        Self {
            total,
            active,
            resolved: total - active,
            active_by_severity,
            active_by_kind,
            compliance_index,
        }
    }

    /// Count shown on the header badge
    pub fn badge_count(&self) -> usize {
        self.active
    }

    pub fn active_with_severity(&self, severity: Severity) -> usize {
        self.active_by_severity
            .get(&severity)
            .copied()
            .unwrap_or_default()
    }
}
