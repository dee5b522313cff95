//! Ordered threshold tables mapping a measured value to a severity

use serde::{Deserialize, Serialize};

use crate::alert::Severity;

/// How a tier compares the measured value against its bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// `value > bound` (elapsed-time rules)
    GreaterThan,
    /// `value <= bound` (balance rules)
    AtMost,
}

impl Comparison {
    fn matches(&self, value: f64, bound: f64) -> bool {
        match self {
            Self::GreaterThan => value > bound,
            Self::AtMost => value <= bound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub comparison: Comparison,
    pub bound: f64,
    pub severity: Severity,
}

/// Tiers are checked in insertion order and the first match wins, so the
/// most severe tier goes first. No match means no alert.
///
/// ```
/// use solardesk_sla::engine::SeverityTable;
/// use solardesk_sla::Severity;
///
/// let table = SeverityTable::new()
///     .above(14.0, Severity::Critical)
///     .above(7.0, Severity::High);
///
/// assert_eq!(table.classify(7.0), None);
/// assert_eq!(table.classify(8.0), Some(Severity::High));
/// assert_eq!(table.classify(15.0), Some(Severity::Critical));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityTable {
    tiers: Vec<Tier>,
}

impl SeverityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier
    pub fn tier(mut self, comparison: Comparison, bound: f64, severity: Severity) -> Self {
        self.tiers.push(Tier {
            comparison,
            bound,
            severity,
        });
        self
    }

    /// Append a `value > bound` tier
    pub fn above(self, bound: f64, severity: Severity) -> Self {
        self.tier(Comparison::GreaterThan, bound, severity)
    }

    /// Append a `value <= bound` tier
    pub fn at_most(self, bound: f64, severity: Severity) -> Self {
        self.tier(Comparison::AtMost, bound, severity)
    }

    pub fn classify(&self, value: f64) -> Option<Severity> {
        self.tiers
            .iter()
            .find(|tier| tier.comparison.matches(value, tier.bound))
            .map(|tier| tier.severity)
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }
}
