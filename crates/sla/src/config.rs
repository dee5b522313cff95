// SLA engine configuration
//
// Loaded from environment variables, with builder-style overrides for
// embedding and tests.

use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use crate::engine::RuleThresholds;
use crate::error::SlaError;

/// Default refresh period
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

/// Configuration for the alert store and refresh scheduler
#[derive(Debug, Clone)]
pub struct SlaConfig {
    /// Identifies this process in logs
    pub instance_id: String,
    /// Day thresholds for the time-based rules
    pub thresholds: RuleThresholds,
    /// Period between scheduled refreshes
    pub refresh_interval: Duration,
    /// PostgreSQL connection string
    pub database_url: Option<String>,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            instance_id: format!("sla-{}", Uuid::now_v7()),
            thresholds: RuleThresholds::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            database_url: None,
        }
    }
}

impl SlaConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SLA_INSTANCE_ID`: Instance id for logs (default: `sla-<uuid v7>`)
    /// - `SLA_REFRESH_INTERVAL_SECS`: Refresh period (default: 600)
    /// - `SLA_LEAD_STALE_DAYS` / `SLA_LEAD_CRITICAL_DAYS`: default 7 / 14
    /// - `SLA_PROPOSAL_EXPIRED_DAYS` / `SLA_PROPOSAL_CRITICAL_DAYS`: default 15 / 30
    /// - `SLA_PURCHASE_OVERDUE_DAYS`: default 30
    /// - `DATABASE_URL`: PostgreSQL connection string
    pub fn from_env() -> Result<Self, SlaError> {
        let defaults = RuleThresholds::default();

        let thresholds = RuleThresholds {
            lead_stale_days: env_or("SLA_LEAD_STALE_DAYS", defaults.lead_stale_days),
            lead_critical_days: env_or("SLA_LEAD_CRITICAL_DAYS", defaults.lead_critical_days),
            proposal_expired_days: env_or(
                "SLA_PROPOSAL_EXPIRED_DAYS",
                defaults.proposal_expired_days,
            ),
            proposal_critical_days: env_or(
                "SLA_PROPOSAL_CRITICAL_DAYS",
                defaults.proposal_critical_days,
            ),
            purchase_overdue_days: env_or(
                "SLA_PURCHASE_OVERDUE_DAYS",
                defaults.purchase_overdue_days,
            ),
        };

        let refresh_interval = Duration::from_secs(env_or(
            "SLA_REFRESH_INTERVAL_SECS",
            DEFAULT_REFRESH_INTERVAL.as_secs(),
        ));

        let instance_id = std::env::var("SLA_INSTANCE_ID")
            .unwrap_or_else(|_| format!("sla-{}", Uuid::now_v7()));

        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let config = Self {
            instance_id,
            thresholds,
            refresh_interval,
            database_url,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = id.into();
        self
    }

    pub fn with_thresholds(mut self, thresholds: RuleThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn validate(&self) -> Result<(), SlaError> {
        if self.refresh_interval.is_zero() {
            return Err(SlaError::config("refresh interval must be positive"));
        }
        self.thresholds.validate()
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
