use std::sync::Arc;

use anyhow::{Context, Result};
use solardesk_sla::{
    AlertStore, AlertSummary, PostgresAcknowledgementStore, PostgresDocumentSource,
    RefreshScheduler, RuleEngine, Severity, SlaConfig, SystemClock,
};
use sqlx::PgPool;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solardesk_sla=info,solardesk_sla_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        tracing::info!("Loaded .env from {:?}", path);
    }

    let config = SlaConfig::from_env().context("Invalid SLA configuration")?;
    tracing::info!(
        instance_id = %config.instance_id,
        refresh_interval_secs = config.refresh_interval.as_secs(),
        purchase_overdue_days = config.thresholds.purchase_overdue_days,
        "solardesk-sla-worker starting..."
    );

    let database_url = config
        .database_url
        .clone()
        .context("DATABASE_URL must be set")?;
    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let ledger = PostgresAcknowledgementStore::new(pool.clone());
    ledger.migrate().await.context("Failed to apply SLA schema")?;

    let store = Arc::new(AlertStore::new(
        Arc::new(PostgresDocumentSource::new(pool)),
        Arc::new(ledger),
        RuleEngine::new(config.thresholds.clone()),
        Arc::new(SystemClock),
    ));

    let mut published = store.subscribe();
    let reporter = tokio::spawn(async move {
        while published.changed().await.is_ok() {
            let summary = AlertSummary::from_alerts(&published.borrow_and_update());
            log_summary(&summary);
        }
    });

    let (active_tx, active_rx) = watch::channel(true);
    let handle = RefreshScheduler::new(Arc::clone(&store), config.refresh_interval).spawn(active_rx);

    tracing::info!("Worker ready, waiting for shutdown signal...");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");

    active_tx.send_replace(false);
    handle.shutdown().await;
    reporter.abort();

    tracing::info!("Worker shutdown complete");
    Ok(())
}

fn log_summary(summary: &AlertSummary) {
    tracing::info!(
        total = summary.total,
        active = summary.active,
        critical = summary.active_with_severity(Severity::Critical),
        high = summary.active_with_severity(Severity::High),
        compliance_index = summary.compliance_index,
        "SLA alerts updated"
    );
}
