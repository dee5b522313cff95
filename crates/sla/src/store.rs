//! Alert store
//!
//! Owns the published alert list and the cache of acknowledged ids, and runs
//! refresh passes: fetch snapshot, evaluate, reload acknowledgements for the
//! evaluated ids, publish. Overlapping passes are never interleaved; a pass
//! that finds another one in flight returns [`RefreshOutcome::Skipped`].
//!
//! Acknowledgements the ledger rejected stay pending and are written again at
//! the start of every pass until one succeeds.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::ack::AcknowledgementStore;
use crate::alert::{Alert, AlertSummary};
use crate::engine::{apply_acknowledgements, RuleEngine};
use crate::error::{Result, SlaError};
use crate::model::Collection;
use crate::source::{fetch_snapshot, SnapshotSource};

/// Source of the evaluation instant
pub trait Clock: Send + Sync {
    /// Local wall-clock time
    fn now(&self) -> NaiveDateTime;
}

/// Local system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.read()
    }
}

/// What a refresh pass produced
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub evaluated_at: NaiveDateTime,
    pub total: usize,
    pub active: usize,
    /// Collections whose alerts are missing from this pass
    pub failed_collections: Vec<Collection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A new list was published
    Published(RefreshReport),
    /// Another pass was already in flight
    Skipped,
    /// The pass completed but was no longer wanted; nothing was published
    Discarded,
}

impl RefreshOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }
}

/// Clears the in-flight flag when the pass ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Published alerts plus acknowledgement state
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use solardesk_sla::prelude::*;
///
/// let store = AlertStore::new(
///     Arc::new(InMemorySnapshotSource::new()),
///     Arc::new(InMemoryAcknowledgementStore::new()),
///     RuleEngine::default(),
///     Arc::new(SystemClock),
/// );
///
/// store.refresh().await?;
/// store.acknowledge("SLA_STOCK_I-1").await?;
/// ```
pub struct AlertStore {
    source: Arc<dyn SnapshotSource>,
    ledger: Arc<dyn AcknowledgementStore>,
    engine: RuleEngine,
    clock: Arc<dyn Clock>,
    acknowledged: RwLock<HashSet<String>>,
    /// Acknowledgements not yet written to the ledger
    pending: RwLock<HashMap<String, DateTime<Utc>>>,
    in_flight: AtomicBool,
    published: watch::Sender<Arc<[Alert]>>,
}

impl AlertStore {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        ledger: Arc<dyn AcknowledgementStore>,
        engine: RuleEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (published, _) = watch::channel(Arc::from(Vec::new()));
        Self {
            source,
            ledger,
            engine,
            clock,
            acknowledged: RwLock::new(HashSet::new()),
            pending: RwLock::new(HashMap::new()),
            in_flight: AtomicBool::new(false),
            published,
        }
    }

    /// Mark an alert as handled
    ///
    /// Idempotent. The cache is updated immediately and the acknowledgement
    /// is written to the ledger; the published list only reflects it after
    /// the next pass. If the write fails the error is returned and the
    /// acknowledgement stays pending: it still applies, and every following
    /// pass writes it again until the ledger accepts it.
    #[instrument(skip(self))]
    pub async fn acknowledge(&self, alert_id: &str) -> Result<()> {
        let alert_id = alert_id.trim();
        if alert_id.is_empty() {
            return Err(SlaError::EmptyAlertId);
        }

        let newly_acknowledged = self.acknowledged.write().insert(alert_id.to_string());
        if !newly_acknowledged {
            debug!("Alert already acknowledged");
        }

        let at = Utc::now();
        if let Err(e) = self.ledger.acknowledge(alert_id, at).await {
            warn!(error = %e, "Failed to persist acknowledgement, keeping it pending");
            self.pending
                .write()
                .entry(alert_id.to_string())
                .or_insert(at);
            return Err(SlaError::Store(e));
        }
        self.pending.write().remove(alert_id);

        info!("Alert acknowledged");
        Ok(())
    }

    /// Run a pass and publish its result
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        self.refresh_if(|| true).await
    }

    /// Run a pass, publishing only if `still_wanted()` holds once evaluation is done
    ///
    /// `still_wanted()` is checked again after the ledger write, immediately
    /// before publishing. The scheduler uses this to drop passes that finish
    /// after it went inactive.
    #[instrument(skip(self, still_wanted))]
    pub async fn refresh_if<F>(&self, still_wanted: F) -> Result<RefreshOutcome>
    where
        F: Fn() -> bool + Send,
    {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Refresh already in flight, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        let (snapshot, failures) = fetch_snapshot(self.source.as_ref()).await;
        let failed_collections: Vec<Collection> = failures.into_iter().map(|(c, _)| c).collect();
        if failed_collections.len() == Collection::ALL.len() {
            warn!("Every collection failed, keeping previous alerts");
            return Err(SlaError::AllSourcesUnavailable);
        }

        let evaluated_at = self.clock.now();
        let mut alerts = self
            .engine
            .evaluate(evaluated_at, &snapshot, &HashSet::new());

        self.flush_pending().await;
        let acknowledged = self.sync_acknowledged(&alerts).await;
        apply_acknowledgements(&mut alerts, &acknowledged);

        if !still_wanted() {
            debug!(count = alerts.len(), "Refresh no longer wanted, discarding");
            return Ok(RefreshOutcome::Discarded);
        }

        if let Err(e) = self.ledger.record_alerts(&alerts).await {
            warn!(error = %e, "Failed to record alerts in ledger");
        }

        if !still_wanted() {
            debug!(
                count = alerts.len(),
                "Refresh no longer wanted after recording, discarding"
            );
            return Ok(RefreshOutcome::Discarded);
        }

        let report = RefreshReport {
            evaluated_at,
            total: alerts.len(),
            active: alerts.iter().filter(|a| a.is_active()).count(),
            failed_collections,
        };
        self.published.send_replace(Arc::from(alerts));

        info!(
            total = report.total,
            active = report.active,
            failed = report.failed_collections.len(),
            "Published alerts"
        );
        Ok(RefreshOutcome::Published(report))
    }

    /// Write pending acknowledgements to the ledger, stopping at the first failure
    async fn flush_pending(&self) {
        let pending: Vec<(String, DateTime<Utc>)> = self
            .pending
            .read()
            .iter()
            .map(|(id, at)| (id.clone(), *at))
            .collect();

        for (alert_id, at) in pending {
            match self.ledger.acknowledge(&alert_id, at).await {
                Ok(()) => {
                    self.pending.write().remove(&alert_id);
                    info!(%alert_id, "Persisted pending acknowledgement");
                }
                Err(e) => {
                    warn!(%alert_id, error = %e, "Pending acknowledgement still not persisted");
                    break;
                }
            }
        }
    }

    /// Reload acknowledgements for the evaluated alerts and return the cache
    ///
    /// Only ids in `alerts` are read from the ledger, and the cache is trimmed
    /// to those ids plus pending ones. Falls back to the cache alone when the
    /// ledger cannot be read.
    async fn sync_acknowledged(&self, alerts: &[Alert]) -> HashSet<String> {
        let ids: Vec<String> = alerts.iter().map(|a| a.id.clone()).collect();
        match self.ledger.acknowledged_among(&ids).await {
            Ok(persisted) => {
                let pending: HashSet<String> = self.pending.read().keys().cloned().collect();
                let evaluated: HashSet<&str> = ids.iter().map(String::as_str).collect();
                let mut cache = self.acknowledged.write();
                cache.retain(|id| evaluated.contains(id.as_str()) || pending.contains(id));
                cache.extend(persisted);
                cache.clone()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load acknowledgements, using cached set");
                self.acknowledged.read().clone()
            }
        }
    }

    /// The last published list
    pub fn alerts(&self) -> Arc<[Alert]> {
        self.published.borrow().clone()
    }

    /// Published alerts not yet acknowledged
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts()
            .iter()
            .filter(|a| a.is_active())
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> AlertSummary {
        AlertSummary::from_alerts(&self.alerts())
    }

    /// Receiver notified on every publication
    pub fn subscribe(&self) -> watch::Receiver<Arc<[Alert]>> {
        self.published.subscribe()
    }

    /// Whether `alert_id` is in the acknowledgement cache
    pub fn is_acknowledged(&self, alert_id: &str) -> bool {
        self.acknowledged.read().contains(alert_id)
    }

    /// Number of acknowledgements waiting to be written to the ledger
    pub fn pending_acknowledgements(&self) -> usize {
        self.pending.read().len()
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }
}
