//! Refresh scheduler
//!
//! Drives [`AlertStore::refresh_if`] on a fixed period while an activation
//! signal is `true`:
//!
//! ```text
//! Inactive ──activate──▶ Fetching ──pass done──▶ Published
//!    ▲                      ▲                        │
//!    │                      └──────tick/trigger──────┘
//!    └────────────deactivate (any state)─────────────┘
//! ```
//!
//! A pass runs immediately on activation, then once per interval. Missed
//! ticks are skipped rather than bunched. Deactivation cancels the pending
//! tick; a pass still running when it happens completes but is not
//! published.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_REFRESH_INTERVAL;
use crate::store::{AlertStore, RefreshOutcome};

/// Observable state of the refresh loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Activation signal is false, or the loop has stopped
    Inactive,
    /// A pass is running
    Fetching,
    /// Waiting for the next tick; the store holds the latest list
    Published,
}

/// Periodic refresh of an [`AlertStore`]
pub struct RefreshScheduler {
    store: Arc<AlertStore>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(store: Arc<AlertStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Scheduler with the default ten minute period
    pub fn with_default_interval(store: Arc<AlertStore>) -> Self {
        Self::new(store, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the loop on the current runtime
    ///
    /// `active` gates scheduling: passes only run while it holds `true`.
    /// Dropping its sender stops the loop.
    pub fn spawn(self, active: watch::Receiver<bool>) -> RefreshHandle {
        let (state_tx, state_rx) = watch::channel(RefreshState::Inactive);
        let (trigger_tx, trigger_rx) = watch::channel(());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let refresh_loop = RefreshLoop {
            store: self.store,
            interval: self.interval,
            active,
            trigger: trigger_rx,
            shutdown: shutdown_rx,
            state: state_tx,
        };
        let task = tokio::spawn(refresh_loop.run());

        RefreshHandle {
            state: state_rx,
            trigger: trigger_tx,
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Control handle for a spawned [`RefreshScheduler`]
///
/// Dropping the handle stops the loop.
pub struct RefreshHandle {
    state: watch::Receiver<RefreshState>,
    trigger: watch::Sender<()>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Current loop state
    pub fn state(&self) -> RefreshState {
        *self.state.borrow()
    }

    /// Receiver for state transitions
    pub fn watch_state(&self) -> watch::Receiver<RefreshState> {
        self.state.clone()
    }

    /// Request an out-of-band pass
    ///
    /// Runs as soon as the loop is idle and restarts the period. Requests
    /// made while inactive are dropped; activation always runs a pass.
    pub fn trigger(&self) {
        self.trigger.send_replace(());
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit
    ///
    /// A pass in flight is abandoned without publishing.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Refresh loop ended abnormally");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Stop,
}

struct RefreshLoop {
    store: Arc<AlertStore>,
    interval: Duration,
    active: watch::Receiver<bool>,
    trigger: watch::Receiver<()>,
    shutdown: watch::Receiver<bool>,
    state: watch::Sender<RefreshState>,
}

impl RefreshLoop {
    async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Refresh loop started"
        );

        loop {
            let active = *self.active.borrow_and_update();
            let step = if active {
                self.run_active().await
            } else {
                self.wait_for_activation().await
            };
            if step == Step::Stop {
                break;
            }
        }

        self.state.send_replace(RefreshState::Inactive);
        info!("Refresh loop stopped");
    }

    async fn wait_for_activation(&mut self) -> Step {
        self.state.send_replace(RefreshState::Inactive);

        tokio::select! {
            changed = self.active.changed() => {
                if changed.is_err() {
                    debug!("Activation signal closed");
                    return Step::Stop;
                }
                Step::Continue
            }
            _ = self.shutdown.changed() => Step::Stop,
        }
    }

    /// Tick until deactivated or stopped
    async fn run_active(&mut self) -> Step {
        debug!("Refresh loop activated");
        self.trigger.borrow_and_update();

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = self.trigger.changed() => {
                    if changed.is_err() {
                        return Step::Stop;
                    }
                    debug!("Refresh requested");
                    ticker.reset();
                }
                changed = self.active.changed() => {
                    if changed.is_err() {
                        debug!("Activation signal closed");
                        return Step::Stop;
                    }
                    if !*self.active.borrow_and_update() {
                        debug!("Refresh loop deactivated");
                        return Step::Continue;
                    }
                    continue;
                }
                _ = self.shutdown.changed() => return Step::Stop,
            }

            if self.pass().await == Step::Stop {
                return Step::Stop;
            }
            if !*self.active.borrow() {
                return Step::Continue;
            }
        }
    }

    async fn pass(&mut self) -> Step {
        self.state.send_replace(RefreshState::Fetching);

        let active = &self.active;
        let store = &self.store;
        let outcome = tokio::select! {
            outcome = store.refresh_if(|| *active.borrow()) => outcome,
            _ = self.shutdown.changed() => {
                debug!("Shutdown during refresh, abandoning pass");
                return Step::Stop;
            }
        };

        let next = match outcome {
            Ok(RefreshOutcome::Published(report)) => {
                debug!(
                    total = report.total,
                    active = report.active,
                    "Refresh pass published"
                );
                RefreshState::Published
            }
            Ok(RefreshOutcome::Skipped) => {
                debug!("Refresh pass skipped, another pass in flight");
                RefreshState::Published
            }
            Ok(RefreshOutcome::Discarded) => RefreshState::Inactive,
            Err(e) => {
                warn!(error = %e, "Refresh pass failed, retrying on next tick");
                RefreshState::Published
            }
        };
        self.state.send_replace(next);
        Step::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::InMemoryAcknowledgementStore;
    use crate::engine::RuleEngine;
    use crate::model::{Collection, Lead, LeadStatus};
    use crate::source::InMemorySnapshotSource;
    use crate::store::FixedClock;
    use chrono::NaiveDate;

    const INTERVAL: Duration = Duration::from_secs(600);

    fn setup() -> (Arc<InMemorySnapshotSource>, Arc<AlertStore>) {
        let source = Arc::new(InMemorySnapshotSource::new());
        source.set_leads(vec![Lead::new("L-1", "A", LeadStatus::New, "01/10/2026")]);
        let now = NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let store = Arc::new(AlertStore::new(
            source.clone(),
            Arc::new(InMemoryAcknowledgementStore::new()),
            RuleEngine::default(),
            Arc::new(FixedClock::new(now)),
        ));
        (source, store)
    }

    async fn wait_for(handle: &RefreshHandle, expected: RefreshState) {
        handle
            .watch_state()
            .wait_for(|s| *s == expected)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_immediately_then_periodically() {
        let (source, store) = setup();
        let (_active_tx, active_rx) = watch::channel(true);
        let handle = RefreshScheduler::new(store.clone(), INTERVAL).spawn(active_rx);

        wait_for(&handle, RefreshState::Published).await;
        assert_eq!(source.fetch_count(), Collection::ALL.len());
        assert_eq!(store.alerts().len(), 1);

        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(source.fetch_count(), 2 * Collection::ALL.len());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_until_activated() {
        let (source, store) = setup();
        let (active_tx, active_rx) = watch::channel(false);
        let handle = RefreshScheduler::new(store.clone(), INTERVAL).spawn(active_rx);

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(handle.state(), RefreshState::Inactive);
        assert_eq!(source.fetch_count(), 0);

        active_tx.send_replace(true);
        wait_for(&handle, RefreshState::Published).await;
        assert_eq!(store.alerts().len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivation_cancels_ticks() {
        let (source, store) = setup();
        let (active_tx, active_rx) = watch::channel(true);
        let handle = RefreshScheduler::new(store, INTERVAL).spawn(active_rx);
        wait_for(&handle, RefreshState::Published).await;

        active_tx.send_replace(false);
        wait_for(&handle, RefreshState::Inactive).await;
        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(source.fetch_count(), Collection::ALL.len());

        active_tx.send_replace(true);
        wait_for(&handle, RefreshState::Published).await;
        assert_eq!(source.fetch_count(), 2 * Collection::ALL.len());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_pass_is_discarded() {
        let (source, store) = setup();
        source.set_latency(Some(Duration::from_secs(10)));
        let (active_tx, active_rx) = watch::channel(true);
        let handle = RefreshScheduler::new(store.clone(), INTERVAL).spawn(active_rx);

        wait_for(&handle, RefreshState::Fetching).await;
        active_tx.send_replace(false);
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(handle.state(), RefreshState::Inactive);
        assert!(store.alerts().is_empty());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_runs_out_of_band_pass() {
        let (source, store) = setup();
        let (_active_tx, active_rx) = watch::channel(true);
        let handle = RefreshScheduler::new(store.clone(), INTERVAL).spawn(active_rx);
        wait_for(&handle, RefreshState::Published).await;

        source.set_leads(vec![
            Lead::new("L-1", "A", LeadStatus::New, "01/10/2026"),
            Lead::new("L-2", "B", LeadStatus::New, "01/10/2026"),
        ]);
        handle.trigger();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(source.fetch_count(), 2 * Collection::ALL.len());
        assert_eq!(store.alerts().len(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pass_keeps_schedule() {
        let (source, store) = setup();
        for collection in Collection::ALL {
            source.fail(collection);
        }
        let (_active_tx, active_rx) = watch::channel(true);
        let handle = RefreshScheduler::new(store.clone(), INTERVAL).spawn(active_rx);

        wait_for(&handle, RefreshState::Published).await;
        assert!(store.alerts().is_empty());

        for collection in Collection::ALL {
            source.recover(collection);
        }
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(source.fetch_count(), 2 * Collection::ALL.len());
        assert_eq!(store.alerts().len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let (source, store) = setup();
        let (_active_tx, active_rx) = watch::channel(true);
        let handle = RefreshScheduler::new(store, INTERVAL).spawn(active_rx);
        wait_for(&handle, RefreshState::Published).await;

        let state = handle.watch_state();
        handle.shutdown().await;
        assert_eq!(*state.borrow(), RefreshState::Inactive);

        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(source.fetch_count(), Collection::ALL.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_activation_signal_stops_loop() {
        let (_source, store) = setup();
        let (active_tx, active_rx) = watch::channel(false);
        let handle = RefreshScheduler::with_default_interval(store).spawn(active_rx);

        drop(active_tx);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.is_finished());
    }
}
