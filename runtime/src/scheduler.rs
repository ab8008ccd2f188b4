//! Background reconciliation of rating aggregates.
//!
//! The write path recomputes a recipe's aggregate after every rating change,
//! but a failed recompute or two interleaved writes can leave it stale. The
//! [`ReconciliationScheduler`] repairs that by periodically recomputing every
//! active recipe.
//!
//! # Lifecycle
//!
//! ```text
//!            start()               stop()              sweep task joined
//! Stopped ───────────► Running ───────────► Stopping ───────────────────► Stopped
//! ```
//!
//! - `start()` on a running (or stopping) scheduler fails with
//!   [`SchedulerError::AlreadyRunning`].
//! - `stop()` on a stopped scheduler is a no-op.
//! - The stop signal is observed while waiting for the next tick and between
//!   per-recipe recomputes. A recompute already in flight completes; no new
//!   one starts.
//! - Ticks missed while a sweep overran are skipped, not replayed.
//! - Nothing is persisted between runs: after a restart the first sweep
//!   happens one full interval later.

use crate::aggregate::RatingAggregateMaintainer;
use crate::metrics::ReconcileMetrics;
use recipebox_core::store::RatingAggregateStore;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default time between sweeps.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Errors from scheduler lifecycle operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// `start()` was called while a sweep task is alive.
    #[error("Reconciliation scheduler is already running")]
    AlreadyRunning,
}

/// Lifecycle state of a [`ReconciliationScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No sweep task exists.
    Stopped,
    /// The sweep task is waiting for a tick or sweeping.
    Running,
    /// Stop was requested; the sweep task is finishing.
    Stopping,
}

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between sweeps
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }
}

impl SchedulerConfig {
    /// Create a config with the default interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time between sweeps. A zero interval is raised to one millisecond.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Active recipes listed at the start of the sweep
    pub recipes: usize,
    /// Recipes whose aggregate was recomputed
    pub recomputed: usize,
    /// Recipes whose recompute failed
    pub failed: usize,
    /// Whether a stop request cut the sweep short
    pub interrupted: bool,
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    state: SchedulerState,
    worker: Option<Worker>,
}

/// Periodically recomputes the aggregate of every active recipe.
///
/// One value owns at most one sweep task. Construct a single scheduler per
/// process.
pub struct ReconciliationScheduler<S> {
    maintainer: Arc<RatingAggregateMaintainer<S>>,
    config: SchedulerConfig,
    inner: Mutex<Inner>,
}

impl<S> ReconciliationScheduler<S>
where
    S: RatingAggregateStore + 'static,
{
    /// Create a stopped scheduler.
    #[must_use]
    pub const fn new(maintainer: Arc<RatingAggregateMaintainer<S>>, config: SchedulerConfig) -> Self {
        Self {
            maintainer,
            config,
            inner: Mutex::new(Inner {
                state: SchedulerState::Stopped,
                worker: None,
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.lock().state
    }

    /// Configured settings.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Spawn the sweep task. The first sweep runs one interval from now.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] unless the scheduler is
    /// stopped.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut inner = self.lock();
        if inner.state != SchedulerState::Stopped {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let maintainer = Arc::clone(&self.maintainer);
        let interval = self.config.interval;
        let handle = tokio::spawn(run(maintainer, interval, shutdown_rx));

        inner.worker = Some(Worker { shutdown, handle });
        inner.state = SchedulerState::Running;
        tracing::info!(interval = ?interval, "Reconciliation scheduler started");
        Ok(())
    }

    /// Request a stop and wait for the sweep task to finish.
    ///
    /// A recompute in flight completes before this returns. Calling `stop`
    /// on a stopped scheduler, or while another `stop` is in progress, returns
    /// immediately.
    pub async fn stop(&self) {
        let worker = {
            let mut inner = self.lock();
            if inner.state != SchedulerState::Running {
                return;
            }
            inner.state = SchedulerState::Stopping;
            inner.worker.take()
        };

        tracing::info!("Stopping reconciliation scheduler");
        if let Some(worker) = worker {
            // The receiver lives as long as the task; a send error means it already exited.
            let _ = worker.shutdown.send(true);
            if let Err(e) = worker.handle.await {
                tracing::error!(error = %e, "Reconciliation task ended abnormally");
            }
        }

        self.lock().state = SchedulerState::Stopped;
        tracing::info!("Reconciliation scheduler stopped");
    }

    /// Run one sweep on the caller's task, independent of the timer.
    ///
    /// Intended for startup repair and administrative use. It does not
    /// observe the stop signal of a running sweep task.
    pub async fn run_sweep_once(&self) -> SweepReport {
        let (_keep_open, shutdown) = watch::channel(false);
        sweep(&self.maintainer, &shutdown).await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> std::fmt::Debug for ReconciliationScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self
            .inner
            .lock()
            .map_or(SchedulerState::Stopping, |inner| inner.state);
        f.debug_struct("ReconciliationScheduler")
            .field("config", &self.config)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

async fn run<S>(
    maintainer: Arc<RatingAggregateMaintainer<S>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    S: RatingAggregateStore,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !*shutdown.borrow() {
        tokio::select! {
            _ = ticker.tick() => {
                let report = sweep(&maintainer, &shutdown).await;
                if report.interrupted {
                    break;
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::debug!("Shutdown signal received");
                    break;
                }
            }
        }
    }
}

async fn sweep<S>(
    maintainer: &RatingAggregateMaintainer<S>,
    shutdown: &watch::Receiver<bool>,
) -> SweepReport
where
    S: RatingAggregateStore,
{
    let started = Instant::now();
    tracing::info!("Reconciliation sweep starting");

    let recipe_ids = match maintainer.store().list_active_recipe_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list active recipes, skipping sweep");
            ReconcileMetrics::record_sweep(started.elapsed(), 0);
            return SweepReport::default();
        }
    };

    let mut report = SweepReport {
        recipes: recipe_ids.len(),
        ..SweepReport::default()
    };

    for recipe_id in recipe_ids {
        if *shutdown.borrow() {
            report.interrupted = true;
            tracing::info!(
                recomputed = report.recomputed,
                remaining = report.recipes - report.recomputed - report.failed,
                "Stop requested, abandoning sweep"
            );
            break;
        }

        match maintainer.recompute(recipe_id).await {
            Ok(_) => report.recomputed += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(recipe_id = %recipe_id, error = %e, "Failed to reconcile recipe rating");
            }
        }
    }

    ReconcileMetrics::record_sweep(started.elapsed(), report.failed);
    tracing::info!(
        recipes = report.recipes,
        recomputed = report.recomputed,
        failed = report.failed,
        interrupted = report.interrupted,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Reconciliation sweep finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_six_hours() {
        assert_eq!(SchedulerConfig::default().interval, Duration::from_secs(21_600));
    }

    #[test]
    fn zero_interval_is_raised() {
        let config = SchedulerConfig::new().with_interval(Duration::ZERO);
        assert_eq!(config.interval, Duration::from_millis(1));
    }

    #[test]
    fn already_running_message() {
        assert_eq!(
            SchedulerError::AlreadyRunning.to_string(),
            "Reconciliation scheduler is already running"
        );
    }
}
