use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::executor::MonitoringExecutor;
use super::types::CheckOutcome;
use crate::database::Database;
use crate::error::MonitorError;

/// Scheduler state. A sweep only starts from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    SweepInFlight,
}

/// What happened to one endpoint during a sweep
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EndpointOutcome {
    /// The endpoint was probed and its row persisted (whatever its health)
    Checked(CheckOutcome),
    /// The check could not be completed, e.g. the row could not be written
    Failed { endpoint_id: i64, error: String },
}

impl EndpointOutcome {
    pub fn endpoint_id(&self) -> i64 {
        match self {
            EndpointOutcome::Checked(outcome) => outcome.endpoint_id,
            EndpointOutcome::Failed { endpoint_id, .. } => *endpoint_id,
        }
    }
}

/// Summary of one completed sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success_count: usize,
    pub failure_count: usize,
    /// Checked endpoints whose state was `Up`
    pub up_count: usize,
    pub outcomes: Vec<EndpointOutcome>,
}

impl SweepSummary {
    fn new(started_at: DateTime<Utc>, duration: Duration, mut outcomes: Vec<EndpointOutcome>) -> Self {
        outcomes.sort_by_key(EndpointOutcome::endpoint_id);

        let success_count =
            outcomes.iter().filter(|o| matches!(o, EndpointOutcome::Checked(_))).count();
        let up_count = outcomes
            .iter()
            .filter(|o| matches!(o, EndpointOutcome::Checked(c) if c.is_up))
            .count();

        Self {
            started_at,
            duration_ms: duration.as_millis() as u64,
            success_count,
            failure_count: outcomes.len() - success_count,
            up_count,
            outcomes,
        }
    }
}

/// Result of asking for a sweep
#[derive(Debug, Clone)]
pub enum SweepReport {
    Completed(SweepSummary),
    /// Another sweep was in flight, this trigger was dropped
    Skipped,
}

/// Counters exposed for logging and the CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub sweeps_completed: u64,
    pub sweeps_skipped: u64,
    pub sweeps_failed: u64,
}

/// Returns the scheduler to `Idle` when the sweep ends, however it ends
struct SweepGuard<'a> {
    in_flight: &'a AtomicBool,
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Monitoring scheduler - periodic, non-overlapping sweeps over all endpoints
pub struct MonitoringScheduler {
    executor: Arc<MonitoringExecutor>,
    database: Arc<dyn Database>,
    interval: Duration,
    max_concurrency: usize,
    in_flight: AtomicBool,
    sweeps_completed: AtomicU64,
    sweeps_skipped: AtomicU64,
    sweeps_failed: AtomicU64,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        executor: Arc<MonitoringExecutor>,
        database: Arc<dyn Database>,
        interval: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            executor,
            database,
            interval,
            max_concurrency: max_concurrency.max(1),
            in_flight: AtomicBool::new(false),
            sweeps_completed: AtomicU64::new(0),
            sweeps_skipped: AtomicU64::new(0),
            sweeps_failed: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.in_flight.load(Ordering::Acquire) {
            SchedulerState::SweepInFlight
        } else {
            SchedulerState::Idle
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            sweeps_completed: self.sweeps_completed.load(Ordering::Relaxed),
            sweeps_skipped: self.sweeps_skipped.load(Ordering::Relaxed),
            sweeps_failed: self.sweeps_failed.load(Ordering::Relaxed),
        }
    }

    /// Idle -> SweepInFlight, or `None` if a sweep is already running
    fn try_begin_sweep(&self) -> Option<SweepGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepGuard { in_flight: &self.in_flight })
    }

    /// Run one sweep now unless one is already in flight.
    ///
    /// Only failing to fetch the endpoint list is an error; per-endpoint
    /// failures are reported in the summary.
    pub async fn run_sweep_now(&self) -> Result<SweepReport, MonitorError> {
        let Some(_guard) = self.try_begin_sweep() else {
            let skipped = self.sweeps_skipped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(skipped_total = skipped, "Sweep already in flight, dropping trigger");
            return Ok(SweepReport::Skipped);
        };

        match self.sweep().await {
            Ok(summary) => {
                self.sweeps_completed.fetch_add(1, Ordering::Relaxed);
                Ok(SweepReport::Completed(summary))
            }
            Err(e) => {
                self.sweeps_failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    async fn sweep(&self) -> Result<SweepSummary, MonitorError> {
        let started_at = Utc::now();
        let start = Instant::now();

        // The list is fixed for the whole sweep
        let endpoints = self.database.list_endpoints().await?;
        info!(endpoints = endpoints.len(), "Starting sweep");

        let executor = Arc::clone(&self.executor);
        let outcomes: Vec<EndpointOutcome> = stream::iter(endpoints)
            .map(move |endpoint| {
                let executor = Arc::clone(&executor);
                async move {
                    let endpoint_id = endpoint.id;
                    // Own task per check so a panic stays with that endpoint
                    let handle = tokio::spawn(async move { executor.execute_check(&endpoint).await });
                    match handle.await {
                        Ok(Ok(outcome)) => EndpointOutcome::Checked(outcome),
                        Ok(Err(e)) => EndpointOutcome::Failed { endpoint_id, error: e.to_string() },
                        Err(join_error) => {
                            error!(endpoint_id, "Check task failed: {}", join_error);
                            EndpointOutcome::Failed {
                                endpoint_id,
                                error: format!("check task failed: {join_error}"),
                            }
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let summary = SweepSummary::new(started_at, start.elapsed(), outcomes);

        for outcome in &summary.outcomes {
            match outcome {
                EndpointOutcome::Checked(check) => debug!(
                    endpoint_id = check.endpoint_id,
                    state = %check.state,
                    status_code = ?check.status_code,
                    latency_ms = check.response_time_ms,
                    "Endpoint checked"
                ),
                EndpointOutcome::Failed { endpoint_id, error } => {
                    warn!(endpoint_id, "Endpoint check failed: {}", error)
                }
            }
        }

        info!(
            succeeded = summary.success_count,
            failed = summary.failure_count,
            up = summary.up_count,
            duration_ms = summary.duration_ms,
            "Sweep complete"
        );

        Ok(summary)
    }

    async fn run_tick(&self) {
        if let Err(e) = self.run_sweep_now().await {
            error!("Sweep failed: {}", e);
        }
    }

    /// Drive sweeps until `shutdown` flips to true or its sender is dropped.
    ///
    /// The first sweep starts immediately. A tick that fires while a sweep is
    /// still running is dropped. On shutdown no new sweep starts and the call
    /// returns once the in-flight sweep has settled.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut sweeps = JoinSet::new();
        info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    while sweeps.try_join_next().is_some() {}

                    let scheduler = Arc::clone(&self);
                    sweeps.spawn(async move { scheduler.run_tick().await });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(state = ?self.state(), "Scheduler stopping, waiting for in-flight sweep");
        while sweeps.join_next().await.is_some() {}
        info!(stats = ?self.stats(), "Scheduler stopped");
    }
}
