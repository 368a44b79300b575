// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::gauge;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{DEFAULT_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES};
use crate::ingest::orchestrator::FetchOrchestrator;

/// A handle only exists once the timer is armed, so it starts out `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

/// Owner of the repeating fetch timer. Dropping it cancels the timer.
#[derive(Debug)]
pub struct SchedulerHandle {
    interval: Duration,
    timer: Option<JoinHandle<()>>,
    state: SchedulerState,
}

/// Arm recurring fetch runs: one immediately, then one per `interval_minutes`
/// (60 when unset, zero or above `MAX_INTERVAL_MINUTES`).
///
/// Every run is spawned on its own task; failures are logged, never returned.
/// Runs may overlap; storage uniqueness keeps that safe.
pub fn setup_schedule(
    orchestrator: Arc<FetchOrchestrator>,
    interval_minutes: Option<u64>,
) -> SchedulerHandle {
    let minutes = match interval_minutes {
        Some(m) if m > 0 && m <= MAX_INTERVAL_MINUTES => m,
        Some(m) if m > MAX_INTERVAL_MINUTES => {
            tracing::warn!(target: "ingest", requested = m, "schedule interval too large, using default");
            DEFAULT_INTERVAL_MINUTES
        }
        _ => DEFAULT_INTERVAL_MINUTES,
    };
    setup_schedule_every(orchestrator, Duration::from_secs(minutes.saturating_mul(60)))
}

/// Same as [`setup_schedule`] with an arbitrary period.
pub fn setup_schedule_every(orchestrator: Arc<FetchOrchestrator>, period: Duration) -> SchedulerHandle {
    gauge!("ingest_schedule_interval_minutes").set(period.as_secs_f64() / 60.0);

    let timer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // First tick completes immediately.
            ticker.tick().await;
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orch.run().await {
                    tracing::error!(target: "ingest", error = %e, "scheduled news fetch failed");
                }
            });
        }
    });

    tracing::info!(target: "ingest", period_secs = period.as_secs(), "news fetch scheduler started");

    SchedulerHandle {
        interval: period,
        timer: Some(timer),
        state: SchedulerState::Running,
    }
}

impl SchedulerHandle {
    /// Cancel future ticks. Runs already in flight finish on their own. Idempotent.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            self.state = SchedulerState::Stopped;
            tracing::info!(target: "ingest", "news fetch scheduler stopped");
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
