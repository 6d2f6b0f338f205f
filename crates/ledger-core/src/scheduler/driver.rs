//! Periodic driver
//!
//! Two independent tokio loops: the task tick and the cache sweep. A tick
//! is awaited to completion before the next one is scheduled, so ticks never
//! overlap. Time bounds apply per task inside `TaskScheduler::tick`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::TaskScheduler;
use crate::ai::AnalysisOrchestrator;
use crate::config::SchedulerConfig;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Running scheduler loops
///
/// Dropping the handle without `shutdown` also ends the tick loop.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    tick_loop: JoinHandle<()>,
    sweep_loop: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.tick_loop.is_finished() && !self.sweep_loop.is_finished()
    }

    /// Stop both loops
    ///
    /// A tick in progress runs to completion first, so every task it started
    /// is stamped.
    pub async fn shutdown(self) {
        // Only fails if the tick loop already exited
        let _ = self.stop.send(true);
        if let Err(e) = self.tick_loop.await {
            warn!(error = %e, "Scheduler tick loop ended abnormally");
        }
        self.sweep_loop.abort();
        info!("Scheduler stopped");
    }
}

/// Spawn the tick and cache sweep loops on the current runtime
pub fn start_scheduler(
    scheduler: Arc<TaskScheduler>,
    orchestrator: Arc<AnalysisOrchestrator>,
    config: &SchedulerConfig,
) -> SchedulerHandle {
    info!(
        tick_interval_secs = config.tick_interval.as_secs(),
        cache_sweep_interval_secs = config.cache_sweep_interval.as_secs(),
        task_timeout_secs = config.task_timeout.as_secs(),
        "Starting scheduler"
    );

    let (stop, stopped) = watch::channel(false);
    let tick_loop = tokio::spawn(run_ticks(
        scheduler,
        config.tick_interval.max(MIN_INTERVAL),
        stopped,
    ));
    let sweep_loop = tokio::spawn(run_cache_sweep(
        orchestrator,
        config.cache_sweep_interval.max(MIN_INTERVAL),
    ));

    SchedulerHandle {
        stop,
        tick_loop,
        sweep_loop,
    }
}

async fn run_ticks(
    scheduler: Arc<TaskScheduler>,
    every: Duration,
    mut stopped: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stopped.changed() => break,
        }

        match scheduler.tick().await {
            Ok(report) if report.due > 0 => info!(
                due = report.due,
                succeeded = report.succeeded,
                failed = report.failed,
                "Scheduler tick complete"
            ),
            Ok(_) => debug!("No scheduled tasks due"),
            Err(e) => error!(error = %e, "Scheduler tick failed"),
        }
    }
}

async fn run_cache_sweep(orchestrator: Arc<AnalysisOrchestrator>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the cache is empty at startup
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let removed = orchestrator.clear_cache(None);
        info!(removed, "Analysis cache cleared");
    }
}
