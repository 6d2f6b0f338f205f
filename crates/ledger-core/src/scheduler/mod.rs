//! Recurring per-user jobs
//!
//! # Architecture
//!
//! - `TaskScheduler`: validates and persists task definitions, and runs one
//!   `tick` over every due task
//! - `timing`: next-run computation (daily / weekly / monthly / minimal cron)
//! - `handlers`: what each task type actually does
//! - `driver`: the tokio interval loops that call `tick` and sweep the cache
//!
//! Task state lives in the `ScheduledTaskStore`; the scheduler reloads it on
//! every tick and holds nothing in between.

mod driver;
mod handlers;
pub mod timing;

pub use driver::{start_scheduler, SchedulerHandle};

use std::sync::Arc;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::ai::AnalysisOrchestrator;
use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::models::{NewScheduledTask, ScheduleType, ScheduledTask, TaskType};
use crate::store::{LedgerStore, ScheduledTaskStore, TransactionSync};

/// Counts from one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub due: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct TaskScheduler {
    store: Arc<dyn ScheduledTaskStore>,
    ledger: Arc<dyn LedgerStore>,
    orchestrator: Arc<AnalysisOrchestrator>,
    sync: Option<Arc<dyn TransactionSync>>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl TaskScheduler {
    pub fn new(
        store: Arc<dyn ScheduledTaskStore>,
        ledger: Arc<dyn LedgerStore>,
        orchestrator: Arc<AnalysisOrchestrator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            orchestrator,
            sync: None,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Attach the bank sync collaborator used by `transaction_sync` tasks
    pub fn with_sync(mut self, sync: Arc<dyn TransactionSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn orchestrator(&self) -> &Arc<AnalysisOrchestrator> {
        &self.orchestrator
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Validate and persist a new active task, returning its id
    ///
    /// Fails with `ScheduleValidation` before touching the store when the
    /// task or schedule type is unknown, or when a cron schedule has no
    /// expression.
    pub fn add_schedule(
        &self,
        user_id: i64,
        task_type: &str,
        schedule_type: &str,
        cron_expression: Option<&str>,
    ) -> Result<i64> {
        let task_type: TaskType = task_type.parse().map_err(Error::ScheduleValidation)?;
        let schedule_type: ScheduleType =
            schedule_type.parse().map_err(Error::ScheduleValidation)?;

        let cron_expression = match schedule_type {
            ScheduleType::Cron => {
                let expr = cron_expression
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .ok_or_else(|| {
                        Error::ScheduleValidation(
                            "cron schedules require a cron expression".to_string(),
                        )
                    })?;
                if !timing::is_supported_cron(expr) {
                    warn!(
                        user_id,
                        expression = expr,
                        "Cron expression has no readable minute/hour, task will run daily"
                    );
                }
                Some(expr.to_string())
            }
            _ => None,
        };

        let next_run_at =
            timing::next_run_at(schedule_type, cron_expression.as_deref(), self.clock.now());

        let id = self
            .store
            .create(&NewScheduledTask {
                user_id,
                task_type,
                schedule_type,
                cron_expression,
                next_run_at: Some(next_run_at),
            })
            .map_err(|e| Error::SchedulePersistence(e.to_string()))?;

        info!(
            user_id,
            task_id = id,
            task_type = %task_type,
            schedule_type = %schedule_type,
            next_run_at = %next_run_at,
            "Scheduled task added"
        );
        Ok(id)
    }

    /// Deactivate a task owned by `user_id`
    ///
    /// Returns false when the task does not exist or belongs to someone else.
    pub fn remove_schedule(&self, user_id: i64, task_id: i64) -> Result<bool> {
        let mut task = match self.store.get(task_id)? {
            Some(task) if task.user_id == user_id => task,
            _ => return Ok(false),
        };

        task.is_active = false;
        self.store
            .update(&task)
            .map_err(|e| Error::SchedulePersistence(e.to_string()))?;

        info!(user_id, task_id, "Scheduled task deactivated");
        Ok(true)
    }

    /// A user's active tasks
    pub fn list_schedules(&self, user_id: i64) -> Result<Vec<ScheduledTask>> {
        self.store.list_active_for_user(user_id)
    }

    /// Run every due task once, in order
    ///
    /// A failing task is logged and still gets `last_run_at` and a new
    /// `next_run_at`. So does a task that outlives `task_timeout`; its
    /// provider call keeps running on its own tokio task and is audited when
    /// it returns. Only failing to list the tasks fails the tick.
    pub async fn tick(&self) -> Result<TickReport> {
        let now = self.clock.now();
        let tasks = self.store.list_active()?;
        let mut report = TickReport::default();

        for mut task in tasks.into_iter().filter(|t| t.is_due(now)) {
            report.due += 1;
            info!(
                task_id = task.id,
                user_id = task.user_id,
                task_type = %task.task_type,
                "Running scheduled task"
            );

            let bound = self.config.task_timeout;
            let outcome = match timeout(bound, self.dispatch(&task, now)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::TaskTimeout(bound)),
            };

            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        task_id = task.id,
                        user_id = task.user_id,
                        error = %e,
                        "Scheduled task failed"
                    );
                }
            }

            task.last_run_at = Some(now);
            task.next_run_at = Some(timing::next_run_at(
                task.schedule_type,
                task.cron_expression.as_deref(),
                now,
            ));
            if let Err(e) = self.store.update(&task) {
                error!(task_id = task.id, error = %e, "Failed to save task run times");
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIClient, MockBackend, ProviderKind};
    use crate::cache::ResultCache;
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;
    use crate::db::Database;
    use crate::models::{NewTransaction, PreferredModel};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    struct Harness {
        db: Arc<Database>,
        clock: ManualClock,
        gemini: MockBackend,
        scheduler: TaskScheduler,
        user_id: i64,
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn harness() -> Harness {
        let db = Arc::new(Database::in_memory().unwrap());
        let user_id = db
            .create_user("noor", "noor@example.com", PreferredModel::Gemini, None)
            .unwrap();
        let clock = ManualClock::new(at(2024, 3, 1, 9, 0));
        let gemini = MockBackend::new(ProviderKind::Gemini);

        let orchestrator = Arc::new(
            AnalysisOrchestrator::new(
                AIClient::Mock(gemini.clone()),
                AIClient::mock(ProviderKind::Ollama),
                Arc::new(ResultCache::new(&CacheConfig::default())),
                db.clone(),
            )
            .with_clock(Arc::new(clock.clone())),
        );
        let scheduler = TaskScheduler::new(
            db.clone(),
            db.clone(),
            orchestrator,
            SchedulerConfig::default(),
        )
        .with_clock(Arc::new(clock.clone()));

        Harness {
            db,
            clock,
            gemini,
            scheduler,
            user_id,
        }
    }

    #[test]
    fn test_add_schedule_computes_next_run() {
        let h = harness();
        let id = h
            .scheduler
            .add_schedule(h.user_id, "ai_report_generation", "cron", Some("0 9 * * *"))
            .unwrap();

        let task = h.db.get_scheduled_task(id).unwrap().unwrap();
        assert!(task.is_active);
        assert_eq!(task.next_run_at, Some(at(2024, 3, 2, 9, 0)));
        assert_eq!(task.cron_expression.as_deref(), Some("0 9 * * *"));
    }

    #[test]
    fn test_add_schedule_drops_expression_for_non_cron() {
        let h = harness();
        let id = h
            .scheduler
            .add_schedule(h.user_id, "monthly_analysis", "weekly", Some("0 9 * * *"))
            .unwrap();
        let task = h.db.get_scheduled_task(id).unwrap().unwrap();
        assert!(task.cron_expression.is_none());
        assert_eq!(task.next_run_at, Some(at(2024, 3, 8, 9, 0)));
    }

    #[test]
    fn test_add_schedule_validation() {
        let h = harness();
        for (task_type, schedule_type, cron) in [
            ("backup", "daily", None),
            ("transaction_sync", "hourly", None),
            ("transaction_sync", "cron", None),
            ("transaction_sync", "cron", Some("   ")),
        ] {
            let err = h
                .scheduler
                .add_schedule(h.user_id, task_type, schedule_type, cron)
                .unwrap_err();
            assert!(matches!(err, Error::ScheduleValidation(_)), "{err}");
        }
        assert!(h.scheduler.list_schedules(h.user_id).unwrap().is_empty());
    }

    #[test]
    fn test_remove_schedule_is_owner_scoped() {
        let h = harness();
        let id = h
            .scheduler
            .add_schedule(h.user_id, "transaction_sync", "daily", None)
            .unwrap();

        assert!(!h.scheduler.remove_schedule(h.user_id + 1, id).unwrap());
        assert!(!h.scheduler.remove_schedule(h.user_id, id + 100).unwrap());
        assert!(h.scheduler.remove_schedule(h.user_id, id).unwrap());

        // Soft delete: the row is still there
        let task = h.db.get_scheduled_task(id).unwrap().unwrap();
        assert!(!task.is_active);
        assert!(h.scheduler.list_schedules(h.user_id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tick_runs_new_task_and_reschedules() {
        let h = harness();
        h.db.insert_transaction(
            h.user_id,
            &NewTransaction {
                amount: 18.0,
                transaction_type: "debit".into(),
                date: at(2024, 2, 20, 12, 0),
                merchant_name: "Bookshop".into(),
                category: Some("Shopping".into()),
                memo: None,
            },
        )
        .unwrap();
        let id = h
            .scheduler
            .add_schedule(h.user_id, "ai_report_generation", "daily", None)
            .unwrap();

        // Never run, so due immediately
        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report, TickReport { due: 1, succeeded: 1, failed: 0 });
        assert_eq!(h.gemini.calls(), 1);

        let task = h.db.get_scheduled_task(id).unwrap().unwrap();
        assert_eq!(task.last_run_at, Some(at(2024, 3, 1, 9, 0)));
        assert_eq!(task.next_run_at, Some(at(2024, 3, 2, 9, 0)));

        // Not due again until tomorrow
        h.clock.advance(Duration::hours(1));
        assert_eq!(h.scheduler.tick().await.unwrap().due, 0);
    }

    #[tokio::test]
    async fn test_failed_task_still_advances() {
        let h = harness();
        let id = h
            .scheduler
            .add_schedule(h.user_id, "transaction_sync", "weekly", None)
            .unwrap();

        // No bank sync collaborator attached
        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.failed, 1);

        let task = h.db.get_scheduled_task(id).unwrap().unwrap();
        assert_eq!(task.last_run_at, Some(at(2024, 3, 1, 9, 0)));
        assert_eq!(task.next_run_at, Some(at(2024, 3, 8, 9, 0)));
    }

    #[tokio::test]
    async fn test_inactive_tasks_are_skipped() {
        let h = harness();
        let id = h
            .scheduler
            .add_schedule(h.user_id, "monthly_analysis", "monthly", None)
            .unwrap();
        h.scheduler.remove_schedule(h.user_id, id).unwrap();

        assert_eq!(h.scheduler.tick().await.unwrap(), TickReport::default());
    }

    #[tokio::test]
    async fn test_task_over_time_bound_is_stamped_and_still_audited() {
        let db = Arc::new(Database::in_memory().unwrap());
        let user_id = db
            .create_user("noor", "noor@example.com", PreferredModel::Gemini, None)
            .unwrap();
        db.insert_transaction(
            user_id,
            &NewTransaction {
                amount: 64.0,
                transaction_type: "debit".into(),
                date: at(2024, 2, 25, 12, 0),
                merchant_name: "Pharmacy".into(),
                category: Some("Health".into()),
                memo: None,
            },
        )
        .unwrap();
        let clock = ManualClock::new(at(2024, 3, 1, 9, 0));
        let gemini = MockBackend::new(ProviderKind::Gemini)
            .with_delay(std::time::Duration::from_millis(150));
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            AIClient::Mock(gemini.clone()),
            AIClient::mock(ProviderKind::Ollama),
            Arc::new(ResultCache::new(&CacheConfig::default())),
            db.clone(),
        ));
        let scheduler = TaskScheduler::new(
            db.clone(),
            db.clone(),
            orchestrator,
            SchedulerConfig {
                task_timeout: std::time::Duration::from_millis(30),
                ..SchedulerConfig::default()
            },
        )
        .with_clock(Arc::new(clock.clone()));
        let id = scheduler
            .add_schedule(user_id, "ai_report_generation", "daily", None)
            .unwrap();

        let report = scheduler.tick().await.unwrap();
        assert_eq!(report, TickReport { due: 1, succeeded: 0, failed: 1 });

        let task = db.get_scheduled_task(id).unwrap().unwrap();
        assert_eq!(task.last_run_at, Some(at(2024, 3, 1, 9, 0)));
        assert_eq!(task.next_run_at, Some(at(2024, 3, 2, 9, 0)));
        assert!(db.list_analysis_logs(user_id, 10).unwrap().is_empty());

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert_eq!(gemini.calls(), 1);
        assert_eq!(db.list_analysis_logs(user_id, 10).unwrap().len(), 1);
    }
}
