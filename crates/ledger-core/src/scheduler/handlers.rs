//! Task handlers
//!
//! One handler per `TaskType`. Each resolves the task's user, picks its
//! transaction window, and calls either the bank sync collaborator or the
//! orchestrator.
//!
//! Collaborator calls run on their own tokio task. When `tick` gives up on a
//! slow handler, the call still completes and the orchestrator still writes
//! its audit record.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use tokio::task::JoinError;
use tracing::info;

use super::TaskScheduler;
use crate::error::{Error, Result};
use crate::models::{AnalysisType, ScheduledTask, TaskType, UserProfile};

impl TaskScheduler {
    pub(super) async fn dispatch(&self, task: &ScheduledTask, now: DateTime<Utc>) -> Result<()> {
        let user = self
            .ledger
            .get_user(task.user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", task.user_id)))?;

        match task.task_type {
            TaskType::TransactionSync => self.sync_transactions(&user).await,
            TaskType::AiReportGeneration => {
                let days = self.config.report_window_days;
                let start = Duration::try_days(days)
                    .and_then(|window| now.checked_sub_signed(window))
                    .ok_or_else(|| {
                        Error::Config(format!("report_window_days {} is out of range", days))
                    })?;
                self.analyze_window(&user, start, now, AnalysisType::Report)
                    .await
            }
            TaskType::MonthlyAnalysis => {
                self.analyze_window(&user, start_of_month(now), now, AnalysisType::Pattern)
                    .await
            }
        }
    }

    async fn sync_transactions(&self, user: &UserProfile) -> Result<()> {
        let sync = self
            .sync
            .clone()
            .ok_or_else(|| Error::Sync("no bank sync collaborator configured".to_string()))?;

        let owner = user.clone();
        let days_back = self.config.sync_window_days;
        let synced = tokio::spawn(async move {
            sync.sync_user_transactions(&owner, days_back).await
        })
        .await
        .map_err(|e| Error::Sync(aborted(e)))??;
        info!(user_id = user.id, synced, "Transactions synced");
        Ok(())
    }

    async fn analyze_window(
        &self,
        user: &UserProfile,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        analysis_type: AnalysisType,
    ) -> Result<()> {
        let transactions =
            self.ledger
                .transactions_between(user.id, start, end, self.config.transaction_limit)?;

        if transactions.is_empty() {
            info!(
                user_id = user.id,
                analysis_type = %analysis_type,
                "No transactions in window, skipping analysis"
            );
            return Ok(());
        }

        let count = transactions.len();
        let orchestrator = Arc::clone(&self.orchestrator);
        let owner = user.clone();
        let result = tokio::spawn(async move {
            orchestrator
                .analyze(&owner, &transactions, analysis_type, false)
                .await
        })
        .await
        .map_err(|e| Error::Analysis(aborted(e)))?;

        if result.is_error() {
            let reason = result.error_message().unwrap_or("unknown error");
            return Err(Error::Analysis(reason.to_string()));
        }

        info!(
            user_id = user.id,
            analysis_type = %analysis_type,
            model = %result.model_used,
            transactions = count,
            "Scheduled analysis complete"
        );
        Ok(())
    }
}

fn aborted(e: JoinError) -> String {
    format!("handler task did not complete: {}", e)
}

/// Midnight UTC on the first day of `now`'s month
pub(crate) fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .with_day(1)
        .and_then(|first| first.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}
