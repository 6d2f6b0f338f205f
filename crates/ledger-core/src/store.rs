//! Collaborator interfaces consumed by the orchestrator and scheduler
//!
//! `Database` implements the storage traits (see `db/`). Tests and embedders
//! can substitute their own implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    AuditRecord, NewAuditRecord, NewScheduledTask, ScheduledTask, TransactionView, UserProfile,
};

/// Append-only record of analysis attempts
pub trait AuditLog: Send + Sync {
    fn record(&self, record: &NewAuditRecord) -> Result<i64>;

    /// Most recent records for a user, newest first
    fn recent_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<AuditRecord>>;
}

/// Durable storage for scheduled task definitions
pub trait ScheduledTaskStore: Send + Sync {
    fn create(&self, task: &NewScheduledTask) -> Result<i64>;

    fn get(&self, id: i64) -> Result<Option<ScheduledTask>>;

    /// Active tasks across all users
    fn list_active(&self) -> Result<Vec<ScheduledTask>>;

    /// Active tasks for one user
    fn list_active_for_user(&self, user_id: i64) -> Result<Vec<ScheduledTask>>;

    /// Persist `is_active`, `last_run_at` and `next_run_at`
    fn update(&self, task: &ScheduledTask) -> Result<()>;
}

/// Read access to users and their transactions
pub trait LedgerStore: Send + Sync {
    fn get_user(&self, user_id: i64) -> Result<Option<UserProfile>>;

    /// Transactions with `start <= date <= end`, oldest first, at most `limit`
    fn transactions_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionView>>;
}

/// Bank synchronization collaborator
#[async_trait]
pub trait TransactionSync: Send + Sync {
    /// Pull the last `days_back` days of transactions, returning how many were new
    async fn sync_user_transactions(&self, user: &UserProfile, days_back: i64) -> Result<usize>;
}
