//! Ledger Core Library
//!
//! Analysis orchestration and scheduling engine for the Ledger personal
//! finance backend:
//! - AI providers (Gemini, Ollama) behind one async trait, with retry and timeouts
//! - Analysis orchestrator with fallback, hybrid comparison and auditing
//! - Bounded TTL result cache
//! - Recurring per-user task scheduler
//! - SQLite persistence for users, transactions, tasks and audit logs
//! - Prompt library for customizable AI prompts

pub mod ai;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod prompts;
pub mod retry;
pub mod scheduler;
pub mod store;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIClient, AnalysisOrchestrator, GeminiBackend, MockBackend, OllamaBackend, ProviderClient,
    ProviderError, ProviderKind, ProviderResult, ProviderStatus,
};
pub use cache::{CachedAnalysis, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use db::Database;
pub use error::{Error, Result};
pub use models::{
    AnalysisResult, AnalysisType, AuditRecord, AuditStatus, PerformanceMetrics, PreferredModel,
    ScheduleType, ScheduledTask, TaskType, TransactionView, UserProfile,
};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use retry::RetryPolicy;
pub use scheduler::{start_scheduler, SchedulerHandle, TaskScheduler, TickReport};
pub use store::{AuditLog, LedgerStore, ScheduledTaskStore, TransactionSync};
