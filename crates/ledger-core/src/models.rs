//! Domain models for Ledger

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Category used when a transaction has no merchant category
pub const DEFAULT_CATEGORY: &str = "Other";

/// Kind of analysis a caller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    /// Spending pattern analysis
    Pattern,
    /// Monthly spending report
    Report,
    /// Budget optimization suggestions
    Optimization,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Report => "report",
            Self::Optimization => "optimization",
        }
    }

    /// Parse an analysis type named by a caller
    pub fn from_request(name: &str) -> Result<Self> {
        name.parse().map_err(|_| Error::UnsupportedAnalysisType(name.to_string()))
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pattern" => Ok(Self::Pattern),
            "report" => Ok(Self::Report),
            "optimization" => Ok(Self::Optimization),
            _ => Err(format!("Unknown analysis type: {}", s)),
        }
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Which provider strategy a user prefers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreferredModel {
    /// Hosted Gemini model
    #[default]
    Gemini,
    /// Local Ollama server, falling back to Gemini
    Ollama,
    /// Both providers concurrently, compared
    Hybrid,
    /// Let the engine decide (currently Gemini)
    Auto,
}

impl PreferredModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::Hybrid => "hybrid",
            Self::Auto => "auto",
        }
    }
}

impl std::str::FromStr for PreferredModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            "hybrid" => Ok(Self::Hybrid),
            "auto" => Ok(Self::Auto),
            _ => Err(format!("Unknown AI model preference: {}", s)),
        }
    }
}

impl std::fmt::Display for PreferredModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A user as seen by the analysis engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub preferred_model: PreferredModel,
    /// The user's own Ollama server, if they run one
    pub ollama_server_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Read-only projection of a transaction handed to AI providers
///
/// This is not the persisted transaction row; it carries only what the
/// prompts and the request fingerprint need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub amount: f64,
    pub transaction_type: String,
    pub date: DateTime<Utc>,
    pub merchant_name: String,
    pub category: String,
    #[serde(default)]
    pub memo: String,
}

/// A transaction to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub amount: f64,
    pub transaction_type: String,
    pub date: DateTime<Utc>,
    pub merchant_name: String,
    pub category: Option<String>,
    pub memo: Option<String>,
}

/// Outcome of a single `analyze` call
///
/// `analysis` holds either the provider output or `{"error": reason}`;
/// it is never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub model_used: String,
    pub analysis: serde_json::Value,
    pub cached: bool,
}

impl AnalysisResult {
    /// Whether the analysis payload is an error object
    pub fn is_error(&self) -> bool {
        self.analysis.get("error").is_some()
    }

    /// The error reason, if the analysis failed
    pub fn error_message(&self) -> Option<&str> {
        self.analysis.get("error").and_then(|e| e.as_str())
    }
}

/// Status of an audited analysis attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown audit status: {}", s)),
        }
    }
}

/// An audit record to be appended
#[derive(Debug, Clone, Serialize)]
pub struct NewAuditRecord {
    pub user_id: i64,
    pub request_payload: serde_json::Value,
    pub response_payload: serde_json::Value,
    pub model_used: String,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A stored audit record (one per analysis attempt)
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub id: i64,
    pub user_id: i64,
    pub request_payload: serde_json::Value,
    pub response_payload: serde_json::Value,
    pub model_used: String,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Recurring job kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Pull recent transactions from the bank
    TransactionSync,
    /// Generate a report over the last month of activity
    AiReportGeneration,
    /// Analyze spending patterns for the current calendar month
    MonthlyAnalysis,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionSync => "transaction_sync",
            Self::AiReportGeneration => "ai_report_generation",
            Self::MonthlyAnalysis => "monthly_analysis",
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "transaction_sync" => Ok(Self::TransactionSync),
            "ai_report_generation" => Ok(Self::AiReportGeneration),
            "monthly_analysis" => Ok(Self::MonthlyAnalysis),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// How a recurring job repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Daily,
    Weekly,
    Monthly,
    /// Minimal cron subset (minute and hour only)
    Cron,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Cron => "cron",
        }
    }
}

impl std::str::FromStr for ScheduleType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "cron" => Ok(Self::Cron),
            _ => Err(format!("Unknown schedule type: {}", s)),
        }
    }
}

impl std::fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A recurring per-user job definition
///
/// Never hard-deleted: removal sets `is_active = false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledTask {
    pub id: i64,
    pub user_id: i64,
    pub task_type: TaskType,
    pub schedule_type: ScheduleType,
    /// Present iff `schedule_type` is `Cron`
    pub cron_expression: Option<String>,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledTask {
    /// Whether the task should run at `now`
    ///
    /// A task that has never run is always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match (self.next_run_at, self.last_run_at) {
            (Some(next), _) if next <= now => true,
            (_, None) => true,
            _ => false,
        }
    }
}

/// A scheduled task to be persisted
#[derive(Debug, Clone)]
pub struct NewScheduledTask {
    pub user_id: i64,
    pub task_type: TaskType,
    pub schedule_type: ScheduleType,
    pub cron_expression: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Per-model usage breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelUsage {
    pub count: i64,
    pub success: i64,
    pub error: i64,
}

/// Analysis performance metrics for a user
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub total_analyses: i64,
    pub successful_analyses: i64,
    pub failed_analyses: i64,
    pub success_rate: f64,
    pub model_usage: BTreeMap<String, ModelUsage>,
    pub cache_size: usize,
}
