//! CLI argument definitions using clap
//!
//! Command implementations live in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ledger - AI spending analysis and recurring jobs
#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Personal finance AI analysis engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "ledger.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set LEDGER_DB_KEY environment variable with your passphrase.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage users
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Manage transactions
    Transactions {
        #[command(subcommand)]
        action: TransactionsAction,
    },

    /// Run one analysis for a user
    Analyze {
        /// User ID
        user: i64,

        /// Analysis type: pattern, report, optimization
        #[arg(short = 't', long = "type", default_value = "pattern")]
        analysis_type: String,

        /// Number of days of transactions to analyze
        #[arg(long, default_value = "30")]
        days: i64,

        /// Ignore cached results for this user
        #[arg(long)]
        refresh: bool,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },

    /// Manage scheduled tasks
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Analysis success rates and model usage for a user
    Metrics {
        /// User ID
        user: i64,
    },

    /// Show AI provider availability
    Providers {
        /// Check the Ollama server configured for this user
        #[arg(long)]
        user: Option<i64>,
    },

    /// Run the scheduler until interrupted
    Run,
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// Create a user
    Add {
        username: String,
        email: String,

        /// Preferred AI model: gemini, ollama, hybrid, auto
        #[arg(long, default_value = "gemini")]
        model: String,

        /// The user's own Ollama server
        #[arg(long)]
        ollama_url: Option<String>,
    },

    /// List users
    List,

    /// Change a user's AI preferences
    SetModel {
        user: i64,

        /// Preferred AI model: gemini, ollama, hybrid, auto
        model: String,

        /// The user's own Ollama server
        #[arg(long)]
        ollama_url: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// Record a transaction
    Add {
        user: i64,
        amount: f64,
        merchant: String,

        #[arg(long)]
        category: Option<String>,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Transaction type (debit, credit)
        #[arg(long = "type", default_value = "debit")]
        transaction_type: String,

        #[arg(long)]
        memo: Option<String>,
    },

    /// List recent transactions
    List {
        user: i64,

        #[arg(long, default_value = "30")]
        days: i64,

        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Add a recurring task
    Add {
        user: i64,

        /// transaction_sync, ai_report_generation, monthly_analysis
        task_type: String,

        /// daily, weekly, monthly, cron
        schedule_type: String,

        /// Cron expression (minute and hour are used), required for cron
        #[arg(long)]
        cron: Option<String>,
    },

    /// Deactivate a task
    Remove { user: i64, task_id: i64 },

    /// List a user's active tasks
    List { user: i64 },

    /// Run every due task once
    Tick,
}
