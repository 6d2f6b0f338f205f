//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Database init, shared `open_db`, and the wired `Engine`
//! - `users` - User management and AI preferences
//! - `transactions` - Manual transaction entry and listing
//! - `analyze` - One-shot analysis and performance metrics
//! - `schedule` - Recurring task management and manual ticks
//! - `providers` - AI provider availability
//! - `run` - Long-running scheduler daemon

pub mod analyze;
pub mod core;
pub mod providers;
pub mod run;
pub mod schedule;
pub mod transactions;
pub mod users;

// Re-export command functions for main.rs
pub use analyze::*;
pub use core::*;
pub use providers::*;
pub use run::*;
pub use schedule::*;
pub use transactions::*;
pub use users::*;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};

/// Start of a `--days` lookback window ending at `end`
pub fn window_start(end: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|window| end.checked_sub_signed(window))
        .ok_or_else(|| anyhow!("--days {} is out of range", days))
}

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
