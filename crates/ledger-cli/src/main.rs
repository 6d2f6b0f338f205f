//! Ledger CLI - AI spending analysis and scheduled jobs
//!
//! Usage:
//!   ledger init                          Initialize database
//!   ledger users add NAME EMAIL          Create a user
//!   ledger analyze USER --type report    Run one analysis
//!   ledger schedule add USER TASK SCHED  Add a recurring task
//!   ledger run                           Run the scheduler daemon

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ledger_core::{Database, EngineConfig};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let db = commands::open_db(&cli.db, cli.no_encrypt)?;

    match cli.command {
        Commands::Init => commands::cmd_init(&db, &cli.db, cli.no_encrypt),
        Commands::Users { action } => match action {
            UsersAction::Add {
                username,
                email,
                model,
                ollama_url,
            } => commands::cmd_users_add(&db, &username, &email, &model, ollama_url.as_deref()),
            UsersAction::List => commands::cmd_users_list(&db),
            UsersAction::SetModel {
                user,
                model,
                ollama_url,
            } => commands::cmd_users_set_model(&db, user, &model, ollama_url.as_deref()),
        },
        Commands::Transactions { action } => match action {
            TransactionsAction::Add {
                user,
                amount,
                merchant,
                category,
                date,
                transaction_type,
                memo,
            } => commands::cmd_transactions_add(
                &db,
                user,
                amount,
                &merchant,
                category.as_deref(),
                date.as_deref(),
                &transaction_type,
                memo.as_deref(),
            ),
            TransactionsAction::List { user, days, limit } => {
                commands::cmd_transactions_list(&db, user, days, limit)
            }
        },
        Commands::Analyze {
            user,
            analysis_type,
            days,
            refresh,
            json,
        } => {
            let engine = load_engine(db)?;
            commands::cmd_analyze(&engine, user, &analysis_type, days, refresh, json).await
        }
        Commands::Schedule { action } => {
            let engine = load_engine(db)?;
            match action {
                ScheduleAction::Add {
                    user,
                    task_type,
                    schedule_type,
                    cron,
                } => commands::cmd_schedule_add(
                    &engine,
                    user,
                    &task_type,
                    &schedule_type,
                    cron.as_deref(),
                ),
                ScheduleAction::Remove { user, task_id } => {
                    commands::cmd_schedule_remove(&engine, user, task_id)
                }
                ScheduleAction::List { user } => commands::cmd_schedule_list(&engine, user),
                ScheduleAction::Tick => commands::cmd_schedule_tick(&engine).await,
            }
        }
        Commands::Metrics { user } => commands::cmd_metrics(&load_engine(db)?, user),
        Commands::Providers { user } => commands::cmd_providers(&load_engine(db)?, user).await,
        Commands::Run => commands::cmd_run(&load_engine(db)?).await,
    }
}

/// Wire the orchestrator and scheduler over an open database
fn load_engine(db: Database) -> Result<commands::Engine> {
    let config = EngineConfig::load().context("Failed to load configuration")?;
    Ok(commands::Engine::new(db, config))
}
