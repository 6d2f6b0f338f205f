//! Scheduled task commands

use anyhow::{Context, Result};

use super::Engine;

pub fn cmd_schedule_add(
    engine: &Engine,
    user_id: i64,
    task_type: &str,
    schedule_type: &str,
    cron: Option<&str>,
) -> Result<()> {
    let id = engine
        .scheduler
        .add_schedule(user_id, task_type, schedule_type, cron)
        .context("Failed to add schedule")?;

    println!("✅ Scheduled {} ({}) as task {}", task_type, schedule_type, id);
    Ok(())
}

pub fn cmd_schedule_remove(engine: &Engine, user_id: i64, task_id: i64) -> Result<()> {
    let removed = engine
        .scheduler
        .remove_schedule(user_id, task_id)
        .context("Failed to remove schedule")?;

    if removed {
        println!("✅ Task {} deactivated", task_id);
    } else {
        println!("Task {} not found for user {}", task_id, user_id);
    }
    Ok(())
}

pub fn cmd_schedule_list(engine: &Engine, user_id: i64) -> Result<()> {
    let tasks = engine
        .scheduler
        .list_schedules(user_id)
        .context("Failed to list schedules")?;

    if tasks.is_empty() {
        println!("No active tasks for user {}", user_id);
        return Ok(());
    }

    println!(
        "{:>4}  {:<22} {:<8} {:<12} {:<17} NEXT RUN",
        "ID", "TASK", "SCHEDULE", "CRON", "LAST RUN"
    );
    for task in tasks {
        let fmt = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{:>4}  {:<22} {:<8} {:<12} {:<17} {}",
            task.id,
            task.task_type,
            task.schedule_type,
            task.cron_expression.as_deref().unwrap_or("-"),
            fmt(task.last_run_at),
            fmt(task.next_run_at),
        );
    }
    Ok(())
}

pub async fn cmd_schedule_tick(engine: &Engine) -> Result<()> {
    let report = engine
        .scheduler
        .tick()
        .await
        .context("Scheduler tick failed")?;

    println!(
        "⏱️  {} task(s) due: {} succeeded, {} failed",
        report.due, report.succeeded, report.failed
    );
    Ok(())
}
