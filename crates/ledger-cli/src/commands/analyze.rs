//! Analysis and metrics commands

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use ledger_core::AnalysisType;

use super::{window_start, Engine};

pub async fn cmd_analyze(
    engine: &Engine,
    user_id: i64,
    analysis_type: &str,
    days: i64,
    refresh: bool,
    json: bool,
) -> Result<()> {
    let analysis_type = AnalysisType::from_request(analysis_type)
        .context("Valid types: pattern, report, optimization")?;
    let user = engine
        .db
        .get_user(user_id)
        .context("Failed to load user")?
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;

    let end = Utc::now();
    let start = window_start(end, days)?;
    let transactions = engine
        .db
        .list_transactions_between(user_id, start, end, engine.config.scheduler.transaction_limit)
        .context("Failed to load transactions")?;

    if !json {
        println!(
            "🤖 Running {} analysis over {} transaction(s) with {}...",
            analysis_type,
            transactions.len(),
            user.preferred_model
        );
    }

    let result = engine
        .orchestrator
        .analyze(&user, &transactions, analysis_type, refresh)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result.error_message() {
        Some(reason) => println!("❌ Analysis failed ({}): {}", result.model_used, reason),
        None => {
            let source = if result.cached { " (cached)" } else { "" };
            println!("✅ Analysis by {}{}", result.model_used, source);
            println!("{}", serde_json::to_string_pretty(&result.analysis)?);
        }
    }
    Ok(())
}

pub fn cmd_metrics(engine: &Engine, user_id: i64) -> Result<()> {
    let metrics = engine
        .orchestrator
        .get_performance_metrics(user_id)
        .context("Failed to read analysis logs")?;

    println!("📊 Analysis metrics for user {}", user_id);
    println!("   Total:      {}", metrics.total_analyses);
    println!("   Successful: {}", metrics.successful_analyses);
    println!("   Failed:     {}", metrics.failed_analyses);
    println!("   Success:    {:.1}%", metrics.success_rate * 100.0);
    println!("   Cache size: {}", metrics.cache_size);

    if !metrics.model_usage.is_empty() {
        println!();
        println!("   {:<10} {:>6} {:>8} {:>6}", "MODEL", "COUNT", "SUCCESS", "ERROR");
        for (model, usage) in &metrics.model_usage {
            println!(
                "   {:<10} {:>6} {:>8} {:>6}",
                model, usage.count, usage.success, usage.error
            );
        }
    }
    Ok(())
}
