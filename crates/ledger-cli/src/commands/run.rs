//! Scheduler daemon

use anyhow::{Context, Result};
use ledger_core::start_scheduler;
use tracing::info;

use super::Engine;

pub async fn cmd_run(engine: &Engine) -> Result<()> {
    let handle = start_scheduler(
        engine.scheduler.clone(),
        engine.orchestrator.clone(),
        &engine.config.scheduler,
    );
    println!("⏱️  Scheduler running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown requested");
    handle.shutdown().await;
    Ok(())
}
