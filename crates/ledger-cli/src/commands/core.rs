//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `Engine` - Orchestrator and scheduler wired over one database
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ledger_core::{
    AIClient, AnalysisOrchestrator, Database, EngineConfig, ResultCache, TaskScheduler,
};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Everything the analysis and scheduling commands need
pub struct Engine {
    pub db: Arc<Database>,
    pub config: EngineConfig,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub scheduler: Arc<TaskScheduler>,
}

impl Engine {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self::with_clients(db, config.clone(), AIClient::gemini(&config), AIClient::ollama(&config))
    }

    /// Wire the engine with explicit provider clients
    pub fn with_clients(
        db: Database,
        config: EngineConfig,
        gemini: AIClient,
        ollama: AIClient,
    ) -> Self {
        let db = Arc::new(db);
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            gemini,
            ollama,
            Arc::new(ResultCache::new(&config.cache)),
            db.clone(),
        ));
        let scheduler = Arc::new(TaskScheduler::new(
            db.clone(),
            db.clone(),
            orchestrator.clone(),
            config.scheduler.clone(),
        ));

        Self {
            db,
            config,
            orchestrator,
            scheduler,
        }
    }
}

pub fn cmd_init(db: &Database, db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initialized database at {}", db_path.display());
    println!("   Users: {}", db.list_users().context("Failed to list users")?.len());

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!();
    println!("Next steps:");
    println!("  1. Create a user: ledger users add alice alice@example.com");
    println!("  2. Schedule a report: ledger schedule add 1 ai_report_generation weekly");
    println!("  3. Start the scheduler: ledger run");

    Ok(())
}
