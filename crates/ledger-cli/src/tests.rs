//! CLI command tests

use clap::Parser;
use ledger_core::{
    AIClient, Database, EngineConfig, MockBackend, PreferredModel, ProviderError, ProviderKind,
};

use crate::cli::{Cli, Commands, ScheduleAction};
use crate::commands::{self, truncate, Engine};

fn engine_with(gemini: MockBackend) -> Engine {
    Engine::with_clients(
        Database::in_memory().unwrap(),
        EngineConfig::default(),
        AIClient::Mock(gemini),
        AIClient::mock(ProviderKind::Ollama),
    )
}

fn add_user(db: &Database) -> i64 {
    commands::cmd_users_add(db, "robin", "robin@example.com", "gemini", None).unwrap();
    db.list_users().unwrap()[0].id
}

// ========== Argument Parsing ==========

#[test]
fn test_parse_schedule_add_with_cron() {
    let cli = Cli::try_parse_from([
        "ledger",
        "--no-encrypt",
        "schedule",
        "add",
        "1",
        "ai_report_generation",
        "cron",
        "--cron",
        "0 9 * * *",
    ])
    .unwrap();

    assert!(cli.no_encrypt);
    match cli.command {
        Commands::Schedule {
            action:
                ScheduleAction::Add {
                    user,
                    schedule_type,
                    cron,
                    ..
                },
        } => {
            assert_eq!(user, 1);
            assert_eq!(schedule_type, "cron");
            assert_eq!(cron.as_deref(), Some("0 9 * * *"));
        }
        _ => panic!("expected schedule add"),
    }
}

#[test]
fn test_parse_analyze_defaults() {
    let cli = Cli::try_parse_from(["ledger", "analyze", "3"]).unwrap();
    match cli.command {
        Commands::Analyze {
            user,
            analysis_type,
            days,
            refresh,
            json,
        } => {
            assert_eq!(user, 3);
            assert_eq!(analysis_type, "pattern");
            assert_eq!(days, 30);
            assert!(!refresh);
            assert!(!json);
        }
        _ => panic!("expected analyze"),
    }
    assert_eq!(cli.db.to_str(), Some("ledger.db"));
}

// ========== Users ==========

#[test]
fn test_users_add_and_set_model() {
    let db = Database::in_memory().unwrap();
    let id = add_user(&db);

    commands::cmd_users_set_model(&db, id, "hybrid", Some("http://10.0.0.9:11434")).unwrap();
    let user = db.get_user(id).unwrap().unwrap();
    assert_eq!(user.preferred_model, PreferredModel::Hybrid);
    assert_eq!(user.ollama_server_url.as_deref(), Some("http://10.0.0.9:11434"));

    assert!(commands::cmd_users_list(&db).is_ok());
}

#[test]
fn test_users_rejects_unknown_model() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_users_add(&db, "a", "a@example.com", "gpt", None).is_err());
    assert!(db.list_users().unwrap().is_empty());
}

#[test]
fn test_users_set_model_missing_user() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_users_set_model(&db, 404, "ollama", None).is_err());
}

// ========== Transactions ==========

#[test]
fn test_transactions_add_validates_date() {
    let db = Database::in_memory().unwrap();
    let id = add_user(&db);

    assert!(commands::cmd_transactions_add(
        &db, id, 12.0, "Cafe", None, Some("03/01/2024"), "debit", None
    )
    .is_err());
    assert!(commands::cmd_transactions_add(
        &db,
        id,
        12.0,
        "Cafe",
        Some("Dining"),
        None,
        "debit",
        Some("latte")
    )
    .is_ok());
    assert!(commands::cmd_transactions_list(&db, id, 30, 10).is_ok());
}

// ========== Analysis ==========

#[tokio::test]
async fn test_analyze_audits_and_reports_metrics() {
    let gemini = MockBackend::new(ProviderKind::Gemini);
    let engine = engine_with(gemini.clone());
    let id = add_user(&engine.db);
    commands::cmd_transactions_add(&engine.db, id, 40.0, "Market", None, None, "debit", None)
        .unwrap();

    commands::cmd_analyze(&engine, id, "report", 30, false, true)
        .await
        .unwrap();
    assert_eq!(gemini.calls(), 1);

    let metrics = engine.orchestrator.get_performance_metrics(id).unwrap();
    assert_eq!(metrics.total_analyses, 1);
    assert!(commands::cmd_metrics(&engine, id).is_ok());
}

#[tokio::test]
async fn test_analyze_failure_is_reported_not_raised() {
    let engine = engine_with(
        MockBackend::new(ProviderKind::Gemini)
            .failing(ProviderError::Unavailable("Gemini API not configured".into())),
    );
    let id = add_user(&engine.db);
    assert!(commands::cmd_analyze(&engine, id, "pattern", 30, false, false)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_analyze_rejects_out_of_range_days() {
    let gemini = MockBackend::new(ProviderKind::Gemini);
    let engine = engine_with(gemini.clone());
    let id = add_user(&engine.db);

    let err = commands::cmd_analyze(&engine, id, "pattern", i64::MAX, false, true)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("out of range"));
    assert_eq!(gemini.calls(), 0);

    assert!(commands::cmd_transactions_list(&engine.db, id, i64::MIN, 10).is_err());
}

#[tokio::test]
async fn test_analyze_rejects_unknown_type_and_user() {
    let engine = engine_with(MockBackend::new(ProviderKind::Gemini));
    let id = add_user(&engine.db);
    let err = commands::cmd_analyze(&engine, id, "forecast", 30, false, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ledger_core::Error>(),
        Some(ledger_core::Error::UnsupportedAnalysisType(_))
    ));
    assert!(commands::cmd_analyze(&engine, id + 1, "pattern", 30, false, false)
        .await
        .is_err());
}

// ========== Schedules ==========

#[tokio::test]
async fn test_schedule_lifecycle() {
    let engine = engine_with(MockBackend::new(ProviderKind::Gemini));
    let id = add_user(&engine.db);

    commands::cmd_schedule_add(&engine, id, "monthly_analysis", "monthly", None).unwrap();
    assert!(commands::cmd_schedule_add(&engine, id, "monthly_analysis", "cron", None).is_err());

    let tasks = engine.scheduler.list_schedules(id).unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(commands::cmd_schedule_list(&engine, id).is_ok());

    commands::cmd_schedule_tick(&engine).await.unwrap();
    let task = engine.db.get_scheduled_task(tasks[0].id).unwrap().unwrap();
    assert!(task.last_run_at.is_some());

    commands::cmd_schedule_remove(&engine, id, tasks[0].id).unwrap();
    assert!(engine.scheduler.list_schedules(id).unwrap().is_empty());
}

#[tokio::test]
async fn test_providers_lists_both() {
    let engine = engine_with(MockBackend::new(ProviderKind::Gemini));
    assert!(commands::cmd_providers(&engine, None).await.is_ok());
    assert!(commands::cmd_providers(&engine, Some(99)).await.is_err());
}

// ========== Helpers ==========

#[test]
fn test_window_start() {
    let end = chrono::Utc::now();
    assert_eq!(commands::window_start(end, 30).unwrap(), end - chrono::Duration::days(30));
    assert!(commands::window_start(end, i64::MAX).is_err());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a very long merchant name", 10), "a very ...");
    assert_eq!(truncate("카페라떼아메리카노", 5), "카페...");
}
