//! AI provider abstraction
//!
//! # Architecture
//!
//! - `ProviderClient` trait: the analysis operations every backend offers
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `GeminiBackend`, `OllamaBackend`, `MockBackend`
//!
//! Provider operations never fail by panicking or by returning a library
//! error. Every outcome is a `ProviderResult`: a JSON analysis or a
//! `ProviderError` value that the orchestrator matches on.
//!
//! # Configuration
//!
//! Environment variables (applied over `ledger.toml`):
//! - `GOOGLE_GEMINI_API_KEY`: enables Gemini
//! - `GEMINI_MODEL`: Gemini model name (default: gemini-pro)
//! - `OLLAMA_HOST`: default Ollama server (default: http://localhost:11434)
//! - `OLLAMA_MODEL`: preferred Ollama model (default: llama3)

mod gemini;
pub mod hybrid;
mod mock;
mod ollama;
pub mod orchestrator;
pub mod parsing;
pub mod prompting;
pub mod types;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use orchestrator::AnalysisOrchestrator;
pub use types::*;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::models::{AnalysisType, TransactionView};
use crate::retry::RetryPolicy;

/// Interface shared by all AI backends
///
/// Backends must be Send + Sync so the hybrid mode can run two of them on
/// separate tasks.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Configured model name (for audit and display)
    fn model(&self) -> &str;

    async fn analyze_spending_patterns(&self, transactions: &[TransactionView]) -> ProviderResult;

    async fn generate_monthly_report(
        &self,
        transactions: &[TransactionView],
        previous_month: Option<&Value>,
    ) -> ProviderResult;

    async fn suggest_budget_optimization(
        &self,
        transactions: &[TransactionView],
        budget_goals: Option<&BTreeMap<String, f64>>,
    ) -> ProviderResult;

    async fn is_available(&self) -> bool;

    async fn list_models(&self) -> Vec<String>;

    /// Dispatch an analysis type to the matching operation
    async fn analyze(
        &self,
        analysis_type: AnalysisType,
        transactions: &[TransactionView],
    ) -> ProviderResult {
        match analysis_type {
            AnalysisType::Pattern => self.analyze_spending_patterns(transactions).await,
            AnalysisType::Report => self.generate_monthly_report(transactions, None).await,
            AnalysisType::Optimization => {
                self.suggest_budget_optimization(transactions, None).await
            }
        }
    }

    async fn status(&self) -> ProviderStatus {
        let models = self.list_models().await;
        ProviderStatus {
            kind: self.kind(),
            model: self.model().to_string(),
            available: self.is_available().await,
            models,
        }
    }
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    Gemini(GeminiBackend),
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Gemini client from engine config
    pub fn gemini(config: &EngineConfig) -> Self {
        AIClient::Gemini(GeminiBackend::new(
            &config.gemini,
            RetryPolicy::from_config(&config.retry),
        ))
    }

    /// Default Ollama client from engine config
    pub fn ollama(config: &EngineConfig) -> Self {
        AIClient::Ollama(OllamaBackend::new(
            &config.ollama,
            RetryPolicy::from_config(&config.retry),
        ))
    }

    pub fn mock(kind: ProviderKind) -> Self {
        AIClient::Mock(MockBackend::new(kind))
    }

    /// Same client addressed at another server
    ///
    /// Only meaningful for Ollama; other backends are returned unchanged.
    pub fn with_host(&self, host: &str) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_host(host)),
            other => other.clone(),
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Gemini(b) => AIClient::Gemini(b.with_model(model)),
            AIClient::Ollama(b) => AIClient::Ollama(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }
}

// Implement ProviderClient for AIClient by delegating to the inner backend
#[async_trait]
impl ProviderClient for AIClient {
    fn kind(&self) -> ProviderKind {
        match self {
            AIClient::Gemini(b) => b.kind(),
            AIClient::Ollama(b) => b.kind(),
            AIClient::Mock(b) => b.kind(),
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.model(),
            AIClient::Ollama(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    async fn analyze_spending_patterns(&self, transactions: &[TransactionView]) -> ProviderResult {
        match self {
            AIClient::Gemini(b) => b.analyze_spending_patterns(transactions).await,
            AIClient::Ollama(b) => b.analyze_spending_patterns(transactions).await,
            AIClient::Mock(b) => b.analyze_spending_patterns(transactions).await,
        }
    }

    async fn generate_monthly_report(
        &self,
        transactions: &[TransactionView],
        previous_month: Option<&Value>,
    ) -> ProviderResult {
        match self {
            AIClient::Gemini(b) => b.generate_monthly_report(transactions, previous_month).await,
            AIClient::Ollama(b) => b.generate_monthly_report(transactions, previous_month).await,
            AIClient::Mock(b) => b.generate_monthly_report(transactions, previous_month).await,
        }
    }

    async fn suggest_budget_optimization(
        &self,
        transactions: &[TransactionView],
        budget_goals: Option<&BTreeMap<String, f64>>,
    ) -> ProviderResult {
        match self {
            AIClient::Gemini(b) => {
                b.suggest_budget_optimization(transactions, budget_goals)
                    .await
            }
            AIClient::Ollama(b) => {
                b.suggest_budget_optimization(transactions, budget_goals)
                    .await
            }
            AIClient::Mock(b) => {
                b.suggest_budget_optimization(transactions, budget_goals)
                    .await
            }
        }
    }

    async fn is_available(&self) -> bool {
        match self {
            AIClient::Gemini(b) => b.is_available().await,
            AIClient::Ollama(b) => b.is_available().await,
            AIClient::Mock(b) => b.is_available().await,
        }
    }

    async fn list_models(&self) -> Vec<String> {
        match self {
            AIClient::Gemini(b) => b.list_models().await,
            AIClient::Ollama(b) => b.list_models().await,
            AIClient::Mock(b) => b.list_models().await,
        }
    }
}
