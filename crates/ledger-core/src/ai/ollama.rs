//! Ollama backend implementation
//!
//! HTTP client for the Ollama API. `/api/tags` doubles as the health check
//! and the model listing; analyses go through non-streaming `/api/generate`.
//!
//! The model actually used is resolved per call from what the server has
//! installed: the configured model if present, else `llama3`, else the first
//! installed model.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::OllamaConfig;
use crate::models::{AnalysisType, TransactionView};
use crate::prompts::PromptLibrary;
use crate::retry::RetryPolicy;

use super::parsing::parse_analysis;
use super::prompting::{render_prompt, PromptContext, RenderedPrompt};
use super::types::{ProviderError, ProviderKind, ProviderResult};
use super::ProviderClient;

/// Model preferred when the configured one is not installed
const PREFERRED_FALLBACK_MODEL: &str = "llama3";

/// Health checks must answer quickly
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    default_model: String,
    timeout: Duration,
    retry: RetryPolicy,
    prompts: Arc<Mutex<PromptLibrary>>,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig, retry: RetryPolicy) -> Self {
        Self {
            http_client: Client::new(),
            base_url: config.host.trim_end_matches('/').to_string(),
            default_model: config.model.clone(),
            timeout: config.timeout,
            retry,
            prompts: Arc::new(Mutex::new(PromptLibrary::new())),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(Mutex::new(prompts));
        self
    }

    /// Same backend pointed at a different server (a user's own Ollama)
    pub fn with_host(&self, host: &str) -> Self {
        Self {
            base_url: host.trim_end_matches('/').to_string(),
            ..self.clone()
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            default_model: model.to_string(),
            ..self.clone()
        }
    }

    pub fn host(&self) -> &str {
        &self.base_url
    }

    async fn fetch_models(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "Ollama server returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Invalid /api/tags response: {}", e)))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Pick the model to run against from what is installed
    fn select_model(&self, installed: &[String]) -> Option<String> {
        let matches = |wanted: &str| {
            installed
                .iter()
                .find(|name| *name == wanted || name.split(':').next() == Some(wanted))
                .cloned()
        };

        matches(&self.default_model)
            .or_else(|| matches(PREFERRED_FALLBACK_MODEL))
            .or_else(|| installed.first().cloned())
    }

    async fn run(
        &self,
        analysis_type: AnalysisType,
        transactions: &[TransactionView],
        context: PromptContext<'_>,
    ) -> ProviderResult {
        let installed = self.fetch_models().await.map_err(|e| {
            warn!(host = %self.base_url, error = %e, "Ollama server not reachable");
            match e {
                ProviderError::Unavailable(_) => e,
                other => {
                    ProviderError::Unavailable(format!("Ollama server not reachable: {}", other))
                }
            }
        })?;

        let model = self.select_model(&installed).ok_or_else(|| {
            ProviderError::Unavailable(format!(
                "No models installed on Ollama server {}",
                self.base_url
            ))
        })?;
        if model != self.default_model {
            info!(
                configured = %self.default_model,
                using = %model,
                "Configured Ollama model not installed"
            );
        }

        let prompt = render_prompt(&self.prompts, analysis_type, transactions, &context)?;
        let text = self
            .retry
            .run(self.timeout, || self.generate(&model, &prompt))
            .await?;
        debug!(model = %model, "Ollama response: {}", text);

        parse_analysis(&text)
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &RenderedPrompt,
    ) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            model: model.to_string(),
            prompt: prompt.user.clone(),
            system: prompt.system.clone(),
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Request(format!(
                "Ollama returned {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Request(format!("Invalid Ollama response body: {}", e)))?;
        Ok(body.response)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[async_trait]
impl ProviderClient for OllamaBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> &str {
        &self.default_model
    }

    async fn analyze_spending_patterns(&self, transactions: &[TransactionView]) -> ProviderResult {
        self.run(AnalysisType::Pattern, transactions, PromptContext::default())
            .await
    }

    async fn generate_monthly_report(
        &self,
        transactions: &[TransactionView],
        previous_month: Option<&Value>,
    ) -> ProviderResult {
        let context = PromptContext {
            previous_month,
            budget_goals: None,
        };
        self.run(AnalysisType::Report, transactions, context).await
    }

    async fn suggest_budget_optimization(
        &self,
        transactions: &[TransactionView],
        budget_goals: Option<&BTreeMap<String, f64>>,
    ) -> ProviderResult {
        let context = PromptContext {
            previous_month: None,
            budget_goals,
        };
        self.run(AnalysisType::Optimization, transactions, context)
            .await
    }

    async fn is_available(&self) -> bool {
        self.fetch_models().await.is_ok()
    }

    async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(host = %self.base_url, error = %e, "Failed to list Ollama models");
                Vec::new()
            }
        }
    }
}
