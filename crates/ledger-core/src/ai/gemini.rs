//! Gemini backend
//!
//! Calls the REST `generateContent` endpoint. Without an API key the backend
//! reports itself unavailable and every analysis returns
//! `ProviderError::Unavailable("Gemini API not configured")`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::GeminiConfig;
use crate::models::{AnalysisType, TransactionView};
use crate::prompts::PromptLibrary;
use crate::retry::RetryPolicy;

use super::parsing::parse_analysis;
use super::prompting::{render_prompt, PromptContext, RenderedPrompt};
use super::types::{ProviderError, ProviderKind, ProviderResult};
use super::ProviderClient;

#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
    timeout: Duration,
    retry: RetryPolicy,
    prompts: Arc<Mutex<PromptLibrary>>,
}

impl GeminiBackend {
    pub fn new(config: &GeminiConfig, retry: RetryPolicy) -> Self {
        Self {
            http_client: Client::new(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: config.timeout,
            retry,
            prompts: Arc::new(Mutex::new(PromptLibrary::new())),
        }
    }

    /// Use a specific prompt library (tests, custom override dirs)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(Mutex::new(prompts));
        self
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn run(
        &self,
        analysis_type: AnalysisType,
        transactions: &[TransactionView],
        context: PromptContext<'_>,
    ) -> ProviderResult {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("Gemini API key is not set");
            return Err(ProviderError::Unavailable("Gemini API not configured".into()));
        };

        let prompt = render_prompt(&self.prompts, analysis_type, transactions, &context)?;
        let text = self
            .retry
            .run(self.timeout, || self.generate(api_key, &prompt))
            .await?;
        debug!(model = %self.model, "Gemini response: {}", text);

        parse_analysis(&text)
    }

    async fn generate(
        &self,
        api_key: &str,
        prompt: &RenderedPrompt,
    ) -> Result<String, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.user.clone(),
                }],
            }],
            system_instruction: prompt.system.as_ref().map(|s| Content {
                parts: vec![Part { text: s.clone() }],
            }),
        };

        let response = self
            .http_client
            .post(format!("{}/models/{}:generateContent", self.api_base, self.model))
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                ProviderError::Request(format!("Gemini returned {}: {}", status, body))
            } else {
                ProviderError::Unavailable(format!("Gemini returned {}: {}", status, body))
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Request(format!("Invalid Gemini response body: {}", e)))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderError::ResponseParse {
                message: "Gemini returned no candidates".into(),
                raw_response: String::new(),
            })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[async_trait]
impl ProviderClient for GeminiBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
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
        self.is_configured()
    }

    async fn list_models(&self) -> Vec<String> {
        if self.is_configured() {
            vec![self.model.clone()]
        } else {
            Vec::new()
        }
    }
}
