//! Mock backend for testing
//!
//! Returns scripted outcomes in order, then a default response. Clones share
//! the script and the call counter, so a test can keep a handle while the
//! orchestrator owns another.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::models::{AnalysisType, TransactionView};

use super::types::{ProviderError, ProviderKind, ProviderResult};
use super::ProviderClient;

#[derive(Clone)]
pub struct MockBackend {
    kind: ProviderKind,
    model: String,
    available: bool,
    delay: Option<Duration>,
    default_response: ProviderResult,
    script: Arc<Mutex<VecDeque<ProviderResult>>>,
    calls: Arc<AtomicUsize>,
    last_analysis: Arc<Mutex<Option<AnalysisType>>>,
}

impl MockBackend {
    /// A healthy mock that answers every analysis with a fixed summary
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: format!("mock-{}", kind),
            available: true,
            delay: None,
            default_response: Ok(json!({
                "summary": format!("Spending is stable across categories according to {}", kind),
                "recommendations": ["Review subscriptions"],
            })),
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            last_analysis: Arc::new(Mutex::new(None)),
        }
    }

    /// Answer every call with `value`
    pub fn with_response(mut self, value: Value) -> Self {
        self.default_response = Ok(value);
        self
    }

    /// Fail every call with `error`
    pub fn failing(mut self, error: ProviderError) -> Self {
        self.default_response = Err(error);
        self
    }

    /// Report unavailable and fail every call as unreachable
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self.default_response = Err(ProviderError::Unavailable("unreachable".into()));
        self
    }

    /// Wait before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue one outcome ahead of the default response
    pub fn push_outcome(&self, outcome: ProviderResult) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Number of analysis calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Analysis type of the most recent call
    pub fn last_analysis(&self) -> Option<AnalysisType> {
        *self
            .last_analysis
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    async fn respond(&self, analysis_type: AnalysisType) -> ProviderResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_analysis
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(analysis_type);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        scripted.unwrap_or_else(|| self.default_response.clone())
    }
}

#[async_trait]
impl ProviderClient for MockBackend {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze_spending_patterns(&self, _transactions: &[TransactionView]) -> ProviderResult {
        self.respond(AnalysisType::Pattern).await
    }

    async fn generate_monthly_report(
        &self,
        _transactions: &[TransactionView],
        _previous_month: Option<&Value>,
    ) -> ProviderResult {
        self.respond(AnalysisType::Report).await
    }

    async fn suggest_budget_optimization(
        &self,
        _transactions: &[TransactionView],
        _budget_goals: Option<&BTreeMap<String, f64>>,
    ) -> ProviderResult {
        self.respond(AnalysisType::Optimization).await
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn list_models(&self) -> Vec<String> {
        if self.available {
            vec![self.model.clone()]
        } else {
            Vec::new()
        }
    }
}
