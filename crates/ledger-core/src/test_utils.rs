//! Test utilities for ledger-core
//!
//! A mock Ollama server for HTTP-level provider tests. It answers the two
//! endpoints the Ollama backend uses and picks a canned analysis based on
//! which prompt template it receives.

use std::net::SocketAddr;

use axum::{
    extract::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::oneshot;

/// Mock Ollama server bound to a random local port
pub struct MockOllamaServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock ollama listener");
        let addr = listener.local_addr().expect("mock ollama address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await;
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

#[derive(Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
}

#[derive(Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}

async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 4_700_000_000,
        }],
    })
}

async fn handle_generate(Json(request): Json<GenerateRequest>) -> Json<GenerateResponse> {
    // Matches the opening line of each template in prompts/*.md
    let analysis = if request.prompt.contains("monthly spending report") {
        json!({
            "summary": "Spending this month is in line with the previous month",
            "key_insights": ["Groceries remain the largest category"],
            "trends": {"increasing_categories": [], "decreasing_categories": []},
            "recommendations": ["Keep the current grocery budget"],
            "next_month_prediction": "Similar total spending expected"
        })
    } else if request.prompt.contains("budget optimizations") {
        json!({
            "summary": "Dining out can be trimmed without affecting essentials",
            "optimization_opportunities": [
                {"category": "Dining", "current_spending": 320.0, "suggested_budget": 250.0}
            ],
            "savings_potential": 70.0,
            "action_plan": ["Cook at home twice more per week"]
        })
    } else {
        json!({
            "summary": "Spending is concentrated in groceries and transport",
            "spending_habits": ["Frequent small grocery purchases"],
            "category_insights": {"Groceries": "Largest share of spending"},
            "recommendations": ["Batch grocery trips"],
            "risk_factors": []
        })
    };

    // Real models wrap the JSON in prose
    Json(GenerateResponse {
        model: request.model,
        response: format!("Here is the analysis:\n{}\nLet me know if you need more.", analysis),
        done: true,
    })
}
