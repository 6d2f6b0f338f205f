//! Provider-facing types
//!
//! These types are backend-agnostic and used across all provider implementations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Which backend produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted Gemini API
    Gemini,
    /// Local (or user-hosted) Ollama server
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Closed set of failures a provider call can end in
///
/// These travel as values; a provider never panics or raises across its
/// boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Server unreachable, no model installed, or not configured
    #[error("{0}")]
    Unavailable(String),

    #[error("Provider timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Model returned text that is not the expected JSON
    #[error("{message}")]
    ResponseParse {
        message: String,
        raw_response: String,
    },

    /// Transport or HTTP status failure
    #[error("{0}")]
    Request(String),
}

impl ProviderError {
    /// Whether a retry has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Request(_))
    }

    /// Wire form: `{"error": ..., "raw_response"?: ...}`
    pub fn to_payload(&self) -> Value {
        match self {
            Self::ResponseParse {
                message,
                raw_response,
            } => json!({ "error": message, "raw_response": raw_response }),
            other => json!({ "error": other.to_string() }),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            ProviderError::Unavailable(format!("Connection failed: {}", e))
        } else {
            ProviderError::Request(e.to_string())
        }
    }
}

/// Outcome of a single provider operation
pub type ProviderResult = std::result::Result<Value, ProviderError>;

/// Whether a JSON payload counts as a successful analysis
///
/// Anything that is not an object, or that carries an `error` key, is a failure.
pub fn is_success_payload(value: &Value) -> bool {
    value.as_object().is_some_and(|o| !o.contains_key("error"))
}

/// Status snapshot of a provider, for display
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub kind: ProviderKind,
    pub model: String,
    pub available: bool,
    pub models: Vec<String>,
}
