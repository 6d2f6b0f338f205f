//! Hybrid mode: compare two provider outcomes and pick one
//!
//! Selection order: the only success if exactly one provider succeeded,
//! Gemini if both did, otherwise no recommendation.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::AnalysisType;

use super::types::{is_success_payload, ProviderKind, ProviderResult};

/// Error reported when neither provider produced an analysis
pub const ALL_PROVIDERS_FAILED: &str = "all providers failed";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub gemini_success: bool,
    pub ollama_success: bool,
    /// Jaccard similarity of the two summaries, 0 unless both succeeded
    pub consistency_score: f64,
    /// Top-level fields returned by only one provider
    pub differences: Vec<String>,
}

/// Combined hybrid result
#[derive(Debug, Clone)]
pub struct HybridOutcome {
    /// Which provider the recommendation came from, if any
    pub source: Option<ProviderKind>,
    pub analysis: Value,
}

impl HybridOutcome {
    pub fn is_success(&self) -> bool {
        self.source.is_some()
    }
}

/// Merge the two outcomes into the hybrid analysis payload
pub fn combine(
    analysis_type: AnalysisType,
    gemini: &ProviderResult,
    ollama: &ProviderResult,
) -> HybridOutcome {
    let gemini_value = as_payload(gemini);
    let ollama_value = as_payload(ollama);
    let comparison = compare(&gemini_value, &ollama_value);

    let source = match (comparison.gemini_success, comparison.ollama_success) {
        (true, _) => Some(ProviderKind::Gemini),
        (false, true) => Some(ProviderKind::Ollama),
        (false, false) => None,
    };

    let recommended = match source {
        Some(ProviderKind::Gemini) => json!({ "source": "gemini", "result": gemini_value.clone() }),
        Some(ProviderKind::Ollama) => json!({ "source": "ollama", "result": ollama_value.clone() }),
        None => json!({ "source": "none", "error": ALL_PROVIDERS_FAILED }),
    };

    let mut analysis = json!({
        "analysis_type": analysis_type.as_str(),
        "gemini_result": gemini_value,
        "ollama_result": ollama_value,
        "comparison": comparison,
        "recommended_result": recommended,
    });
    // A total failure must still read as an error payload
    if source.is_none() {
        analysis["error"] = json!(ALL_PROVIDERS_FAILED);
    }

    HybridOutcome { source, analysis }
}

fn as_payload(result: &ProviderResult) -> Value {
    match result {
        Ok(value) => value.clone(),
        Err(e) => e.to_payload(),
    }
}

/// Compare two provider payloads
pub fn compare(gemini: &Value, ollama: &Value) -> Comparison {
    let gemini_success = is_success_payload(gemini);
    let ollama_success = is_success_payload(ollama);

    let (consistency_score, differences) = if gemini_success && ollama_success {
        (
            consistency_score(summary_text(gemini), summary_text(ollama)),
            field_differences(gemini, ollama),
        )
    } else {
        (0.0, Vec::new())
    };

    Comparison {
        gemini_success,
        ollama_success,
        consistency_score,
        differences,
    }
}

fn summary_text(value: &Value) -> &str {
    value.get("summary").and_then(Value::as_str).unwrap_or("")
}

/// Jaccard similarity over whitespace-separated tokens
pub fn consistency_score(a: &str, b: &str) -> f64 {
    let a: BTreeSet<&str> = a.split_whitespace().collect();
    let b: BTreeSet<&str> = b.split_whitespace().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let common = a.intersection(&b).count();
    let total = a.union(&b).count();
    common as f64 / total as f64
}

fn field_differences(gemini: &Value, ollama: &Value) -> Vec<String> {
    let keys = |v: &Value| -> BTreeSet<String> {
        v.as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    };
    let gemini_keys = keys(gemini);
    let ollama_keys = keys(ollama);

    let mut differences: Vec<String> = gemini_keys
        .difference(&ollama_keys)
        .map(|k| format!("{} (gemini only)", k))
        .chain(
            ollama_keys
                .difference(&gemini_keys)
                .map(|k| format!("{} (ollama only)", k)),
        )
        .collect();
    differences.sort();
    differences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ProviderError;

    #[test]
    fn test_consistency_score_bounds() {
        assert_eq!(consistency_score("a b c", "a b c"), 1.0);
        assert_eq!(consistency_score("a b", "c d"), 0.0);
        assert_eq!(consistency_score("", "a"), 0.0);

        let score = consistency_score("food spending is high", "food spending is low");
        assert!((score - 3.0 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_both_succeed_prefers_gemini() {
        let gemini = Ok(json!({"summary": "high food spending", "risk_factors": []}));
        let ollama = Ok(json!({"summary": "food spending high", "habits": []}));

        let outcome = combine(AnalysisType::Pattern, &gemini, &ollama);
        assert_eq!(outcome.source, Some(ProviderKind::Gemini));
        assert_eq!(outcome.analysis["recommended_result"]["source"], "gemini");
        assert!(outcome.analysis.get("error").is_none());

        let comparison = &outcome.analysis["comparison"];
        assert_eq!(comparison["gemini_success"], true);
        assert_eq!(comparison["ollama_success"], true);
        let score = comparison["consistency_score"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));
        assert_eq!(score, 1.0);
        assert_eq!(
            comparison["differences"],
            json!(["habits (ollama only)", "risk_factors (gemini only)"])
        );
    }

    #[test]
    fn test_only_ollama_succeeds() {
        let gemini = Err(ProviderError::Unavailable("Gemini API not configured".into()));
        let ollama = Ok(json!({"summary": "ok"}));

        let outcome = combine(AnalysisType::Report, &gemini, &ollama);
        assert_eq!(outcome.source, Some(ProviderKind::Ollama));
        assert_eq!(outcome.analysis["recommended_result"]["result"]["summary"], "ok");
        assert_eq!(outcome.analysis["gemini_result"]["error"], "Gemini API not configured");
        assert_eq!(outcome.analysis["comparison"]["consistency_score"], 0.0);
    }

    #[test]
    fn test_both_fail() {
        let gemini = Err(ProviderError::Request("503".into()));
        let ollama = Ok(json!({"error": "unreachable"}));

        let outcome = combine(AnalysisType::Pattern, &gemini, &ollama);
        assert!(!outcome.is_success());
        assert_eq!(outcome.analysis["error"], ALL_PROVIDERS_FAILED);
        assert_eq!(outcome.analysis["recommended_result"]["source"], "none");
        assert_eq!(outcome.analysis["recommended_result"]["error"], ALL_PROVIDERS_FAILED);
        assert_eq!(outcome.analysis["comparison"]["ollama_success"], false);
    }
}
