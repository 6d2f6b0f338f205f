//! JSON extraction from model responses
//!
//! Models often wrap their JSON in prose or code fences, so the payload is
//! taken from the first `{` to the last `}`.

use serde_json::Value;

use super::types::ProviderError;

/// Longest raw response kept in a parse error
const RAW_RESPONSE_LIMIT: usize = 200;

/// Parse the JSON object embedded in a model response
pub fn parse_analysis(response: &str) -> Result<Value, ProviderError> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            match serde_json::from_str::<Value>(json_str) {
                Ok(value @ Value::Object(_)) => Ok(value),
                Ok(_) => Err(ProviderError::ResponseParse {
                    message: "Model response is not a JSON object".into(),
                    raw_response: truncate(response),
                }),
                Err(e) => Err(ProviderError::ResponseParse {
                    message: format!("Invalid JSON from model: {}", e),
                    raw_response: truncate(json_str),
                }),
            }
        }
        _ => Err(ProviderError::ResponseParse {
            message: "No JSON found in model response".into(),
            raw_response: truncate(response),
        }),
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() > RAW_RESPONSE_LIMIT {
        let cut: String = s.chars().take(RAW_RESPONSE_LIMIT).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
