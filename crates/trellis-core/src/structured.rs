//! Helpers for coaxing typed objects out of a text-only reasoning service.

use serde::de::DeserializeOwned;

use crate::error::{Result, TrellisError};
use crate::traits::Reasoner;

/// Append a JSON-only instruction carrying `schema` to `prompt`.
pub fn schema_prompt(prompt: &str, schema: &serde_json::Value) -> String {
    let schema_text =
        serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "{}\n\nRespond with ONLY valid JSON matching this schema:\n{}",
        prompt, schema_text
    )
}

/// Extract JSON from a response that may contain markdown code fences.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }
    trimmed
}

/// Parse the JSON object embedded in a reply.
pub fn parse_json(reply: &str) -> Result<serde_json::Value> {
    serde_json::from_str(extract_json(reply))
        .map_err(|e| TrellisError::LlmParse(format!("reply is not valid JSON: {}", e)))
}

/// Call [`Reasoner::invoke_structured`] and deserialize the object into `T`.
///
/// A reply that parses as JSON but does not fit `T` is an `LlmParse` error.
pub async fn invoke_typed<T: DeserializeOwned>(
    reasoner: &dyn Reasoner,
    prompt: String,
    schema: serde_json::Value,
) -> Result<T> {
    let value = reasoner.invoke_structured(prompt, schema).await?;
    serde_json::from_value(value)
        .map_err(|e| TrellisError::LlmParse(format!("reply does not match schema: {}", e)))
}
