//! Post-processing of raw model output for callers that need more than text.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::UseCase;

const SHORT_DESCRIPTION_LIMIT: usize = 150;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{use_case} returned malformed JSON: {reason}")]
pub struct MalformedStructuredOutput {
    pub use_case: UseCase,
    pub reason: String,
}

/// Pulls the JSON payload out of a reply that may wrap it in a Markdown
/// fence or surrounding prose.
pub fn extract_json(content: &str) -> &str {
    if let Some(start) = content.find("```json")
        && let Some(end) = content[start + 7..].find("```")
    {
        return content[start + 7..start + 7 + end].trim();
    }
    if let Some(start) = content.find("```")
        && let Some(end) = content[start + 3..].find("```")
    {
        let inner = content[start + 3..start + 3 + end].trim();
        if inner.starts_with('{') {
            return inner;
        }
    }
    if let Some(start) = content.find('{')
        && let Some(end) = content.rfind('}')
        && start < end
    {
        return &content[start..=end];
    }
    content.trim()
}

/// Parses the output of a JSON-bundle use case into its field map.
pub fn parse_bundle(
    use_case: UseCase,
    content: &str,
) -> Result<Map<String, Value>, MalformedStructuredOutput> {
    let malformed = |reason: String| MalformedStructuredOutput { use_case, reason };

    match serde_json::from_str::<Value>(extract_json(content)) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(malformed(format!("expected a JSON object, got {}", json_type(&other)))),
        Err(err) => Err(malformed(err.to_string())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Splits a comma or newline separated keyword/tag list.
pub fn split_keywords(text: &str) -> Vec<String> {
    text.split([',', '\n'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDescription {
    pub short_description: String,
    pub long_description: String,
}

/// Splits a product description reply into short and long parts. Replies
/// with `CURTA:`/`LONGA:` markers are split on them; otherwise the first
/// paragraph, capped at 150 characters, is the short part.
pub fn split_product_description(text: &str) -> ProductDescription {
    if text.contains("CURTA:")
        && let Some((head, tail)) = text.split_once("LONGA:")
    {
        let short = head.replace("CURTA:", "").trim().to_string();
        let long = tail.trim();
        return ProductDescription {
            long_description: if long.is_empty() { short.clone() } else { long.to_string() },
            short_description: short,
        };
    }

    let first_paragraph = text
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty())
        .unwrap_or(text);

    ProductDescription {
        short_description: super::render::truncate_chars(first_paragraph, SHORT_DESCRIPTION_LIMIT)
            .to_string(),
        long_description: text.to_string(),
    }
}
