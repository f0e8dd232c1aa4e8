//! HTTP response parsing helpers shared by the runner and the resolver.

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// Error returned when strict JSON parsing of an HTTP response fails.
#[derive(Debug, Error)]
#[error("failed to parse JSON response ({status_note}): {source}. body preview: {body_preview}")]
pub struct BodyParseError {
    status_note: String,
    #[source]
    source: serde_json::Error,
    body_preview: String,
}

impl BodyParseError {
    /// Access the truncated response preview captured during parsing.
    pub fn body_preview(&self) -> &str {
        &self.body_preview
    }
}

/// Parse HTTP response text into JSON, decorating failures with the status
/// code and a truncated, whitespace-collapsed preview of the body.
pub fn parse_body_json_strict(text: &str, status: Option<u16>) -> Result<Value, BodyParseError> {
    serde_json::from_str::<Value>(text).map_err(|error| {
        let status_note = status
            .map(|code| format!("status {code}"))
            .unwrap_or_else(|| "unknown status".to_string());
        BodyParseError {
            status_note,
            source: error,
            body_preview: truncate_body_preview(text, 200),
        }
    })
}

/// Truncate a response body for inclusion in error messages and logs.
pub fn truncate_body_preview(text: &str, limit: usize) -> String {
    if text.trim().is_empty() {
        return "<empty>".to_string();
    }

    let mut preview = String::new();
    for ch in text.chars() {
        if preview.len() >= limit {
            preview.push_str("...");
            break;
        }
        match ch {
            '\n' | '\r' | '\t' => {
                if !preview.ends_with(' ') {
                    preview.push(' ');
                }
            }
            _ => preview.push(ch),
        }
    }

    preview.trim().to_string()
}

/// Read the `Age` response header, case-insensitively, as whole seconds.
pub fn age_seconds(headers: &IndexMap<String, String>) -> Option<u64> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("age"))
        .and_then(|(_, value)| value.trim().parse::<u64>().ok())
}

/// Extract the first GraphQL error message from a response body, when the
/// payload carries a top-level `errors` array.
pub fn graphql_error_message(body: &Value) -> Option<&str> {
    body.get("errors")?.get(0)?.get("message")?.as_str()
}
