//! Text normalization used by the sanitizer and the output resolver.
//!
//! The rules here are deliberately conservative: format-specific cleanups
//! (URL, email) pass invalid input through unchanged rather than nulling it,
//! so a bad value survives for the editor to surface instead of silently
//! disappearing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("markup pattern should compile"));

static EMAIL_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern should compile"));

static UUID_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid pattern should compile")
});

/// Whether a string looks like an email address.
pub fn is_email(input: &str) -> bool {
    EMAIL_FORMAT.is_match(input.trim())
}

/// Whether a string parses as an absolute URL.
pub fn is_url(input: &str) -> bool {
    url::Url::parse(input.trim()).is_ok()
}

/// Whether a string is a hyphenated UUID.
pub fn is_uuid(input: &str) -> bool {
    UUID_FORMAT.is_match(input.trim())
}

/// Strip markup tags from a string, leaving the text content.
pub fn strip_markup(input: &str) -> String {
    MARKUP_TAG.replace_all(input, "").to_string()
}

/// Generic "safe text" rule: trim, drop control characters, strip markup.
pub fn safe_text(input: &str) -> String {
    let without_markup = strip_markup(input);
    without_markup.chars().filter(|ch| !ch.is_control()).collect::<String>().trim().to_string()
}

/// Email cleanup: trim and lowercase. Input that does not look like an email
/// address is returned unchanged.
pub fn clean_email(input: &str) -> String {
    let cleaned = input.trim().to_lowercase();
    if EMAIL_FORMAT.is_match(&cleaned) {
        cleaned
    } else {
        input.to_string()
    }
}

/// URL cleanup: parse and reserialize, normalizing scheme and host casing.
/// Unparseable input is returned unchanged.
pub fn clean_url(input: &str) -> String {
    match url::Url::parse(input.trim()) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => input.to_string(),
    }
}

/// Truthiness cast used by the sanitizer's boolean coercion.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(text) => {
            let trimmed = text.trim();
            !trimmed.is_empty() && trimmed != "0" && !trimmed.eq_ignore_ascii_case("false")
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Numeric cast used by the sanitizer's integer coercion. Non-numeric input
/// casts to 0.
pub fn integer_cast(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|n| n as i64)).unwrap_or(0),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|n| n as i64))
                .unwrap_or(0)
        }
        Value::Bool(flag) => i64::from(*flag),
        _ => 0,
    }
}
