//! Schema validation for configuration values.
//!
//! Validation walks a [`TypeSchema`] and a value tree in parallel and reports
//! every schema violation it finds. Sibling fields are all checked (one
//! violation per field, first failure wins within a field) so a submitted
//! configuration gets a complete diagnosis in a single round trip. Unknown
//! object keys are not a validation error; the sanitizer drops them later.

use fieldlink_types::{TypeSchema, ValidationError, Violation, is_empty_value};
use fieldlink_types::schema::PrimitiveKind;
use fieldlink_util::text::{is_email, is_url, is_uuid};
use serde_json::Value;

/// Validate `value` against `schema`.
///
/// Returns `Ok(())` when the value conforms; otherwise a [`ValidationError`]
/// carrying every violation found, each with a dotted field path.
pub fn validate(schema: &TypeSchema, value: &Value) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    validate_at(schema, value, "$", &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(violations))
    }
}

fn validate_at(schema: &TypeSchema, value: &Value, path: &str, violations: &mut Vec<Violation>) {
    match schema {
        TypeSchema::Nullable(inner) => {
            if !is_empty_value(value) {
                validate_at(inner, value, path, violations);
            }
        }
        TypeSchema::SkipSanitize(inner) => validate_at(inner, value, path, violations),
        TypeSchema::Const(expected) => {
            if value != expected {
                violations.push(Violation::new(path, format!("must equal the constant {expected}")));
            }
        }
        TypeSchema::StringMatching(pattern) => match value.as_str() {
            Some(text) if pattern.is_match(text) => {}
            Some(_) => violations.push(Violation::new(path, format!("must match pattern {}", pattern.as_str()))),
            None => violations.push(Violation::new(path, "expected a string")),
        },
        TypeSchema::Primitive(kind) => {
            if let Some(reason) = primitive_violation(*kind, value) {
                violations.push(Violation::new(path, reason));
            }
        }
        TypeSchema::Object(fields) => {
            let Some(map) = value.as_object() else {
                violations.push(Violation::new(path, "expected an object"));
                return;
            };
            for (name, field_schema) in fields {
                let field_path = format!("{path}.{name}");
                match map.get(name) {
                    Some(field_value) => validate_at(field_schema, field_value, &field_path, violations),
                    None if accepts_missing(field_schema) => {}
                    None => violations.push(Violation::new(field_path, "missing required field")),
                }
            }
        }
        TypeSchema::ListOf(element) => {
            let Some(items) = value.as_array() else {
                violations.push(Violation::new(path, "expected a sequential list"));
                return;
            };
            for (index, item) in items.iter().enumerate() {
                validate_at(element, item, &format!("{path}[{index}]"), violations);
            }
        }
        TypeSchema::Record { key, value: value_schema } => {
            let Some(map) = value.as_object() else {
                violations.push(Violation::new(path, "expected an associative structure"));
                return;
            };
            for (entry_key, entry_value) in map {
                let entry_path = format!("{path}.{entry_key}");
                if let TypeSchema::StringMatching(pattern) = key.unwrapped()
                    && !pattern.is_match(entry_key)
                {
                    violations.push(Violation::new(&entry_path, format!("key must match pattern {}", pattern.as_str())));
                    continue;
                }
                validate_at(value_schema, entry_value, &entry_path, violations);
            }
        }
    }
}

fn accepts_missing(schema: &TypeSchema) -> bool {
    match schema {
        TypeSchema::Nullable(_) => true,
        TypeSchema::SkipSanitize(inner) => accepts_missing(inner),
        _ => false,
    }
}

fn primitive_violation(kind: PrimitiveKind, value: &Value) -> Option<String> {
    match kind {
        PrimitiveKind::Any => None,
        PrimitiveKind::Null => (!value.is_null()).then(|| "expected null".to_string()),
        PrimitiveKind::Boolean => (!value.is_boolean()).then(|| "expected a boolean".to_string()),
        PrimitiveKind::Integer => match value {
            Value::Number(number) if number.as_i64().is_some() => None,
            _ => Some("expected an integer".to_string()),
        },
        PrimitiveKind::Id | PrimitiveKind::Price => match value {
            Value::String(_) | Value::Number(_) => None,
            _ => Some("expected a string or number".to_string()),
        },
        PrimitiveKind::Email => match value.as_str() {
            Some(text) if is_email(text) => None,
            Some(_) => Some("invalid email address format".to_string()),
            None => Some("expected a string".to_string()),
        },
        PrimitiveKind::Url | PrimitiveKind::ImageUrl => match value.as_str() {
            Some(text) if is_url(text) => None,
            Some(_) => Some("invalid URL format".to_string()),
            None => Some("expected a string".to_string()),
        },
        PrimitiveKind::Uuid => match value.as_str() {
            Some(text) if is_uuid(text) => None,
            Some(_) => Some("invalid UUID format".to_string()),
            None => Some("expected a string".to_string()),
        },
        PrimitiveKind::JsonPath => match value.as_str() {
            Some(text) if text.trim_start().starts_with('$') => None,
            Some(_) => Some("JSONPath must start with '$'".to_string()),
            None => Some("expected a string".to_string()),
        },
        PrimitiveKind::String
        | PrimitiveKind::Html
        | PrimitiveKind::ImageAlt
        | PrimitiveKind::Base64 => (!value.is_string()).then(|| "expected a string".to_string()),
    }
}
