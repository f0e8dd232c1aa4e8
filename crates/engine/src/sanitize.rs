//! Schema-driven sanitization for configuration values.
//!
//! Sanitization never fails; it degrades. The walk mirrors the validator but
//! produces a cleaned value: primitive leaves are normalized per the coercion
//! table, objects are rebuilt from declared fields only (unknown keys are how
//! persisted configs would smuggle arbitrary payloads, so they are dropped),
//! and `Const` leaves are pinned to their declared value regardless of input.
//!
//! Sanitization is idempotent: `sanitize(S, sanitize(S, V)) == sanitize(S, V)`.

use fieldlink_types::schema::PrimitiveKind;
use fieldlink_types::{TypeSchema, is_empty_value};
use fieldlink_util::text::{clean_email, clean_url, integer_cast, safe_text, truthy};
use serde_json::{Map, Value};

/// Sanitize `value` against `schema`, returning the cleaned value.
pub fn sanitize(schema: &TypeSchema, value: &Value) -> Value {
    match schema {
        TypeSchema::SkipSanitize(_) => value.clone(),
        TypeSchema::Nullable(inner) => {
            if is_empty_value(value) {
                Value::Null
            } else {
                sanitize(inner, value)
            }
        }
        TypeSchema::Const(pinned) => pinned.clone(),
        TypeSchema::StringMatching(_) => match value.as_str() {
            Some(text) => Value::String(text.trim().to_string()),
            None => value.clone(),
        },
        TypeSchema::Primitive(kind) => sanitize_primitive(*kind, value),
        TypeSchema::Object(fields) => {
            let empty = Map::new();
            let input = value.as_object().unwrap_or(&empty);
            let mut output = Map::new();
            for (name, field_schema) in fields {
                // Const fields are pinned even when the input omits them.
                if let TypeSchema::Const(pinned) = field_schema {
                    output.insert(name.clone(), pinned.clone());
                    continue;
                }
                if let Some(field_value) = input.get(name) {
                    output.insert(name.clone(), sanitize(field_schema, field_value));
                }
            }
            Value::Object(output)
        }
        TypeSchema::ListOf(element) => match value.as_array() {
            Some(items) => Value::Array(items.iter().map(|item| sanitize(element, item)).collect()),
            None => Value::Array(Vec::new()),
        },
        TypeSchema::Record { key, value: value_schema } => {
            let Some(map) = value.as_object() else {
                return Value::Object(Map::new());
            };
            let mut output = Map::new();
            for (entry_key, entry_value) in map {
                // Entries whose key fails the key schema are dropped.
                if let TypeSchema::StringMatching(pattern) = key.unwrapped()
                    && !pattern.is_match(entry_key)
                {
                    continue;
                }
                let sanitized_key = match sanitize(key, &Value::String(entry_key.clone())) {
                    Value::String(text) => text,
                    _ => entry_key.clone(),
                };
                output.insert(sanitized_key, sanitize(value_schema, entry_value));
            }
            Value::Object(output)
        }
    }
}

fn sanitize_primitive(kind: PrimitiveKind, value: &Value) -> Value {
    match kind {
        PrimitiveKind::String => Value::String(safe_text(&scalar_to_string(value))),
        PrimitiveKind::Integer => Value::from(integer_cast(value)),
        PrimitiveKind::Boolean => Value::Bool(truthy(value)),
        PrimitiveKind::Url | PrimitiveKind::ImageUrl => match value.as_str() {
            Some(text) => Value::String(clean_url(text)),
            None => value.clone(),
        },
        PrimitiveKind::Email => match value.as_str() {
            Some(text) => Value::String(clean_email(text)),
            None => value.clone(),
        },
        // The remaining kinds pass through unmodified.
        PrimitiveKind::Null
        | PrimitiveKind::Id
        | PrimitiveKind::ImageAlt
        | PrimitiveKind::Html
        | PrimitiveKind::Price
        | PrimitiveKind::Base64
        | PrimitiveKind::Uuid
        | PrimitiveKind::JsonPath
        | PrimitiveKind::Any => value.clone(),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => String::new(),
    }
}
