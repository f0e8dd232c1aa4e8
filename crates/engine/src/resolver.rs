//! JSONPath-driven extraction of normalized field records from response
//! documents.
//!
//! Resolution is deliberately forgiving below the document level: a root path
//! matching nothing yields an empty result set, and a field whose path
//! matches nothing (or fails to evaluate) degrades to its default value
//! without invalidating the rest of the item. Only an unparseable body is
//! fatal, and that is the decoder's call before this module runs.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use fieldlink_types::schema::PrimitiveKind;
use fieldlink_types::{FieldMapping, FieldValue, OutputSchema, ResolvedOutput, ResultRecord};
use fieldlink_util::text::strip_markup;
use serde_json::Value;
use tracing::warn;

/// Project a parsed response document through an output schema.
///
/// With mappings declared, each located item becomes a [`ResultRecord`] in
/// original order. With no mappings, the located items are returned raw
/// (passthrough mode).
pub fn resolve(document: &Value, schema: &OutputSchema) -> ResolvedOutput {
    let items = locate_items(document, schema);

    if schema.mappings.is_empty() {
        return ResolvedOutput::Passthrough(items);
    }

    let records = items
        .iter()
        .map(|item| {
            let mut record = ResultRecord::new();
            for (key, mapping) in &schema.mappings {
                record.insert(key.clone(), resolve_field(item, mapping));
            }
            record
        })
        .collect();
    ResolvedOutput::Records(records)
}

/// Apply the root path once to locate the item list.
///
/// JSONPath evaluation always yields an array of matches; collection queries
/// keep all of them, single-item queries keep the first. Zero matches is an
/// empty result, not an error.
fn locate_items(document: &Value, schema: &OutputSchema) -> Vec<Value> {
    match &schema.root_path {
        Some(root_path) => {
            let matches = match jsonpath_lib::select(document, root_path) {
                Ok(matches) => matches,
                Err(error) => {
                    warn!(path = %root_path, error = ?error, "root path failed to evaluate");
                    Vec::new()
                }
            };
            if schema.is_collection {
                matches.into_iter().cloned().collect()
            } else {
                matches.first().map(|&item| vec![item.clone()]).unwrap_or_default()
            }
        }
        None => {
            if schema.is_collection
                && let Value::Array(items) = document
            {
                return items.clone();
            }
            vec![document.clone()]
        }
    }
}

fn resolve_field(item: &Value, mapping: &FieldMapping) -> FieldValue {
    if let Some(generate) = &mapping.generate {
        // Generated fields bypass path extraction and type post-processing.
        return FieldValue::new(mapping.name.clone(), mapping.field_type, generate.apply(item));
    }

    let extracted = match &mapping.path {
        Some(path) => extract_path_value(item, path, mapping),
        None => default_value(mapping),
    };

    FieldValue::new(mapping.name.clone(), mapping.field_type, apply_field_type(mapping.field_type, extracted))
}

/// The match-count unwrap rule: one match unwraps to the scalar, several are
/// kept as an array, none falls back to the mapping default.
fn extract_path_value(item: &Value, path: &str, mapping: &FieldMapping) -> Value {
    let matches = match jsonpath_lib::select(item, path) {
        Ok(matches) => matches,
        Err(error) => {
            warn!(path = %path, field = %mapping.name, error = ?error, "field path failed to evaluate");
            return default_value(mapping);
        }
    };

    match matches.len() {
        0 => default_value(mapping),
        1 => matches[0].clone(),
        _ => Value::Array(matches.into_iter().cloned().collect()),
    }
}

fn default_value(mapping: &FieldMapping) -> Value {
    Value::String(mapping.default_value.clone().unwrap_or_default())
}

/// Per-type post-processing of extracted values. Types without an entry pass
/// through unchanged, as do values the processing does not apply to.
fn apply_field_type(field_type: PrimitiveKind, value: Value) -> Value {
    match field_type {
        PrimitiveKind::Base64 => match &value {
            Value::String(encoded) => BASE64_STANDARD
                .decode(encoded)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .map(Value::String)
                .unwrap_or(value),
            _ => value,
        },
        PrimitiveKind::Price => match as_f64(&value) {
            Some(amount) => Value::String(format!("${amount:.2}")),
            None => value,
        },
        PrimitiveKind::String => match &value {
            Value::String(text) => Value::String(strip_markup(text)),
            _ => value,
        },
        _ => value,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_start_matches('$').parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlink_types::{GeneratedField, OutputSchema};
    use serde_json::json;

    #[test]
    fn collection_resolution_preserves_order_and_values() {
        let document = json!({
            "records": [
                {"id": 1, "fields": {"Name": "A"}},
                {"id": 2, "fields": {"Name": "B"}}
            ]
        });
        let schema = OutputSchema::collection("$.records[*]")
            .with_mapping("id", FieldMapping::path("ID", PrimitiveKind::Id, "$.id"))
            .with_mapping("name", FieldMapping::path("Name", PrimitiveKind::String, "$.fields.Name"));

        let output = resolve(&document, &schema);
        let records = output.records().expect("mapping mode");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id").expect("id field").value, json!(1));
        assert_eq!(records[0].get("name").expect("name field").value, json!("A"));
        assert_eq!(records[1].get("id").expect("id field").value, json!(2));
        assert_eq!(records[1].get("name").expect("name field").value, json!("B"));
    }

    #[test]
    fn match_count_unwrap_rule() {
        let mapping = FieldMapping::path("Tags", PrimitiveKind::Any, "$.tags[*]").with_default("none");

        let many = extract_path_value(&json!({"tags": ["a", "b"]}), "$.tags[*]", &mapping);
        assert_eq!(many, json!(["a", "b"]));

        let one = extract_path_value(&json!({"tags": ["a"]}), "$.tags[*]", &mapping);
        assert_eq!(one, json!("a"));

        let none = extract_path_value(&json!({"tags": []}), "$.tags[*]", &mapping);
        assert_eq!(none, json!("none"));
    }

    #[test]
    fn missing_path_defaults_to_empty_string() {
        let schema = OutputSchema::single().with_mapping("title", FieldMapping::path("Title", PrimitiveKind::String, "$.title"));
        let output = resolve(&json!({"other": 1}), &schema);
        let records = output.records().expect("mapping mode");
        assert_eq!(records[0].get("title").expect("title field").value, json!(""));
    }

    #[test]
    fn empty_collection_root_yields_empty_result_not_error() {
        let schema = OutputSchema::collection("$.records[*]")
            .with_mapping("id", FieldMapping::path("ID", PrimitiveKind::Id, "$.id"));
        let output = resolve(&json!({"records": []}), &schema);
        assert!(output.is_empty());
    }

    #[test]
    fn single_item_root_uses_first_match_only() {
        let document = json!({"items": [{"sku": "a"}, {"sku": "b"}]});
        let mut schema = OutputSchema::single().with_root_path("$.items[*]");
        schema = schema.with_mapping("sku", FieldMapping::path("SKU", PrimitiveKind::String, "$.sku"));

        let output = resolve(&document, &schema);
        let records = output.records().expect("mapping mode");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("sku").expect("sku field").value, json!("a"));
    }

    #[test]
    fn no_root_path_wraps_whole_document_as_single_item() {
        let schema = OutputSchema::single().with_mapping("name", FieldMapping::path("Name", PrimitiveKind::String, "$.name"));
        let output = resolve(&json!({"name": "solo"}), &schema);
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn passthrough_mode_returns_raw_items() {
        let document = json!({"records": [{"id": 1}, {"id": 2}]});
        let schema = OutputSchema::collection("$.records[*]");

        let ResolvedOutput::Passthrough(items) = resolve(&document, &schema) else {
            panic!("expected passthrough mode");
        };
        assert_eq!(items, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn price_formatting_is_dollar_prefixed_two_decimals() {
        assert_eq!(apply_field_type(PrimitiveKind::Price, json!(9.5)), json!("$9.50"));
        assert_eq!(apply_field_type(PrimitiveKind::Price, json!("12")), json!("$12.00"));
        assert_eq!(apply_field_type(PrimitiveKind::Price, json!("n/a")), json!("n/a"));
    }

    #[test]
    fn base64_fields_decode_to_text() {
        let encoded = BASE64_STANDARD.encode("hello");
        assert_eq!(apply_field_type(PrimitiveKind::Base64, json!(encoded)), json!("hello"));
        assert_eq!(apply_field_type(PrimitiveKind::Base64, json!("not base64!!")), json!("not base64!!"));
    }

    #[test]
    fn string_fields_strip_markup() {
        assert_eq!(
            apply_field_type(PrimitiveKind::String, json!("<p>body <b>text</b></p>")),
            json!("body text")
        );
    }

    #[test]
    fn generated_fields_bypass_path_and_type_steps() {
        let schema = OutputSchema::single().with_mapping(
            "permalink",
            FieldMapping::generated(
                "Permalink",
                PrimitiveKind::String,
                GeneratedField::new(|item| json!(format!("/products/{}", item["id"]))),
            ),
        );

        let output = resolve(&json!({"id": 7}), &schema);
        let records = output.records().expect("mapping mode");
        assert_eq!(records[0].get("permalink").expect("generated field").value, json!("/products/7"));
    }

    #[test]
    fn one_bad_field_does_not_invalidate_the_item() {
        let schema = OutputSchema::single()
            .with_mapping("good", FieldMapping::path("Good", PrimitiveKind::String, "$.present"))
            .with_mapping("bad", FieldMapping::path("Bad", PrimitiveKind::String, "$.absent").with_default("fallback"));

        let output = resolve(&json!({"present": "yes"}), &schema);
        let records = output.records().expect("mapping mode");
        assert_eq!(records[0].get("good").expect("good field").value, json!("yes"));
        assert_eq!(records[0].get("bad").expect("bad field").value, json!("fallback"));
    }

    #[test]
    fn bracket_quoted_member_access_is_supported() {
        let document = json!({"records": [{"fields": {"Column Name": "cell"}}]});
        let schema = OutputSchema::collection("$.records[*]")
            .with_mapping("cell", FieldMapping::path("Cell", PrimitiveKind::String, "$.fields['Column Name']"));

        let output = resolve(&document, &schema);
        let records = output.records().expect("mapping mode");
        assert_eq!(records[0].get("cell").expect("cell field").value, json!("cell"));
    }
}
