//! Resolved query results: field values, records, and the result envelope.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::schema::PrimitiveKind;

/// One resolved, typed field inside a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValue {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: PrimitiveKind,
    pub value: Value,
}

impl FieldValue {
    pub fn new(name: impl Into<String>, field_type: PrimitiveKind, value: Value) -> Self {
        Self {
            name: name.into(),
            field_type,
            value,
        }
    }

    /// Convenience for string-typed metadata entries.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, PrimitiveKind::String, Value::String(value.into()))
    }
}

/// One resolved item's field map, keyed by mapping key in declaration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultRecord {
    pub result: IndexMap<String, FieldValue>,
}

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, field: FieldValue) {
        self.result.insert(key.into(), field);
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.result.get(key)
    }
}

/// Resolver output: mapped records, or raw matched items when the output
/// schema declares no mappings (passthrough mode for single-blob consumers).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResolvedOutput {
    Records(Vec<ResultRecord>),
    Passthrough(Vec<Value>),
}

impl ResolvedOutput {
    pub fn len(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            Self::Passthrough(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the records, when the resolver ran in mapping mode.
    pub fn records(&self) -> Option<&[ResultRecord]> {
        match self {
            Self::Records(records) => Some(records),
            Self::Passthrough(_) => None,
        }
    }
}

impl Default for ResolvedOutput {
    fn default() -> Self {
        Self::Records(Vec::new())
    }
}

/// Final result of one query execution. Built fresh per call; never cached.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResultEnvelope {
    pub is_collection: bool,
    /// Execution metadata (`last_updated`, `total_count`, query-specific
    /// additions), keyed by metadata name.
    pub metadata: IndexMap<String, FieldValue>,
    pub results: ResolvedOutput,
}
