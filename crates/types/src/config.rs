//! Configuration data model for data sources and queries.
//!
//! These structures are the declarative half of the engine: a
//! [`DataSourceConfig`] describes how to reach a remote API, and the output
//! schema types describe how to project its responses into named fields.
//! Instances are immutable once built; updates construct a new value.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::PrimitiveKind;

/// Validated, sanitized configuration for one remote data source.
///
/// Only the engine's `DataSource::from_config` path produces these; there is
/// no bare constructor on purpose. Service-specific fields that passed
/// sanitization but are not part of the common shape are retained in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Service identifier (e.g. "shopify", "generic-http"). Pinned by a
    /// `Const` schema field so submitted payloads cannot change it.
    pub service: String,
    /// Schema version for the service-specific portion of the config.
    pub service_schema_version: u32,
    /// URL-safe identifier, `^[a-z0-9-]+$`.
    pub slug: String,
    /// Stable identity assigned by the configuration store, if persisted.
    #[serde(default)]
    pub uuid: Option<String>,
    /// Base endpoint for requests against this source.
    pub endpoint: String,
    /// Headers sent with every request to this source.
    #[serde(default)]
    pub request_headers: IndexMap<String, String>,
    /// Human-readable name shown by consuming surfaces.
    pub display_name: String,
    /// Optional icon/image for consuming surfaces.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Sanitized service-specific fields outside the common shape.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// How one query input variable is bound at render time.
///
/// Overrides are declared here and resolved by the consuming surface; the
/// engine itself never reads request query strings or URL segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputOverride {
    /// Name of the query-string parameter or URL segment to read.
    pub target: String,
    #[serde(rename = "type")]
    pub kind: OverrideKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    QueryVar,
    Url,
}

/// Declaration of a single query input variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputVarDef {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: PrimitiveKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub overrides: Vec<InputOverride>,
}

impl InputVarDef {
    pub fn new(name: impl Into<String>, var_type: PrimitiveKind) -> Self {
        Self {
            name: name.into(),
            var_type,
            required: false,
            default_value: None,
            overrides: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_override(mut self, target: impl Into<String>, kind: OverrideKind) -> Self {
        self.overrides.push(InputOverride {
            target: target.into(),
            kind,
        });
        self
    }
}

/// Strategy function computing a field value directly from the parsed item,
/// bypassing JSONPath extraction and type post-processing.
///
/// Kept behind a newtype so [`FieldMapping`] stays `Clone`/`Debug` and the
/// resolver's contract remains data-driven: a generated field is an injected
/// strategy, not an arbitrary closure baked into persisted configuration.
#[derive(Clone)]
pub struct GeneratedField(Arc<dyn Fn(&Value) -> Value + Send + Sync>);

impl GeneratedField {
    pub fn new(generate: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(generate))
    }

    pub fn apply(&self, item: &Value) -> Value {
        (self.0)(item)
    }
}

impl std::fmt::Debug for GeneratedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GeneratedField(..)")
    }
}

/// Projection of one output field from a resolved item.
///
/// Exactly one of `path` or `generate` is meaningful. With neither, the field
/// resolves to its default value (or the empty string).
#[derive(Debug, Clone)]
pub struct FieldMapping {
    /// Display name carried through to the resolved field value.
    pub name: String,
    /// JSONPath evaluated relative to each item.
    pub path: Option<String>,
    pub field_type: PrimitiveKind,
    /// Fallback when the path matches nothing.
    pub default_value: Option<String>,
    pub generate: Option<GeneratedField>,
}

impl FieldMapping {
    /// Path-extracted field.
    pub fn path(name: impl Into<String>, field_type: PrimitiveKind, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
            field_type,
            default_value: None,
            generate: None,
        }
    }

    /// Field computed by a strategy function instead of a path.
    pub fn generated(name: impl Into<String>, field_type: PrimitiveKind, generate: GeneratedField) -> Self {
        Self {
            name: name.into(),
            path: None,
            field_type,
            default_value: None,
            generate: Some(generate),
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// JSONPath-driven description of how a raw response becomes field records.
#[derive(Debug, Clone, Default)]
pub struct OutputSchema {
    /// Applied once to the whole response to locate the item or collection
    /// root. Unset means the document itself is the single item.
    pub root_path: Option<String>,
    /// Whether the root matches are a collection or a single item.
    pub is_collection: bool,
    /// Field projections, processed in declaration order. Empty mappings put
    /// the resolver into passthrough mode.
    pub mappings: IndexMap<String, FieldMapping>,
}

impl OutputSchema {
    pub fn collection(root_path: impl Into<String>) -> Self {
        Self {
            root_path: Some(root_path.into()),
            is_collection: true,
            mappings: IndexMap::new(),
        }
    }

    pub fn single() -> Self {
        Self::default()
    }

    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = Some(root_path.into());
        self
    }

    pub fn with_mapping(mut self, key: impl Into<String>, mapping: FieldMapping) -> Self {
        self.mappings.insert(key.into(), mapping);
        self
    }
}
