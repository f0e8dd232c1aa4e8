//! The type-description DSL used for configuration validation and sanitization.
//!
//! A [`TypeSchema`] describes the expected shape of a nested configuration
//! value: data-source configs, query input schemas, and anything else that is
//! persisted or accepted from an editor surface. Schemas are pure data; the
//! same instance is handed to both the validator and the sanitizer, which walk
//! it in parallel with a value tree.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Leaf value kinds understood by the validator, the sanitizer, and the
/// output-schema resolver's per-field post-processing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    String,
    Integer,
    Boolean,
    Null,
    Id,
    Url,
    ImageUrl,
    Email,
    ImageAlt,
    Html,
    Price,
    Base64,
    Uuid,
    JsonPath,
    Any,
}

impl PrimitiveKind {
    /// Canonical snake_case name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Id => "id",
            Self::Url => "url",
            Self::ImageUrl => "image_url",
            Self::Email => "email",
            Self::ImageAlt => "image_alt",
            Self::Html => "html",
            Self::Price => "price",
            Self::Base64 => "base64",
            Self::Uuid => "uuid",
            Self::JsonPath => "json_path",
            Self::Any => "any",
        }
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recursive type description for configuration values.
///
/// Field order inside [`TypeSchema::Object`] is significant for sanitizer
/// output, so fields live in an [`IndexMap`].
#[derive(Debug, Clone)]
pub enum TypeSchema {
    /// A leaf value of the given kind.
    Primitive(PrimitiveKind),
    /// A string that must match the given pattern to validate.
    StringMatching(Regex),
    /// An object with a fixed set of named fields. Keys not declared here are
    /// dropped by the sanitizer.
    Object(IndexMap<String, TypeSchema>),
    /// A sequential list whose elements all share one schema.
    ListOf(Box<TypeSchema>),
    /// An associative map with uniform key and value schemas.
    Record {
        key: Box<TypeSchema>,
        value: Box<TypeSchema>,
    },
    /// A pinned constant. Validation requires exact equality; sanitization
    /// always emits the declared value regardless of input.
    Const(Value),
    /// Accepts the inner schema or an empty value (null, unset, "").
    Nullable(Box<TypeSchema>),
    /// Validate normally but bypass sanitization entirely.
    SkipSanitize(Box<TypeSchema>),
}

impl TypeSchema {
    pub fn string() -> Self {
        Self::Primitive(PrimitiveKind::String)
    }

    pub fn integer() -> Self {
        Self::Primitive(PrimitiveKind::Integer)
    }

    pub fn boolean() -> Self {
        Self::Primitive(PrimitiveKind::Boolean)
    }

    pub fn id() -> Self {
        Self::Primitive(PrimitiveKind::Id)
    }

    pub fn url() -> Self {
        Self::Primitive(PrimitiveKind::Url)
    }

    pub fn image_url() -> Self {
        Self::Primitive(PrimitiveKind::ImageUrl)
    }

    pub fn email() -> Self {
        Self::Primitive(PrimitiveKind::Email)
    }

    pub fn html() -> Self {
        Self::Primitive(PrimitiveKind::Html)
    }

    pub fn uuid() -> Self {
        Self::Primitive(PrimitiveKind::Uuid)
    }

    pub fn json_path() -> Self {
        Self::Primitive(PrimitiveKind::JsonPath)
    }

    pub fn any() -> Self {
        Self::Primitive(PrimitiveKind::Any)
    }

    /// Object schema from `(name, schema)` pairs, preserving declaration order.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, TypeSchema)>,
    {
        Self::Object(fields.into_iter().map(|(key, schema)| (key.into(), schema)).collect())
    }

    pub fn list_of(element: TypeSchema) -> Self {
        Self::ListOf(Box::new(element))
    }

    pub fn record(key: TypeSchema, value: TypeSchema) -> Self {
        Self::Record {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn const_value(value: impl Into<Value>) -> Self {
        Self::Const(value.into())
    }

    /// A string constrained by a regex pattern. Fails if the pattern itself
    /// does not compile, which is a programming error at schema build time.
    pub fn string_matching(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::StringMatching(Regex::new(pattern)?))
    }

    pub fn nullable(inner: TypeSchema) -> Self {
        Self::Nullable(Box::new(inner))
    }

    pub fn skip_sanitize(inner: TypeSchema) -> Self {
        Self::SkipSanitize(Box::new(inner))
    }

    /// Strip `Nullable`/`SkipSanitize` wrappers down to the underlying schema.
    pub fn unwrapped(&self) -> &TypeSchema {
        match self {
            Self::Nullable(inner) | Self::SkipSanitize(inner) => inner.unwrapped(),
            other => other,
        }
    }
}

/// Whether a value counts as "empty" for nullable short-circuiting: null,
/// missing, or an empty/whitespace-only string.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}
