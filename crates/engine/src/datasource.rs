//! Validated data-source construction.
//!
//! A [`DataSource`] is an immutable configuration holder describing how to
//! reach and authenticate against one remote API. The only construction path
//! is [`DataSource::from_config`], which validates the raw value against a
//! schema and then sanitizes it. There is no bare constructor, so an
//! unvalidated source cannot exist. Updates build a new instance.

use std::sync::Arc;

use fieldlink_api::TokenProvider;
use fieldlink_types::{DataSourceConfig, TokenError, TypeSchema, ValidationError};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::sanitize::sanitize;
use crate::validate::validate;

/// Schema fields shared by every data-source service. Service-specific
/// schemas extend this with their own fields.
pub fn base_config_schema(service: &str, schema_version: u32) -> TypeSchema {
    TypeSchema::object([
        ("service", TypeSchema::const_value(service)),
        ("service_schema_version", TypeSchema::const_value(schema_version)),
        (
            "slug",
            TypeSchema::string_matching("^[a-z0-9-]+$").expect("slug pattern should compile"),
        ),
        ("uuid", TypeSchema::nullable(TypeSchema::uuid())),
        ("endpoint", TypeSchema::url()),
        (
            "request_headers",
            TypeSchema::record(
                TypeSchema::string_matching("^[a-zA-Z0-9-]+$").expect("header pattern should compile"),
                TypeSchema::string(),
            ),
        ),
        ("display_name", TypeSchema::string()),
        ("image_url", TypeSchema::nullable(TypeSchema::image_url())),
    ])
}

/// Immutable, schema-validated remote API configuration.
#[derive(Clone)]
pub struct DataSource {
    config: DataSourceConfig,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("config", &self.config)
            .field("has_token_provider", &self.token_provider.is_some())
            .finish()
    }
}

impl DataSource {
    /// Validate and sanitize `raw` against `schema`, producing a frozen
    /// source. The sanitized value must deserialize into the common config
    /// shape; service-specific fields land in `config.extra`.
    pub fn from_config(schema: &TypeSchema, raw: &Value) -> Result<Self, ValidationError> {
        validate(schema, raw)?;
        let sanitized = sanitize(schema, raw);
        let config: DataSourceConfig = serde_json::from_value(sanitized)
            .map_err(|error| ValidationError::single("$", format!("sanitized config has unexpected shape: {error}")))?;
        debug!(slug = %config.slug, service = %config.service, "constructed data source");
        Ok(Self {
            config,
            token_provider: None,
        })
    }

    /// Attach an auth token provider. Consumed-and-returned so construction
    /// stays a single expression; the source itself remains immutable after.
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn slug(&self) -> &str {
        &self.config.slug
    }

    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    pub fn image_url(&self) -> Option<&str> {
        self.config.image_url.as_deref()
    }

    /// Static headers from configuration, without token acquisition.
    pub fn request_headers(&self) -> &IndexMap<String, String> {
        &self.config.request_headers
    }

    /// Headers with auth applied. For token-bearing sources this may trigger
    /// a token acquisition through the provider (which caches independently);
    /// the source itself is never mutated.
    pub async fn resolved_request_headers(&self) -> Result<IndexMap<String, String>, TokenError> {
        let mut headers = self.config.request_headers.clone();
        if let Some(provider) = &self.token_provider {
            let token = provider.token().await?;
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlink_api::StaticTokenProvider;
    use serde_json::json;

    fn raw_config() -> Value {
        json!({
            "service": "generic-http",
            "service_schema_version": 1,
            "slug": "books-api",
            "endpoint": "https://books.example.com/v1",
            "request_headers": {"Accept": "application/json"},
            "display_name": "Books API"
        })
    }

    #[test]
    fn from_config_builds_validated_source() {
        let schema = base_config_schema("generic-http", 1);
        let source = DataSource::from_config(&schema, &raw_config()).expect("valid config");

        assert_eq!(source.slug(), "books-api");
        assert_eq!(source.endpoint(), "https://books.example.com/v1");
        assert_eq!(source.display_name(), "Books API");
        assert!(source.image_url().is_none());
        assert_eq!(source.request_headers().get("Accept").map(String::as_str), Some("application/json"));
    }

    #[test]
    fn from_config_rejects_bad_slug() {
        let schema = base_config_schema("generic-http", 1);
        let mut raw = raw_config();
        raw["slug"] = json!("Not A Slug");
        let error = DataSource::from_config(&schema, &raw).expect_err("slug violates pattern");
        assert_eq!(error.violations[0].path, "$.slug");
    }

    #[test]
    fn service_specific_fields_survive_in_extra() {
        let schema = base_config_schema("airtable", 2);
        let base = TypeSchema::object([("base_id", TypeSchema::string())]);
        let schema = merge_object_schemas(schema, base);

        let mut raw = raw_config();
        raw["service"] = json!("airtable");
        raw["service_schema_version"] = json!(2);
        raw["base_id"] = json!("appX1");
        let source = DataSource::from_config(&schema, &raw).expect("valid config");
        assert_eq!(source.config().extra.get("base_id"), Some(&json!("appX1")));
    }

    #[tokio::test]
    async fn resolved_headers_add_bearer_token() {
        let schema = base_config_schema("generic-http", 1);
        let source = DataSource::from_config(&schema, &raw_config())
            .expect("valid config")
            .with_token_provider(Arc::new(StaticTokenProvider::new("tok-1")));

        let headers = source.resolved_request_headers().await.expect("token resolves");
        assert_eq!(headers.get("Authorization").map(String::as_str), Some("Bearer tok-1"));
        assert_eq!(headers.get("Accept").map(String::as_str), Some("application/json"));
    }

    fn merge_object_schemas(base: TypeSchema, extension: TypeSchema) -> TypeSchema {
        let (TypeSchema::Object(mut fields), TypeSchema::Object(extra)) = (base, extension) else {
            panic!("both schemas must be objects");
        };
        fields.extend(extra);
        TypeSchema::Object(fields)
    }
}
