//! Declarative query definitions.
//!
//! A [`QueryContext`] couples a [`DataSource`] with an input schema, an
//! output schema, and the strategies that turn runtime input variables into
//! a concrete HTTP request: endpoint, headers, method, and body. Contexts are
//! immutable after construction and freely shareable across concurrent
//! executions.

use std::sync::Arc;

use fieldlink_types::{FieldValue, InputVarDef, OutputSchema, ResolutionError, TokenError, ValidationError, Violation};
use fieldlink_util::http::{parse_body_json_strict, truncate_body_preview};
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Value, json};

use crate::datasource::DataSource;

/// Percent-encode everything but the RFC3986 unreserved set when
/// substituting template variables.
const TEMPLATE_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Strategy producing the request endpoint.
///
/// `Custom` builders return opaque, pre-built URLs: the engine applies no
/// further encoding to them, since query authors encode inconsistently and
/// double-encoding corrupts the ones that already did.
#[derive(Clone)]
pub enum EndpointSpec {
    /// Delegate to the data source's configured endpoint.
    DataSource,
    /// URL template with `{variable}` placeholders substituted from input
    /// variables, percent-encoded.
    Template(String),
    Custom(Arc<dyn Fn(&DataSource, &IndexMap<String, String>) -> String + Send + Sync>),
}

impl std::fmt::Debug for EndpointSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataSource => f.write_str("EndpointSpec::DataSource"),
            Self::Template(template) => write!(f, "EndpointSpec::Template({template})"),
            Self::Custom(_) => f.write_str("EndpointSpec::Custom(..)"),
        }
    }
}

/// Strategy producing the request body.
#[derive(Clone)]
pub enum BodySpec {
    /// No body; the request is GET-style.
    None,
    /// Fixed GraphQL document with `variables` built from input variables,
    /// typed per each variable's declared kind.
    GraphQl { document: String },
    Custom(Arc<dyn Fn(&IndexMap<String, String>) -> Value + Send + Sync>),
}

impl std::fmt::Debug for BodySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("BodySpec::None"),
            Self::GraphQl { .. } => f.write_str("BodySpec::GraphQl"),
            Self::Custom(_) => f.write_str("BodySpec::Custom(..)"),
        }
    }
}

/// Extension point turning a raw response body into a JSON document.
///
/// Non-JSON payloads (raw HTML, Markdown) are wrapped into a JSON envelope
/// here, before they reach the output resolver.
#[derive(Clone)]
pub enum ResponseDecoder {
    Json,
    Custom(Arc<dyn Fn(&str) -> Result<Value, ResolutionError> + Send + Sync>),
}

impl std::fmt::Debug for ResponseDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => f.write_str("ResponseDecoder::Json"),
            Self::Custom(_) => f.write_str("ResponseDecoder::Custom(..)"),
        }
    }
}

/// Hook letting a query override or extend envelope metadata after the
/// standard `last_updated`/`total_count` entries are populated.
pub type MetadataHook = Arc<dyn Fn(&mut IndexMap<String, FieldValue>) + Send + Sync>;

/// A single declarative query bound to a data source.
#[derive(Clone)]
pub struct QueryContext {
    data_source: DataSource,
    query_name: String,
    input_schema: IndexMap<String, InputVarDef>,
    output_schema: OutputSchema,
    method: Option<String>,
    endpoint: EndpointSpec,
    header_overrides: IndexMap<String, String>,
    body: BodySpec,
    decoder: ResponseDecoder,
    metadata_hook: Option<MetadataHook>,
}

impl std::fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("query_name", &self.query_name)
            .field("data_source", &self.data_source)
            .field("endpoint", &self.endpoint)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl QueryContext {
    pub fn new(data_source: DataSource, query_name: impl Into<String>) -> Self {
        Self {
            data_source,
            query_name: query_name.into(),
            input_schema: IndexMap::new(),
            output_schema: OutputSchema::default(),
            method: None,
            endpoint: EndpointSpec::DataSource,
            header_overrides: IndexMap::new(),
            body: BodySpec::None,
            decoder: ResponseDecoder::Json,
            metadata_hook: None,
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, def: InputVarDef) -> Self {
        self.input_schema.insert(key.into(), def);
        self
    }

    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: EndpointSpec) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_overrides.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: BodySpec) -> Self {
        self.body = body;
        self
    }

    pub fn with_decoder(mut self, decoder: ResponseDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_metadata_hook(mut self, hook: MetadataHook) -> Self {
        self.metadata_hook = Some(hook);
        self
    }

    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }

    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn input_schema(&self) -> &IndexMap<String, InputVarDef> {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &OutputSchema {
        &self.output_schema
    }

    /// Effective HTTP method: explicit override, else POST for GraphQL-style
    /// queries, else GET.
    pub fn request_method(&self) -> String {
        if let Some(method) = &self.method {
            return method.clone();
        }
        match self.body {
            BodySpec::GraphQl { .. } => "POST".to_string(),
            _ => "GET".to_string(),
        }
    }

    /// Fill defaults and reject missing required variables.
    pub fn resolve_inputs(&self, provided: &IndexMap<String, String>) -> Result<IndexMap<String, String>, ValidationError> {
        let mut resolved = IndexMap::new();
        let mut violations = Vec::new();
        for (key, def) in &self.input_schema {
            match provided.get(key) {
                Some(value) => {
                    resolved.insert(key.clone(), value.clone());
                }
                None => match &def.default_value {
                    Some(default) => {
                        resolved.insert(key.clone(), default.clone());
                    }
                    None if def.required => {
                        violations.push(Violation::new(key, "missing required input variable"));
                    }
                    None => {}
                },
            }
        }
        if violations.is_empty() {
            Ok(resolved)
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// Concrete request endpoint for the given input variables.
    pub fn endpoint(&self, inputs: &IndexMap<String, String>) -> String {
        match &self.endpoint {
            EndpointSpec::DataSource => self.data_source.endpoint().to_string(),
            EndpointSpec::Template(template) => substitute_template(template, inputs),
            EndpointSpec::Custom(build) => build(&self.data_source, inputs),
        }
    }

    /// Data-source headers merged with query overrides; the query wins on
    /// conflict. May trigger token acquisition on auth-bearing sources.
    pub async fn request_headers(&self) -> Result<IndexMap<String, String>, TokenError> {
        let mut headers = self.data_source.resolved_request_headers().await?;
        for (name, value) in &self.header_overrides {
            headers.insert(name.clone(), value.clone());
        }
        Ok(headers)
    }

    /// Request body for the given input variables; `None` for GET-style
    /// queries.
    pub fn request_body(&self, inputs: &IndexMap<String, String>) -> Option<String> {
        match &self.body {
            BodySpec::None => None,
            BodySpec::GraphQl { document } => {
                let variables = self.typed_variables(inputs);
                Some(json!({ "query": document, "variables": variables }).to_string())
            }
            BodySpec::Custom(build) => Some(build(inputs).to_string()),
        }
    }

    /// Decode a raw response body into a JSON document.
    pub fn decode_response(&self, body: &str) -> Result<Value, ResolutionError> {
        match &self.decoder {
            ResponseDecoder::Json => parse_body_json_strict(body, None).map_err(|error| ResolutionError::UnparseableBody {
                reason: error.to_string(),
                preview: truncate_body_preview(body, 200),
            }),
            ResponseDecoder::Custom(decode) => decode(body),
        }
    }

    pub fn apply_metadata_hook(&self, metadata: &mut IndexMap<String, FieldValue>) {
        if let Some(hook) = &self.metadata_hook {
            hook(metadata);
        }
    }

    /// GraphQL variables typed per the input schema: integers and booleans
    /// become JSON numbers/booleans, everything else stays a string.
    fn typed_variables(&self, inputs: &IndexMap<String, String>) -> Value {
        use fieldlink_types::PrimitiveKind;

        let mut variables = serde_json::Map::new();
        for (key, raw) in inputs {
            let typed = match self.input_schema.get(key).map(|def| def.var_type) {
                Some(PrimitiveKind::Integer) => raw
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(raw.clone())),
                Some(PrimitiveKind::Boolean) => Value::Bool(raw.trim().eq_ignore_ascii_case("true") || raw.trim() == "1"),
                _ => Value::String(raw.clone()),
            };
            variables.insert(key.clone(), typed);
        }
        Value::Object(variables)
    }
}

fn substitute_template(template: &str, inputs: &IndexMap<String, String>) -> String {
    let mut endpoint = template.to_string();
    for (key, value) in inputs {
        let placeholder = format!("{{{key}}}");
        if endpoint.contains(&placeholder) {
            let encoded = utf8_percent_encode(value, TEMPLATE_VALUE).to_string();
            endpoint = endpoint.replace(&placeholder, &encoded);
        }
    }
    endpoint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{DataSource, base_config_schema};
    use fieldlink_types::PrimitiveKind;
    use serde_json::json;

    fn test_source() -> DataSource {
        let schema = base_config_schema("generic-http", 1);
        DataSource::from_config(
            &schema,
            &json!({
                "service": "generic-http",
                "service_schema_version": 1,
                "slug": "products",
                "endpoint": "https://shop.example.com/api/products",
                "request_headers": {"Accept": "application/json", "X-Region": "eu"},
                "display_name": "Products"
            }),
        )
        .expect("valid source")
    }

    #[test]
    fn endpoint_defaults_to_data_source() {
        let query = QueryContext::new(test_source(), "product-list");
        assert_eq!(query.endpoint(&IndexMap::new()), "https://shop.example.com/api/products");
        assert_eq!(query.request_method(), "GET");
    }

    #[test]
    fn template_endpoint_encodes_variables() {
        let query = QueryContext::new(test_source(), "product-detail")
            .with_endpoint(EndpointSpec::Template("https://shop.example.com/api/products/{id}".to_string()));

        let mut inputs = IndexMap::new();
        inputs.insert("id".to_string(), "team/42 red".to_string());
        assert_eq!(
            query.endpoint(&inputs),
            "https://shop.example.com/api/products/team%2F42%20red"
        );
    }

    #[test]
    fn custom_endpoint_is_opaque() {
        let query = QueryContext::new(test_source(), "search").with_endpoint(EndpointSpec::Custom(Arc::new(
            |source, inputs| format!("{}?q={}", source.endpoint(), inputs.get("q").cloned().unwrap_or_default()),
        )));

        let mut inputs = IndexMap::new();
        inputs.insert("q".to_string(), "a b".to_string());
        // No re-encoding of whatever the builder produced.
        assert_eq!(query.endpoint(&inputs), "https://shop.example.com/api/products?q=a b");
    }

    #[tokio::test]
    async fn query_headers_override_source_headers() {
        let query = QueryContext::new(test_source(), "product-list")
            .with_header("X-Region", "us")
            .with_header("X-Query", "1");

        let headers = query.request_headers().await.expect("no token provider involved");
        assert_eq!(headers.get("X-Region").map(String::as_str), Some("us"));
        assert_eq!(headers.get("X-Query").map(String::as_str), Some("1"));
        assert_eq!(headers.get("Accept").map(String::as_str), Some("application/json"));
    }

    #[test]
    fn graphql_body_defaults_to_post_with_typed_variables() {
        let query = QueryContext::new(test_source(), "orders")
            .with_input("first", InputVarDef::new("first", PrimitiveKind::Integer))
            .with_input("archived", InputVarDef::new("archived", PrimitiveKind::Boolean))
            .with_input("cursor", InputVarDef::new("cursor", PrimitiveKind::String))
            .with_body(BodySpec::GraphQl {
                document: "query Orders($first: Int!) { orders(first: $first) { id } }".to_string(),
            });

        assert_eq!(query.request_method(), "POST");

        let mut inputs = IndexMap::new();
        inputs.insert("first".to_string(), "10".to_string());
        inputs.insert("archived".to_string(), "true".to_string());
        inputs.insert("cursor".to_string(), "abc".to_string());

        let body: Value = serde_json::from_str(&query.request_body(&inputs).expect("graphql body")).expect("valid json");
        assert_eq!(body["variables"]["first"], json!(10));
        assert_eq!(body["variables"]["archived"], json!(true));
        assert_eq!(body["variables"]["cursor"], json!("abc"));
        assert!(body["query"].as_str().expect("document").starts_with("query Orders"));
    }

    #[test]
    fn resolve_inputs_applies_defaults_and_reports_missing() {
        let query = QueryContext::new(test_source(), "product-detail")
            .with_input("id", InputVarDef::new("id", PrimitiveKind::Id).required())
            .with_input(
                "limit",
                InputVarDef::new("limit", PrimitiveKind::Integer).with_default("25"),
            );

        let error = query.resolve_inputs(&IndexMap::new()).expect_err("id is required");
        assert_eq!(error.violations[0].path, "id");

        let mut provided = IndexMap::new();
        provided.insert("id".to_string(), "42".to_string());
        let resolved = query.resolve_inputs(&provided).expect("defaults fill the rest");
        assert_eq!(resolved.get("limit").map(String::as_str), Some("25"));
    }

    #[test]
    fn custom_decoder_wraps_non_json_payloads() {
        let query = QueryContext::new(test_source(), "readme").with_decoder(ResponseDecoder::Custom(Arc::new(
            |body| Ok(json!({ "content": body, "path": "README.md" })),
        )));

        let document = query.decode_response("# Title").expect("decoder wraps");
        assert_eq!(document["content"], json!("# Title"));
    }

    #[test]
    fn json_decoder_rejects_unparseable_bodies() {
        let query = QueryContext::new(test_source(), "product-list");
        let error = query.decode_response("<html>oops</html>").expect_err("not json");
        assert!(matches!(error, ResolutionError::UnparseableBody { .. }));
    }
}
