//! Query execution orchestration.
//!
//! The runner drives one query end to end: request construction from the
//! [`QueryContext`], endpoint policy checks, cache lookup, dispatch through
//! the [`HttpTransport`] collaborator, response validation, resolution, and
//! envelope assembly. It performs no retries of its own and never panics past
//! this boundary: every failure is a typed [`QueryError`].

use std::sync::Arc;

use chrono::Utc;
use fieldlink_api::{HttpRequest, HttpTransport};
use fieldlink_types::schema::PrimitiveKind;
use fieldlink_types::{FieldValue, QueryError, QueryResultEnvelope};
use fieldlink_util::http::{age_seconds, graphql_error_message, truncate_body_preview};
use fieldlink_util::redact_sensitive;
use indexmap::IndexMap;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheStore, request_cache_key};
use crate::query::QueryContext;
use crate::resolver;

/// Per-request hook deciding whether to skip the cache lookup. Stores still
/// happen for cacheable responses.
pub type CacheBypassPolicy = Arc<dyn Fn(&HttpRequest) -> bool + Send + Sync>;

const DEFAULT_CACHE_TTL_SECONDS: i64 = 60;

/// Executes queries against their remote APIs.
pub struct QueryRunner {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<dyn CacheStore>,
    /// Time-to-live for cached response bodies. A negative value disables
    /// caching entirely.
    cache_ttl_seconds: i64,
    bypass_policy: Option<CacheBypassPolicy>,
}

impl QueryRunner {
    pub fn new(transport: Arc<dyn HttpTransport>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            transport,
            cache,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            bypass_policy: None,
        }
    }

    pub fn with_cache_ttl(mut self, ttl_seconds: i64) -> Self {
        self.cache_ttl_seconds = ttl_seconds;
        self
    }

    pub fn with_bypass_policy(mut self, policy: CacheBypassPolicy) -> Self {
        self.bypass_policy = Some(policy);
        self
    }

    /// Execute one query with the given input variables.
    ///
    /// One in-flight request per call; concurrent executions share nothing
    /// mutable beyond the cache store.
    pub async fn execute(
        &self,
        query: &QueryContext,
        input_variables: &IndexMap<String, String>,
    ) -> Result<QueryResultEnvelope, QueryError> {
        let inputs = query.resolve_inputs(input_variables)?;

        let endpoint = query.endpoint(&inputs);
        let parsed_endpoint = validate_endpoint(&endpoint)?;

        let request = HttpRequest {
            method: query.request_method(),
            url: endpoint,
            headers: query.request_headers().await?,
            body: query.request_body(&inputs),
        };

        let caching_enabled = self.cache_ttl_seconds >= 0;
        let bypass_cache = self.bypass_policy.as_ref().map(|policy| policy(&request)).unwrap_or(false);
        if bypass_cache {
            debug!(query = %query.query_name(), "cache bypass requested by policy");
        }
        let cache_key = request_cache_key(&request.method, &parsed_endpoint, request.body.as_deref());

        let mut response_age = None;
        let cached_body = if caching_enabled && !bypass_cache {
            self.cache.get(&cache_key).await
        } else {
            None
        };
        let body = match cached_body {
            Some(hit) => {
                debug!(query = %query.query_name(), "serving response from cache");
                hit
            }
            None => {
                let response = self.transport.request(&request).await?;
                if !response.is_success() {
                    return Err(QueryError::Upstream {
                        status: response.status,
                        preview: redact_sensitive(&truncate_body_preview(&response.body, 200)),
                    });
                }
                response_age = age_seconds(&response.headers);
                // Only successful bodies are cached; errors and redirects
                // never are.
                if caching_enabled {
                    self.cache
                        .put(&cache_key, response.body.clone(), self.cache_ttl_seconds as u64)
                        .await;
                }
                response.body
            }
        };

        let document = query.decode_response(&body)?;
        if let Some(message) = graphql_error_message(&document) {
            // GraphQL can return partial data alongside errors; resolution
            // still runs against the same body.
            warn!(query = %query.query_name(), error = %message, "upstream reported GraphQL errors");
        }

        let results = resolver::resolve(&document, query.output_schema());

        let mut metadata = IndexMap::new();
        let last_updated = match response_age {
            Some(age) => Utc::now() - chrono::Duration::seconds(age as i64),
            None => Utc::now(),
        };
        metadata.insert(
            "last_updated".to_string(),
            FieldValue::string("Last updated", last_updated.to_rfc3339()),
        );
        metadata.insert(
            "total_count".to_string(),
            FieldValue::new("Total count", PrimitiveKind::Integer, json!(results.len())),
        );
        query.apply_metadata_hook(&mut metadata);

        Ok(QueryResultEnvelope {
            is_collection: query.output_schema().is_collection,
            metadata,
            results,
        })
    }
}

/// Endpoint policy: plaintext transport is rejected outright, and the host
/// must be present. Both are configuration errors raised before any network
/// activity.
fn validate_endpoint(endpoint: &str) -> Result<Url, QueryError> {
    let parsed = Url::parse(endpoint).map_err(|error| QueryError::Configuration {
        reason: format!("invalid endpoint '{endpoint}': {error}"),
    })?;

    if parsed.scheme() != "https" {
        return Err(QueryError::Configuration {
            reason: format!("endpoint scheme '{}' is not allowed; https is required", parsed.scheme()),
        });
    }
    if parsed.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(QueryError::Configuration {
            reason: "endpoint host is empty".to_string(),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::datasource::{DataSource, base_config_schema};
    use crate::query::BodySpec;
    use async_trait::async_trait;
    use fieldlink_api::HttpResponse;
    use fieldlink_types::{FieldMapping, InputVarDef, OutputSchema, TransportError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeTransport {
        status: u16,
        body: String,
        headers: IndexMap<String, String>,
        calls: AtomicUsize,
    }

    impl FakeTransport {
        fn ok(body: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                status: 200,
                body: body.into(),
                headers: IndexMap::new(),
                calls: AtomicUsize::new(0),
            })
        }

        fn with_status(status: u16, body: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.into(),
                headers: IndexMap::new(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn request(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                status: self.status,
                headers: self.headers.clone(),
                body: self.body.clone(),
            })
        }
    }

    fn source(endpoint: &str) -> DataSource {
        let schema = base_config_schema("generic-http", 1);
        DataSource::from_config(
            &schema,
            &json!({
                "service": "generic-http",
                "service_schema_version": 1,
                "slug": "records",
                "endpoint": endpoint,
                "request_headers": {},
                "display_name": "Records"
            }),
        )
        .expect("valid source")
    }

    fn records_query(endpoint: &str) -> QueryContext {
        QueryContext::new(source(endpoint), "record-list").with_output_schema(
            OutputSchema::collection("$.records[*]")
                .with_mapping("id", FieldMapping::path("ID", PrimitiveKind::Id, "$.id"))
                .with_mapping("name", FieldMapping::path("Name", PrimitiveKind::String, "$.fields.Name")),
        )
    }

    const RECORDS_BODY: &str = r#"{"records":[{"id":1,"fields":{"Name":"A"}},{"id":2,"fields":{"Name":"B"}}]}"#;

    fn runner(transport: Arc<FakeTransport>, cache: Arc<MemoryCache>) -> QueryRunner {
        QueryRunner::new(transport, cache)
    }

    #[tokio::test]
    async fn resolves_collection_with_metadata() {
        let transport = FakeTransport::ok(RECORDS_BODY);
        let envelope = runner(transport.clone(), Arc::new(MemoryCache::new()))
            .execute(&records_query("https://api.example.com/records"), &IndexMap::new())
            .await
            .expect("query succeeds");

        assert!(envelope.is_collection);
        assert_eq!(envelope.results.len(), 2);
        let records = envelope.results.records().expect("mapping mode");
        assert_eq!(records[0].get("id").expect("id").value, json!(1));
        assert_eq!(records[1].get("name").expect("name").value, json!("B"));
        assert_eq!(envelope.metadata.get("total_count").expect("total_count").value, json!(2));
        assert!(envelope.metadata.contains_key("last_updated"));
    }

    #[tokio::test]
    async fn insecure_scheme_is_rejected_before_dispatch() {
        let transport = FakeTransport::ok(RECORDS_BODY);
        let error = runner(transport.clone(), Arc::new(MemoryCache::new()))
            .execute(&records_query("http://api.example.com/records"), &IndexMap::new())
            .await
            .expect_err("plaintext endpoint must fail");

        assert_eq!(error.code(), "configuration_error");
        assert_eq!(transport.calls(), 0, "no network call may be attempted");
    }

    #[tokio::test]
    async fn non_2xx_is_a_hard_failure() {
        let transport = FakeTransport::with_status(404, r#"{"message":"not found"}"#);
        let cache = Arc::new(MemoryCache::new());
        let error = runner(transport.clone(), cache.clone())
            .execute(&records_query("https://api.example.com/records"), &IndexMap::new())
            .await
            .expect_err("404 must fail the call");

        assert_eq!(error.code(), "upstream_error");
        assert!(cache.is_empty(), "error responses are never cached");
    }

    #[tokio::test]
    async fn second_execution_is_served_from_cache() {
        let transport = FakeTransport::ok(RECORDS_BODY);
        let cache = Arc::new(MemoryCache::new());
        let runner = runner(transport.clone(), cache);
        let query = records_query("https://api.example.com/records");

        runner.execute(&query, &IndexMap::new()).await.expect("first call");
        runner.execute(&query, &IndexMap::new()).await.expect("second call");

        assert_eq!(transport.calls(), 1, "second call must be a cache hit");
    }

    #[tokio::test]
    async fn negative_ttl_disables_caching() {
        let transport = FakeTransport::ok(RECORDS_BODY);
        let cache = Arc::new(MemoryCache::new());
        let runner = runner(transport.clone(), cache.clone()).with_cache_ttl(-1);
        let query = records_query("https://api.example.com/records");

        runner.execute(&query, &IndexMap::new()).await.expect("first call");
        runner.execute(&query, &IndexMap::new()).await.expect("second call");

        assert_eq!(transport.calls(), 2, "every call must hit the transport");
        assert!(cache.is_empty(), "nothing may be stored");
    }

    #[tokio::test]
    async fn bypass_policy_skips_lookup_but_still_stores() {
        let transport = FakeTransport::ok(RECORDS_BODY);
        let cache = Arc::new(MemoryCache::new());
        let runner = runner(transport.clone(), cache.clone()).with_bypass_policy(Arc::new(|_| true));
        let query = records_query("https://api.example.com/records");

        runner.execute(&query, &IndexMap::new()).await.expect("first call");
        runner.execute(&query, &IndexMap::new()).await.expect("second call");

        assert_eq!(transport.calls(), 2, "bypass must skip the lookup");
        assert_eq!(cache.len(), 1, "successful bodies are still stored");
    }

    #[tokio::test]
    async fn graphql_errors_do_not_block_partial_data() {
        let body = r#"{"errors":[{"message":"rate limited"}],"data":{"records":[{"id":1,"fields":{"Name":"A"}}]}}"#;
        let transport = FakeTransport::ok(body);
        let query = QueryContext::new(source("https://api.example.com/graphql"), "orders")
            .with_body(BodySpec::GraphQl {
                document: "query { records { id } }".to_string(),
            })
            .with_output_schema(
                OutputSchema::collection("$.data.records[*]")
                    .with_mapping("id", FieldMapping::path("ID", PrimitiveKind::Id, "$.id")),
            );

        let envelope = runner(transport, Arc::new(MemoryCache::new()))
            .execute(&query, &IndexMap::new())
            .await
            .expect("partial data still resolves");

        assert_eq!(envelope.results.len(), 1);
    }

    #[tokio::test]
    async fn missing_required_input_fails_validation() {
        let transport = FakeTransport::ok(RECORDS_BODY);
        let query = records_query("https://api.example.com/records")
            .with_input("id", InputVarDef::new("id", PrimitiveKind::Id).required());

        let error = runner(transport.clone(), Arc::new(MemoryCache::new()))
            .execute(&query, &IndexMap::new())
            .await
            .expect_err("required input is missing");

        assert_eq!(error.code(), "validation_error");
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn age_header_backdates_last_updated() {
        let transport = Arc::new(FakeTransport {
            status: 200,
            body: RECORDS_BODY.to_string(),
            headers: IndexMap::from_iter([("Age".to_string(), "120".to_string())]),
            calls: AtomicUsize::new(0),
        });
        let envelope = runner(transport, Arc::new(MemoryCache::new()))
            .execute(&records_query("https://api.example.com/records"), &IndexMap::new())
            .await
            .expect("query succeeds");

        let last_updated = envelope.metadata.get("last_updated").expect("last_updated");
        let stamp = chrono::DateTime::parse_from_rfc3339(last_updated.value.as_str().expect("rfc3339 string"))
            .expect("valid timestamp");
        let elapsed = Utc::now().signed_duration_since(stamp);
        assert!(elapsed.num_seconds() >= 120, "Age header must backdate the stamp");
    }

    #[tokio::test]
    async fn metadata_hook_overrides_defaults() {
        let transport = FakeTransport::ok(RECORDS_BODY);
        let query = records_query("https://api.example.com/records").with_metadata_hook(Arc::new(|metadata| {
            metadata.insert("source".to_string(), FieldValue::string("Source", "records-api"));
        }));

        let envelope = runner(transport, Arc::new(MemoryCache::new()))
            .execute(&query, &IndexMap::new())
            .await
            .expect("query succeeds");

        assert_eq!(envelope.metadata.get("source").expect("hook entry").value, json!("records-api"));
        assert!(envelope.metadata.contains_key("total_count"));
    }
}
