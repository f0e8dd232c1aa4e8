//! HTTP transport boundary for the fieldlink engine.
//!
//! The engine never talks to the network directly; it hands a fully built
//! [`HttpRequest`] to an [`HttpTransport`] and gets back an [`HttpResponse`]
//! or a [`TransportError`]. The transport owns connection pooling, TLS,
//! redirect bounds, timeouts, and any retry policy for transient failures;
//! the engine performs no retries of its own.
//!
//! [`ReqwestTransport`] is the production implementation. Tests substitute
//! in-process fakes.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use fieldlink_types::TransportError;
use fieldlink_util::redact_sensitive;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use tracing::{debug, warn};

pub mod auth;

pub use auth::{CachedTokenProvider, StaticTokenProvider, TokenProvider};

/// A fully resolved request descriptor: the endpoint is a complete URL and
/// the headers/body are final. The transport adds nothing but a User-Agent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method name, e.g. "GET" or "POST".
    pub method: String,
    /// Absolute URL. Scheme/host policy is enforced by the runner before the
    /// request reaches a transport.
    pub url: String,
    pub headers: IndexMap<String, String>,
    /// Raw request body, if the method carries one.
    pub body: Option<String>,
}

/// Response surfaced back to the engine. Headers are exposed so the runner
/// can read cache-relevant entries such as `Age`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Dispatch boundary between the engine and the network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    user_agent: String,
}

impl ReqwestTransport {
    /// Build a transport with a bounded request timeout. No operation through
    /// this client blocks indefinitely.
    pub fn new() -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;

        Ok(Self {
            http,
            user_agent: format!("fieldlink/0.1; {}", std::env::consts::OS),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let started = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|error| TransportError::Request(error.to_string()))?;
        let headers = build_header_map(&request.headers)?;

        debug!(
            method = %method,
            url = %request.url,
            header_count = request.headers.len(),
            has_body = request.body.is_some(),
            "dispatching request"
        );

        let mut builder = self
            .http
            .request(method.clone(), request.url.as_str())
            .headers(headers)
            .header(reqwest::header::USER_AGENT, &self.user_agent);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|error| {
            if error.is_timeout() {
                warn!(url = %request.url, "request timed out");
                TransportError::Timeout
            } else {
                TransportError::Network(redact_sensitive(&error.to_string()))
            }
        })?;

        let status = response.status().as_u16();
        let response_headers = collect_response_headers(response.headers());
        let body = response
            .text()
            .await
            .map_err(|error| TransportError::Network(redact_sensitive(&error.to_string())))?;

        debug!(
            method = %method,
            url = %request.url,
            status,
            body_len = body.len(),
            duration_ms = started.elapsed().as_millis(),
            "request completed"
        );

        Ok(HttpResponse {
            status,
            headers: response_headers,
            body,
        })
    }
}

fn build_header_map(headers: &IndexMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::Request(format!("invalid header name '{name}'")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::Request(format!("invalid value for header '{name}'")))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn collect_response_headers(headers: &HeaderMap) -> IndexMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|text| (name.as_str().to_string(), text.to_string()))
        })
        .collect()
}
