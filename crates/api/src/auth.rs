//! Auth token providers.
//!
//! A data source that needs per-request credentials (JWT-bearer exchange,
//! OAuth client-credentials, and similar) gets them from a [`TokenProvider`].
//! Providers are independently cacheable; [`CachedTokenProvider`] wraps any
//! provider with a time-window cache so repeated header resolution does not
//! re-run the exchange. Token acquisition never mutates the data source that
//! triggered it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fieldlink_types::TokenError;
use tokio::sync::Mutex;
use tracing::debug;

/// Supplies a bearer token for outbound requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, TokenError>;
}

/// Fixed token, for API-key style sources and tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String, TokenError> {
        Ok(self.token.clone())
    }
}

/// Decorator caching the inner provider's token for a fixed window.
///
/// The default window is 50 minutes, comfortably inside the usual one-hour
/// lifetime of exchanged JWTs. Acquisition failures are not cached.
pub struct CachedTokenProvider {
    inner: Arc<dyn TokenProvider>,
    window: Duration,
    cached: Mutex<Option<(Instant, String)>>,
}

impl CachedTokenProvider {
    pub fn new(inner: Arc<dyn TokenProvider>) -> Self {
        Self::with_window(inner, Duration::from_secs(50 * 60))
    }

    pub fn with_window(inner: Arc<dyn TokenProvider>, window: Duration) -> Self {
        Self {
            inner,
            window,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenProvider for CachedTokenProvider {
    async fn token(&self) -> Result<String, TokenError> {
        let mut cached = self.cached.lock().await;
        if let Some((acquired_at, token)) = cached.as_ref()
            && acquired_at.elapsed() < self.window
        {
            return Ok(token.clone());
        }

        let token = self.inner.token().await?;
        debug!("acquired fresh auth token");
        *cached = Some((Instant::now(), token.clone()));
        Ok(token)
    }
}
