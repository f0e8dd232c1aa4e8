//! Response caching.
//!
//! The cache stores serialized response bodies, keyed by method, canonical
//! URL, and (for body-carrying requests) a digest of the body. Headers are
//! not part of the key. Concurrent writers may race on the same key; last
//! write wins and no locking is required beyond what the map provides.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use url::Url;

/// Storage collaborator for successful response bodies.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn put(&self, key: &str, body: String, ttl_seconds: u64);
}

/// Build the cache key for a request.
///
/// The URL is canonicalized to `scheme://host/path?query` so header-only
/// differences never split the key; a SHA-256 digest of the body is appended
/// when one is present.
pub fn request_cache_key(method: &str, url: &Url, body: Option<&str>) -> String {
    let mut canonical = format!("{}://{}{}", url.scheme(), url.host_str().unwrap_or_default(), url.path());
    if let Some(query) = url.query() {
        canonical.push('?');
        canonical.push_str(query);
    }

    match body {
        Some(body) => {
            let digest = Sha256::digest(body.as_bytes());
            format!("{} {} {}", method.to_uppercase(), canonical, hex_encode(&digest))
        }
        None => format!("{} {}", method.to_uppercase(), canonical),
    }
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

struct CacheEntry {
    expires_at: Instant,
    body: String,
}

/// In-process cache store with per-entry TTL.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.body.clone())
    }

    async fn put(&self, key: &str, body: String, ttl_seconds: u64) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
                body,
            },
        );
    }
}
