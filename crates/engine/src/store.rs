//! Persisted configuration store boundary.
//!
//! The engine only consumes raw config values from a store and turns them
//! into validated sources via `DataSource::from_config`; the storage engine
//! itself is a collaborator. [`MemoryConfigStore`] is the in-process
//! implementation used by tests and single-process deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// CRUD boundary for raw data-source configurations, keyed by slug.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_by_slug(&self, slug: &str) -> Option<Value>;
    /// List configs, optionally filtered by service identifier.
    async fn list(&self, service: Option<&str>) -> Vec<Value>;
    /// Insert a new config. Returns false when the slug is taken or missing.
    async fn insert(&self, config: Value) -> bool;
    /// Replace an existing config. Returns false when the slug is unknown.
    async fn update(&self, config: Value) -> bool;
    async fn delete(&self, slug: &str) -> bool;
}

/// In-process config store.
#[derive(Default)]
pub struct MemoryConfigStore {
    configs: DashMap<String, Value>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn config_slug(config: &Value) -> Option<String> {
    config.get("slug").and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_by_slug(&self, slug: &str) -> Option<Value> {
        self.configs.get(slug).map(|entry| entry.value().clone())
    }

    async fn list(&self, service: Option<&str>) -> Vec<Value> {
        self.configs
            .iter()
            .filter(|entry| match service {
                Some(service) => entry.value().get("service").and_then(Value::as_str) == Some(service),
                None => true,
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    async fn insert(&self, config: Value) -> bool {
        let Some(slug) = config_slug(&config) else {
            return false;
        };
        if self.configs.contains_key(&slug) {
            return false;
        }
        self.configs.insert(slug, config);
        true
    }

    async fn update(&self, config: Value) -> bool {
        let Some(slug) = config_slug(&config) else {
            return false;
        };
        if !self.configs.contains_key(&slug) {
            return false;
        }
        self.configs.insert(slug, config);
        true
    }

    async fn delete(&self, slug: &str) -> bool {
        self.configs.remove(slug).is_some()
    }
}
