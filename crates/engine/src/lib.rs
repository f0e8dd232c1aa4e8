//! # Fieldlink Engine
//!
//! The engine binds structured fields from remote APIs into block-based
//! content. A declarative [`QueryContext`] couples a validated [`DataSource`]
//! with input/output schemas; the [`QueryRunner`] executes it against an
//! injected HTTP transport and cache, and the output resolver projects the
//! response into normalized field records via JSONPath mappings.
//!
//! ## Architecture
//!
//! - **`validate` / `sanitize`**: schema-driven checking and cleanup of
//!   configuration values against a `TypeSchema`
//! - **`datasource`**: the validated-construction path for remote API configs
//! - **`query`**: declarative queries: endpoint, header, body strategies
//! - **`resolver`**: JSONPath extraction and per-field type coercion
//! - **`runner`**: orchestration: request build, cache, dispatch, envelope
//! - **`cache` / `store`**: in-process collaborator implementations
//!
//! There is no process-wide registry: every collaborator is handed in at
//! construction, so concurrent executions share nothing mutable beyond the
//! cache store.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use fieldlink_api::ReqwestTransport;
//! use fieldlink_engine::{DataSource, MemoryCache, QueryContext, QueryRunner, base_config_schema};
//! use fieldlink_types::{FieldMapping, OutputSchema, PrimitiveKind};
//!
//! let schema = base_config_schema("generic-http", 1);
//! let source = DataSource::from_config(&schema, &raw_config)?;
//! let query = QueryContext::new(source, "record-list").with_output_schema(
//!     OutputSchema::collection("$.records[*]")
//!         .with_mapping("id", FieldMapping::path("ID", PrimitiveKind::Id, "$.id")),
//! );
//!
//! let runner = QueryRunner::new(Arc::new(ReqwestTransport::new()?), Arc::new(MemoryCache::new()));
//! let envelope = runner.execute(&query, &inputs).await?;
//! ```

pub mod cache;
pub mod datasource;
pub mod query;
pub mod resolver;
pub mod runner;
pub mod sanitize;
pub mod store;
pub mod validate;

pub use cache::{CacheStore, MemoryCache, request_cache_key};
pub use datasource::{DataSource, base_config_schema};
pub use query::{BodySpec, EndpointSpec, MetadataHook, QueryContext, ResponseDecoder};
pub use resolver::resolve;
pub use runner::{CacheBypassPolicy, QueryRunner};
pub use sanitize::sanitize;
pub use store::{ConfigStore, MemoryConfigStore};
pub use validate::validate;
