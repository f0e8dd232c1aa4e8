//! Shared type definitions for the fieldlink engine.
//!
//! This crate is pure data: the [`TypeSchema`] description DSL, the
//! configuration model for data sources and queries, resolved result types,
//! and the error taxonomy. Behavior (validation, sanitization, resolution,
//! execution) lives in `fieldlink-engine`; keeping the model separate lets
//! every crate share one vocabulary without dependency cycles.

pub mod config;
pub mod error;
pub mod result;
pub mod schema;

pub use config::{
    DataSourceConfig, FieldMapping, GeneratedField, InputOverride, InputVarDef, OutputSchema, OverrideKind,
};
pub use error::{QueryError, ResolutionError, TokenError, TransportError, ValidationError, Violation};
pub use result::{FieldValue, QueryResultEnvelope, ResolvedOutput, ResultRecord};
pub use schema::{PrimitiveKind, TypeSchema, is_empty_value};
