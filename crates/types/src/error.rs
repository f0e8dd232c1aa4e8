//! Error taxonomy shared across the engine.
//!
//! Every boundary returns a structured error value; nothing in the core
//! panics past the runner. Callers get a machine-readable code plus a message
//! and are responsible for user-facing wording.

use thiserror::Error;

/// A single schema violation: where, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path to the offending field, e.g. `auth.api_key`.
    pub path: String,
    pub reason: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Construction-time schema mismatch. The offending object is never created.
///
/// Violations are collected across sibling fields (one per field, first
/// failure wins within a field) so a single round trip reports everything
/// wrong with a submitted configuration.
#[derive(Debug, Clone, Error)]
#[error("configuration failed validation with {} violation(s): {}", .violations.len(), first_violation(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn first_violation(violations: &[Violation]) -> String {
    violations
        .first()
        .map(Violation::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn single(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            violations: vec![Violation::new(path, reason)],
        }
    }
}

/// Network-level failure surfaced by the HTTP transport collaborator.
/// The transport owns retry policy; the runner never retries.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("could not construct request: {0}")]
    Request(String),
}

/// Failure acquiring an auth token from a provider.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("token acquisition failed: {0}")]
    Acquisition(String),
    #[error("invalid credentials: {0}")]
    Credentials(String),
}

/// Fatal resolution failure. Per-field and per-item problems degrade to
/// defaults instead of raising this; only a body the decoder cannot turn
/// into a document is fatal.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("unparseable response body: {reason}. body preview: {preview}")]
    UnparseableBody { reason: String, preview: String },
}

/// Failure result of one query execution.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Invalid endpoint scheme/host or malformed configuration. Never retried.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Non-2xx response status. No partial-success modeling.
    #[error("upstream returned status {status}: {preview}")]
    Upstream { status: u16, preview: String },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl QueryError {
    /// Stable machine-readable code for consuming surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Validation(_) => "validation_error",
            Self::Transport(_) => "transport_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Resolution(_) => "resolution_error",
            Self::Token(_) => "token_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_reports_count_and_first() {
        let error = ValidationError::new(vec![
            Violation::new("slug", "must match ^[a-z0-9-]+$"),
            Violation::new("endpoint", "missing required field"),
        ]);
        let message = error.to_string();
        assert!(message.contains("2 violation(s)"));
        assert!(message.contains("slug: must match"));
    }

    #[test]
    fn query_error_codes_are_stable() {
        let configuration = QueryError::Configuration {
            reason: "insecure scheme".into(),
        };
        assert_eq!(configuration.code(), "configuration_error");

        let upstream = QueryError::Upstream {
            status: 404,
            preview: "not found".into(),
        };
        assert_eq!(upstream.code(), "upstream_error");

        let transport = QueryError::from(TransportError::Timeout);
        assert_eq!(transport.code(), "transport_error");
    }
}
