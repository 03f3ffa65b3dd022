//! Error types for chainward.
//!
//! Errors carry a stable, machine-parseable code so that callers of the
//! HTTP API (and scripts around the CLI) can branch on failures without
//! scraping message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for chainward operations.
pub type Result<T> = std::result::Result<T, Error>;

/// chainward error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The object has no recorded hand-off chain in the store. This is a
    /// data precondition violation, not a transient fault; it is never
    /// retried locally.
    #[error("no hand-off chain recorded for object {0}")]
    NoChainFound(u64),

    /// A workflow model step requires an activity tag that is not in the
    /// activity registry.
    #[error("unknown activity kind '{0}'")]
    UnknownActivityKind(String),

    /// The graph store could not be reached.
    #[error("graph store unavailable: {0}")]
    StoreUnavailable(String),

    /// The graph store rejected or failed a query.
    #[error("graph store query failed: {0}")]
    QueryFailed(String),

    /// A validation run exceeded the hard wall-clock deadline. Reported by
    /// the invocation boundary, never by the core itself.
    #[error("validation run timed out after {0}s")]
    ValidationTimedOut(u64),

    #[error("model error: {0}")]
    Model(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the stable error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NoChainFound(_) => "NO_CHAIN_FOUND",
            Error::UnknownActivityKind(_) => "UNKNOWN_ACTIVITY_KIND",
            Error::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Error::QueryFailed(_) => "QUERY_FAILED",
            Error::ValidationTimedOut(_) => "VALIDATION_TIMEOUT",
            Error::Model(_) => "MODEL_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the whole validation run might help.
    ///
    /// Data precondition violations (`NO_CHAIN_FOUND`,
    /// `UNKNOWN_ACTIVITY_KIND`, model errors) will fail again until the
    /// data is fixed; store and timeout failures may be transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_)
                | Error::QueryFailed(_)
                | Error::ValidationTimedOut(_)
                | Error::Http(_)
        )
    }

    /// Get a sanitized message safe for external consumers.
    ///
    /// Full details are logged internally; this hides endpoint URLs and
    /// query text from API clients.
    pub fn external_message(&self) -> String {
        match self {
            // Data-shaped errors are safe and actionable for clients
            Error::NoChainFound(object) => {
                format!("No hand-off chain recorded for object {}", object)
            }
            Error::UnknownActivityKind(kind) => {
                format!("Unknown activity kind '{}'", kind)
            }
            Error::ValidationTimedOut(secs) => {
                format!("Validation timed out after {}s", secs)
            }
            Error::Model(msg) => format!("Model error: {}", msg),
            Error::Parse(msg) => format!("Parse error: {}", msg),
            Error::Config(msg) => format!("Configuration error: {}", msg),

            // Store/internal errors - sanitize to avoid leaking details
            Error::StoreUnavailable(_) => "The graph store is unavailable".to_string(),
            Error::QueryFailed(_) => "A graph store query failed".to_string(),
            Error::Internal(_) => "An internal error occurred".to_string(),
            Error::Io(_) => "An I/O error occurred".to_string(),

            Error::Http(e) => {
                if let Some(status) = e.status() {
                    format!("HTTP request failed with status {}", status.as_u16())
                } else if e.is_timeout() {
                    "HTTP request timed out".to_string()
                } else if e.is_connect() {
                    "Failed to connect to the graph store".to_string()
                } else {
                    "HTTP request failed".to_string()
                }
            }

            Error::Yaml(_) => "Invalid YAML format".to_string(),
            Error::Json(_) => "Invalid JSON format".to_string(),
        }
    }

    /// Convert to a JSON response with sanitized message.
    pub fn to_external_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.external_message(),
            }
        })
    }
}

/// Structured error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}
