//! Centralized error types for NeoGM.

use thiserror::Error;

use crate::schema::SchemaDelta;

/// Main error type for NeoGM operations.
#[derive(Error, Debug)]
pub enum OgmError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error ({context}): {message}")]
    Query { context: String, message: String },

    /// One delta per drifting category.
    #[error("Schema drift detected: {}", join_deltas(.0))]
    SchemaDrift(Vec<SchemaDelta>),

    #[error("Decode error: cannot decode {kind} value `{value}`: {reason}")]
    Decode {
        value: String,
        kind: &'static str,
        reason: String,
    },

    #[error("Invalid transaction state: {0}")]
    TransactionState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("original error: `{original}`, rollback error: `{rollback}`")]
    Rollback { original: String, rollback: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn join_deltas(deltas: &[SchemaDelta]) -> String {
    deltas.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Result type for NeoGM operations.
pub type OgmResult<T> = Result<T, OgmError>;

impl OgmError {
    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a not initialized error.
    pub fn not_initialized(msg: impl Into<String>) -> Self {
        Self::NotInitialized(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a query error with the statement context it happened in.
    pub fn query(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Query {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a decode error for a JSON value that could not be converted.
    pub fn decode(value: &serde_json::Value, reason: impl ToString) -> Self {
        Self::Decode {
            value: value.to_string(),
            kind: value_kind(value),
            reason: reason.to_string(),
        }
    }

    /// Whether the error is one of the validation-class errors raised
    /// before any statement reaches the database.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_) | Self::InvalidArgument(_))
    }
}

/// Name of the JSON kind of a value, used in decode diagnostics.
pub fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "map",
    }
}
