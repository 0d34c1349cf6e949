//! Error types and handling for viewbind
//!
//! Local failures (configuration, validation, type mismatches) are raised
//! immediately. Failures reported by the data-modeling service are carried
//! unchanged in [`Error::Api`] so callers can inspect the original code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::NodeId;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for viewbind
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A value failed schema validation (missing required field, bad type)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A value of an unexpected kind was supplied where a specific one is required
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected kind
        expected: String,
        /// Kind actually received
        actual: String,
    },

    /// Error reported by the data-modeling service
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Connection-level failure talking to the service
    #[error("Transport error: {0}")]
    Transport(String),

    /// Token acquisition failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Error body returned by the data-modeling service
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// HTTP status code
    pub code: u16,
    /// Human readable message
    pub message: String,
    /// Identifiers the request referenced that do not exist
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<NodeId>,
    /// Identifiers that appeared more than once in the request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicated: Vec<NodeId>,
    /// Identifiers whose `existingVersion` did not match the stored version
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<NodeId>,
}

/// Envelope used on the wire: `{"error": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorEnvelope {
    /// The wrapped error
    pub error: ApiError,
}

impl ApiError {
    /// Create an error with only a code and message
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            missing: Vec::new(),
            duplicated: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Parse a response body, falling back to the raw text when it is not an envelope
    pub fn from_body(code: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorEnvelope>(body) {
            Ok(envelope) => envelope.error,
            Err(_) => Self::new(code, body.trim()),
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// HTTP-style code of a service error, if this is one
    pub fn api_code(&self) -> Option<u16> {
        match self {
            Error::Api(api) => Some(api.code),
            _ => None,
        }
    }

    /// Check if the service reported that a resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }

    /// Check if the service rejected a write because of `existing_version`
    pub fn is_version_conflict(&self) -> bool {
        self.api_code() == Some(409)
    }

    /// Check if this is a client error (4xx equivalent)
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::Api(api) => (400..500).contains(&api.code),
            Error::Validation(_) | Error::TypeMismatch { .. } | Error::Config(_) => true,
            _ => false,
        }
    }

    /// Check if this is a server error (5xx equivalent)
    pub fn is_server_error(&self) -> bool {
        match self {
            Error::Api(api) => api.code >= 500,
            _ => false,
        }
    }
}
