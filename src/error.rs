//! Error types for taxonomy-access
//!
//! This module defines the error hierarchy used throughout the crate.
//! Evaluation itself never fails; these errors come from configuration,
//! rule authoring and resource lookups, and lookup errors are swallowed
//! by the guards before they can reach a caller.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Server error: {0}")]
    Server(String),
}

/// Configuration and rule-authoring errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Unknown vocabulary '{vocabulary}'")]
    UnknownVocabulary { vocabulary: String },

    #[error("You must select at least one term ({field})")]
    EmptyTermSelection { field: String },

    #[error("Term {term} does not belong to vocabulary '{vocabulary}' ({field})")]
    InvalidTermSelection {
        field: String,
        vocabulary: String,
        term: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while resolving a resource to its term identifiers
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Resource {resource} has no field '{field}'")]
    MissingField { resource: String, field: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Content store error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from content store: {0}")]
    InvalidResponse(String),
}

impl LookupError {
    /// Create an appropriate error from an HTTP status code and response body
    pub fn from_response(status: u16, resource: &str, body: &str) -> Self {
        match status {
            404 => LookupError::NotFound {
                resource: resource.to_string(),
            },
            _ => LookupError::Api {
                status,
                message: if body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.to_string()
                },
            },
        }
    }

    /// Whether the resource simply does not exist (as opposed to failing to load)
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound { .. })
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for resource lookups
pub type LookupResult<T> = std::result::Result<T, LookupError>;
