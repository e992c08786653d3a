//! Error types for stevesmom-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// No session with this ID
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A session with this ID already exists
    #[error("session already exists: {0}")]
    SessionExists(String),

    /// Invalid configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] stevesmom_llm::Error),
}

impl Error {
    /// Build an [`Error::InvalidConfig`]
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
