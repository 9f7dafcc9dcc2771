//! Error handling for the intake forms core
//!
//! Remote failures are modelled with thiserror so the session manager can
//! normalise them into flat, user-facing message lists. Only construction and
//! configuration paths surface these types to callers directly.

use thiserror::Error;

/// Main error type for the forms core
#[derive(Error, Debug)]
pub enum FormError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by a Remote Form Store adapter
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Store rejected request: {message}")]
    Rejected { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Store operation unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Most specific message available for display.
    ///
    /// Server-provided text wins; transport and decoding failures fall back to
    /// `None` so the caller can substitute a message naming the operation.
    pub fn user_message(&self) -> Option<String> {
        match self {
            StoreError::Http { message, .. } | StoreError::Rejected { message } => {
                let trimmed = message.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            StoreError::Transport { .. }
            | StoreError::Serialization(_)
            | StoreError::InvalidUrl(_)
            | StoreError::Unavailable { .. } => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => StoreError::Http {
                status: status.as_u16(),
                message: String::new(),
            },
            None => StoreError::Transport {
                message: error.to_string(),
            },
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown store backend '{value}'. Valid values: mock, memory, fixture, http, remote, real")]
    UnknownBackend { value: String },

    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Invalid URL in {key}: {source}")]
    InvalidUrl {
        key: String,
        #[source]
        source: url::ParseError,
    },
}

/// Result type aliases for convenience
pub type FormResult<T> = Result<T, FormError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
