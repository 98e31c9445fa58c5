//! Application error types for zan
//!
//! These errors wrap core errors and add the I/O, internal and
//! configuration failures of the storage and service layers.

use thiserror::Error;

/// Application errors. Every variant is recoverable at the call site.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Task {0} not found")]
    NotFound(String),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AppError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an internal error with source
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            context: "IO operation failed".to_string(),
            source: err,
        }
    }
}

impl From<confy::ConfyError> for AppError {
    fn from(err: confy::ConfyError) -> Self {
        Self::config_with_source("Failed to load configuration", err)
    }
}

impl From<zan_core::CoreError> for AppError {
    fn from(err: zan_core::CoreError) -> Self {
        match err {
            zan_core::CoreError::TaskNotFound(id) => Self::NotFound(id),
            zan_core::CoreError::Validation { field, message } => {
                Self::Validation { field, message }
            }
        }
    }
}

/// Result type for application operations
pub type Result<T> = std::result::Result<T, AppError>;
