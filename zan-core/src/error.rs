//! Core error types for zan domain logic
//!
//! These errors represent domain-level failures, not I/O errors.

use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Task {0} not found")]
    TaskNotFound(String),

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },
}

impl CoreError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error for the given task id
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::TaskNotFound(id.into())
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
