//! Error types for the Flowplane Control Plane.
//!
//! A single `AppError` covers the whole error taxonomy: aggregated
//! validation failures, not-found lookups, illegal lifecycle transitions,
//! runtime rule-evaluation errors and infrastructure failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aggregated list of validation violations.
///
/// Validation never stops at the first problem; callers receive every
/// violation found so a definition or rule can be fixed in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    violations: Vec<String>,
}

impl ValidationErrors {
    /// Create an empty violation list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation.
    pub fn push(&mut self, violation: impl Into<String>) {
        self.violations.push(violation.into());
    }

    /// Whether any violation was recorded.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of recorded violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// The recorded violations, in discovery order.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Convert into a result: `Ok(())` when empty, the aggregated
    /// validation error otherwise.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.violations.join("; "))
    }
}

impl From<String> for ValidationErrors {
    fn from(violation: String) -> Self {
        Self {
            violations: vec![violation],
        }
    }
}

/// Application-level errors for the control plane.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Not found error; tenant mismatches are reported identically so
    /// existence never leaks across tenants
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Validation error carrying every violation found
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Illegal lifecycle transition; the stored state is untouched
    #[error("Illegal state transition: {0}")]
    InvalidTransition(String),

    /// Runtime evaluation error (unknown operator or action kind)
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Process backend error
    #[error("Process backend error: {0}")]
    Backend(String),

    /// NATS messaging error
    #[error("NATS error: {0}")]
    Nats(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build a validation error from a single violation.
    pub fn validation(violation: impl Into<String>) -> Self {
        AppError::Validation(ValidationErrors::from(violation.into()))
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<envy::Error> for AppError {
    fn from(err: envy::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = AppError::NotFound("Execution not found".to_string());
        assert_eq!(err.to_string(), "Resource not found: Execution not found");
    }

    #[test]
    fn test_validation_errors_aggregate() {
        let mut errors = ValidationErrors::new();
        errors.push("step 'a' has no name");
        errors.push("step 'b' is unreachable");
        assert_eq!(errors.len(), 2);

        let err = errors.into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("step 'a' has no name"));
        assert!(message.contains("step 'b' is unreachable"));
    }

    #[test]
    fn test_empty_validation_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = AppError::InvalidTransition("cannot cancel in completed state".to_string());
        assert!(err.to_string().contains("cannot cancel"));
    }
}
