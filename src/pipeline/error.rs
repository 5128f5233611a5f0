use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::DatabaseError;

/// One rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of a failed rule or execution
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuleError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed ({} field errors)", .0.len())]
    Invalid(Vec<FieldError>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl RuleError {
    /// Single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        RuleError::Invalid(vec![FieldError::new(field, message)])
    }
}

impl From<DatabaseError> for RuleError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(msg) => RuleError::Conflict(msg),
            DatabaseError::Constraint(msg) => RuleError::BadRequest(msg),
            DatabaseError::InvalidIdentifier(name) => RuleError::BadRequest(format!("invalid identifier '{}'", name)),
            DatabaseError::Filter(e) => RuleError::BadRequest(e.to_string()),
            other => RuleError::Database(other.to_string()),
        }
    }
}
