use inventory_schema::{SchemaError, ValidationError};
use inventory_store::StoreError;
use thiserror::Error;

/// Why a submission was refused.
///
/// `Validation` and `Permission` are caller errors (form error vs. 403);
/// `NotFound` means the edit target does not exist; `Store` is an
/// infrastructure failure the caller may retry.
#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl SanitizeError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        SanitizeError::Validation(ValidationError::field(field, message))
    }

    pub fn entry(message: impl Into<String>) -> Self {
        SanitizeError::Validation(ValidationError::entry(message))
    }

    /// Predicate blamed by a validation error, if any.
    pub fn offending_field(&self) -> Option<&str> {
        match self {
            SanitizeError::Validation(e) => e.field.as_deref(),
            _ => None,
        }
    }
}

/// Failure of an external lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("no result for `{0}`")]
    NotFound(String),
    #[error("resolver unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected resolver response: {0}")]
    Malformed(String),
}
