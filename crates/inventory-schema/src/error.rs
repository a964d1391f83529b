use std::fmt;
use thiserror::Error;

/// A field value that could not be validated or coerced.
///
/// `field` names the offending predicate so callers can attach the message to
/// the right form control. It is `None` for entry-level failures (e.g. the
/// submission is not an object at all).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: Option<String>,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "invalid value for `{field}`: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn entry(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("type `{type_name}` declares predicate `{predicate}` more than once")]
    DuplicatePredicate { type_name: String, predicate: String },
    #[error("type `{0}` is declared more than once")]
    DuplicateType(String),
    #[error("type `{type_name}` extends `{base}`, which is not declared before it")]
    UnknownBase { type_name: String, base: String },
    #[error("unknown type `{0}`")]
    UnknownType(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UidError {
    #[error("`{0}` is not a node uid (expected 0x-prefixed hex)")]
    Malformed(String),
    #[error("`{0}` is not a blank node label")]
    BadBlank(String),
}
