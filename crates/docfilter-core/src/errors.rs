use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("nested_path is required for nested sort field '{0}'")]
    MissingNestedPath(String),
    #[error("index not found: {0}")]
    IndexNotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl FilterError {
    /// Configuration errors are the only build failures caused by the
    /// declared filter set rather than the document store.
    pub fn is_configuration(&self) -> bool {
        matches!(self, FilterError::MissingNestedPath(_))
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;

/// Validation failure for a single bound input. Recorded against the input
/// key, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "value", rename_all = "snake_case")]
pub enum FieldError {
    #[error("enter a number, got '{0}'")]
    InvalidNumber(String),
    #[error("enter a valid date, got '{0}'")]
    InvalidDate(String),
    #[error("enter a valid boolean, got '{0}'")]
    InvalidBoolean(String),
    #[error("select a valid choice; '{0}' is not one of the available choices")]
    InvalidChoice(String),
}
