//! Core error types used across the system

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::money::MoneyError;
use crate::temporal::TemporalError;

/// Core error type for the kernel
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CoreError::NotFound(message.into())
    }

    /// Machine-readable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Money(_) | CoreError::Temporal(_) | CoreError::Validation(_) => {
                ErrorKind::InvalidInput
            }
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Configuration(_) => ErrorKind::DependencyFailure,
        }
    }
}

/// Machine-readable error taxonomy shared by every domain
///
/// Each domain error maps onto exactly one kind; the API layer turns the
/// kind into a status code and a stable `error` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No authenticated identity
    Unauthorized,
    /// Identity present but not a member of the organization, or role too low
    Forbidden,
    /// Request shape or field constraint violated
    InvalidInput,
    /// Referenced entity does not exist (in this organization)
    NotFound,
    /// Double booking or concurrent modification
    Conflict,
    /// Operation not permitted in the entity's current status
    InvalidState,
    /// Entity is in a terminal status
    Immutable,
    /// Account credit balance too low
    InsufficientCredit,
    /// A collaborator (storage, sequence generator) failed unexpectedly
    DependencyFailure,
}

impl ErrorKind {
    /// Returns the stable wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Immutable => "immutable",
            ErrorKind::InsufficientCredit => "insufficient_credit",
            ErrorKind::DependencyFailure => "dependency_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
