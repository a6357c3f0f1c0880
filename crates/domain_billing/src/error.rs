//! Billing domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{AccessError, ErrorKind, MoneyError, PortError};

use crate::invoice::InvoiceStatus;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// No authenticated user
    #[error("Authentication required")]
    Unauthorized,

    /// Caller is not a member of the organization or lacks the role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invoice, item, chargeable or member does not exist in the organization
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// Operation not permitted in the invoice's status
    #[error("Cannot {operation} an invoice in status {status}")]
    InvalidState {
        status: InvoiceStatus,
        operation: &'static str,
    },

    /// Account credit balance too low
    #[error("Insufficient account credit: available {available}, requested {requested}")]
    InsufficientCredit {
        available: Decimal,
        requested: Decimal,
    },

    /// Concurrent modification detected by storage
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Sequence generator or storage failed unexpectedly
    #[error("Dependency failure: {0}")]
    Dependency(PortError),
}

impl BillingError {
    /// Creates an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        BillingError::InvalidInput(message.into())
    }

    /// Creates a not found error
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BillingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Machine-readable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::Unauthorized => ErrorKind::Unauthorized,
            BillingError::Forbidden(_) => ErrorKind::Forbidden,
            BillingError::InvalidInput(_) => ErrorKind::InvalidInput,
            BillingError::NotFound { .. } => ErrorKind::NotFound,
            BillingError::InvalidState { .. } => ErrorKind::InvalidState,
            BillingError::InsufficientCredit { .. } => ErrorKind::InsufficientCredit,
            BillingError::Conflict(_) => ErrorKind::Conflict,
            BillingError::Dependency(_) => ErrorKind::DependencyFailure,
        }
    }
}

impl From<AccessError> for BillingError {
    fn from(error: AccessError) -> Self {
        match error {
            AccessError::Unauthorized => BillingError::Unauthorized,
            AccessError::Lookup(source) => BillingError::Dependency(source),
            other => BillingError::Forbidden(other.to_string()),
        }
    }
}

impl From<MoneyError> for BillingError {
    fn from(error: MoneyError) -> Self {
        BillingError::InvalidInput(error.to_string())
    }
}

impl From<PortError> for BillingError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Conflict { message } => BillingError::Conflict(message),
            PortError::Validation { message, .. } => BillingError::InvalidInput(message),
            other => BillingError::Dependency(other),
        }
    }
}
