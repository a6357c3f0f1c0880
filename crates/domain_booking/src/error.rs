//! Booking domain errors

use thiserror::Error;

use core_kernel::{AccessError, ErrorKind, PortError};

use crate::booking::BookingStatus;

/// Errors that can occur in the booking domain
#[derive(Debug, Error)]
pub enum BookingError {
    /// No authenticated user
    #[error("Authentication required")]
    Unauthorized,

    /// Caller is not a member of the organization or lacks the role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request failed shape validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Booking or a referenced entity does not exist in the organization
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// Another active booking holds the resource for an overlapping period
    #[error("Booking conflict: {0}")]
    Conflict(String),

    /// Booking is complete or cancelled
    #[error("Booking is {status} and can no longer be modified")]
    Immutable {
        status: BookingStatus,
    },

    /// Storage failed unexpectedly
    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl BookingError {
    /// Creates an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        BookingError::InvalidInput(message.into())
    }

    /// Creates a not found error
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BookingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Machine-readable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Unauthorized => ErrorKind::Unauthorized,
            BookingError::Forbidden(_) => ErrorKind::Forbidden,
            BookingError::InvalidInput(_) => ErrorKind::InvalidInput,
            BookingError::NotFound { .. } => ErrorKind::NotFound,
            BookingError::Conflict(_) => ErrorKind::Conflict,
            BookingError::Immutable { .. } => ErrorKind::Immutable,
            BookingError::Storage(_) => ErrorKind::DependencyFailure,
        }
    }
}

impl From<AccessError> for BookingError {
    fn from(error: AccessError) -> Self {
        match error {
            AccessError::Unauthorized => BookingError::Unauthorized,
            AccessError::Lookup(source) => BookingError::Storage(source),
            other => BookingError::Forbidden(other.to_string()),
        }
    }
}

impl From<PortError> for BookingError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Conflict { message } => BookingError::Conflict(message),
            PortError::NotFound { entity_type, id } => BookingError::NotFound {
                entity: entity_label(&entity_type),
                id,
            },
            PortError::Validation { message, .. } => BookingError::InvalidInput(message),
            other => BookingError::Storage(other),
        }
    }
}

fn entity_label(entity_type: &str) -> &'static str {
    match entity_type {
        "Booking" => "Booking",
        "BookingDetails" => "Booking details",
        "Aircraft" => "Aircraft",
        _ => "Entity",
    }
}
