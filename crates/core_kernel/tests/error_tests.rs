//! Tests for core_kernel error types

use core_kernel::error::{CoreError, ErrorKind};
use core_kernel::money::MoneyError;
use core_kernel::temporal::TemporalError;
use chrono::{TimeZone, Utc};

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(ref msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
    assert_eq!(error.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_core_error_not_found() {
    let error = CoreError::not_found("Booking not found");

    match error {
        CoreError::NotFound(ref msg) => assert_eq!(msg, "Booking not found"),
        _ => panic!("Expected NotFound error"),
    }
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[test]
fn test_core_error_from_money_error() {
    let money_error = MoneyError::InvalidRate("-0.1 is negative".to_string());
    let core_error: CoreError = money_error.into();

    assert!(matches!(core_error, CoreError::Money(_)));
    assert_eq!(core_error.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_core_error_from_temporal_error() {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    let core_error: CoreError = TemporalError::InvalidRange {
        start: at.to_rfc3339(),
        end: at.to_rfc3339(),
    }
    .into();

    assert!(matches!(core_error, CoreError::Temporal(_)));
    assert!(core_error.to_string().contains("2024-06-01T09:00:00"));
}

#[test]
fn test_core_error_display() {
    let error = CoreError::validation("Test error");
    let display = format!("{}", error);

    assert!(display.contains("Validation error"));
}

#[test]
fn test_core_error_configuration() {
    let error = CoreError::Configuration("Missing config".to_string());

    match error {
        CoreError::Configuration(ref msg) => assert_eq!(msg, "Missing config"),
        _ => panic!("Expected Configuration error"),
    }
    assert_eq!(error.kind(), ErrorKind::DependencyFailure);
}

mod error_kind_tests {
    use super::*;

    #[test]
    fn test_as_str_is_snake_case() {
        assert_eq!(ErrorKind::InvalidInput.as_str(), "invalid_input");
        assert_eq!(ErrorKind::InsufficientCredit.as_str(), "insufficient_credit");
        assert_eq!(ErrorKind::DependencyFailure.as_str(), "dependency_failure");
    }

    #[test]
    fn test_serializes_like_as_str() {
        for kind in [
            ErrorKind::Unauthorized,
            ErrorKind::Forbidden,
            ErrorKind::InvalidInput,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::InvalidState,
            ErrorKind::Immutable,
            ErrorKind::InsufficientCredit,
            ErrorKind::DependencyFailure,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
