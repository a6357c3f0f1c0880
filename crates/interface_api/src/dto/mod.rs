//! Request bodies and query strings
//!
//! Responses are the domain views themselves; only inputs get dedicated
//! types so that wire shape and validation stay out of the domains.

pub mod audit;
pub mod billing;
pub mod booking;

use serde::{Deserialize, Deserializer};

/// Distinguishes an absent field from an explicit `null`
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent gives `None`, `null` gives `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "double_option")]
        remarks: Option<Option<String>>,
    }

    #[test]
    fn test_absent_null_and_value_differ() {
        let absent: Probe = serde_json::from_str("{}").unwrap();
        let null: Probe = serde_json::from_str(r#"{"remarks": null}"#).unwrap();
        let value: Probe = serde_json::from_str(r#"{"remarks": "wet runway"}"#).unwrap();

        assert_eq!(absent.remarks, None);
        assert_eq!(null.remarks, Some(None));
        assert_eq!(value.remarks, Some(Some("wet runway".to_string())));
    }
}
