//! Unit tests for the identifier newtypes
//!
//! Every identifier comes out of the same macro, so the behaviour is
//! exercised through a few representative types.

use core_kernel::{AircraftId, BookingId, InvoiceId, OrganizationId, TransactionId, UserId};
use std::collections::HashSet;
use uuid::Uuid;

mod booking_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = BookingId::new();
        let id2 = BookingId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = BookingId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = BookingId::new_v7();
        assert!(id1 < id2);
    }

    #[test]
    fn test_display_uses_prefix() {
        let uuid = Uuid::new_v4();
        let id = BookingId::from_uuid(uuid);
        assert_eq!(id.to_string(), format!("BKG-{}", uuid));
        assert_eq!(BookingId::prefix(), "BKG");
    }

    #[test]
    fn test_parse_accepts_prefixed_and_raw() {
        let uuid = Uuid::new_v4();
        let prefixed: BookingId = format!("BKG-{}", uuid).parse().unwrap();
        let raw: BookingId = uuid.to_string().parse().unwrap();
        assert_eq!(prefixed, raw);
        assert_eq!(*raw.as_uuid(), uuid);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("BKG-not-a-uuid".parse::<BookingId>().is_err());
    }
}

mod conversion_tests {
    use super::*;

    #[test]
    fn test_uuid_round_trip() {
        let uuid = Uuid::new_v4();
        let id = InvoiceId::from(uuid);
        let back: Uuid = id.into();
        assert_eq!(uuid, back);
    }

    #[test]
    fn test_serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id = AircraftId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn test_prefixes_are_distinct() {
        let prefixes: HashSet<&str> = [
            OrganizationId::prefix(),
            UserId::prefix(),
            AircraftId::prefix(),
            BookingId::prefix(),
            InvoiceId::prefix(),
            TransactionId::prefix(),
        ]
        .into_iter()
        .collect();
        assert_eq!(prefixes.len(), 6);
    }

    #[test]
    fn test_usable_as_hash_keys() {
        let mut set = HashSet::new();
        let id = UserId::new();
        set.insert(id);
        set.insert(id);
        assert_eq!(set.len(), 1);
    }
}
