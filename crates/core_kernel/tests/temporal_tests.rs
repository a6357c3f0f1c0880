//! Unit tests for half-open time ranges

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::temporal::{TemporalError, TimeRange};
use proptest::prelude::*;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
}

mod creation {
    use super::*;

    #[test]
    fn test_new_creates_range() {
        let range = TimeRange::new(at(9, 0), at(10, 30)).unwrap();
        assert_eq!(range.start(), at(9, 0));
        assert_eq!(range.end(), at(10, 30));
        assert_eq!(range.duration(), Duration::minutes(90));
    }

    #[test]
    fn test_new_rejects_empty_range() {
        let result = TimeRange::new(at(9, 0), at(9, 0));
        assert!(matches!(result, Err(TemporalError::InvalidRange { .. })));
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        assert!(TimeRange::new(at(10, 0), at(9, 0)).is_err());
    }
}

mod overlap {
    use super::*;

    #[test]
    fn test_adjacent_ranges_do_not_overlap() {
        let morning = TimeRange::new(at(9, 0), at(10, 0)).unwrap();
        let next = TimeRange::new(at(10, 0), at(11, 0)).unwrap();
        assert!(!morning.overlaps(&next));
        assert!(!next.overlaps(&morning));
    }

    #[test]
    fn test_partial_overlap() {
        let a = TimeRange::new(at(9, 0), at(10, 0)).unwrap();
        let b = TimeRange::new(at(9, 30), at(11, 0)).unwrap();
        assert!(a.overlaps(&b));
    }

    #[test]
    fn test_containment_overlaps() {
        let outer = TimeRange::new(at(8, 0), at(12, 0)).unwrap();
        let inner = TimeRange::new(at(9, 0), at(10, 0)).unwrap();
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn test_contains_is_half_open() {
        let range = TimeRange::new(at(9, 0), at(10, 0)).unwrap();
        assert!(range.contains(at(9, 0)));
        assert!(range.contains(at(9, 59)));
        assert!(!range.contains(at(10, 0)));
    }
}

proptest! {
    #[test]
    fn prop_overlap_is_symmetric(a in 0i64..1440, al in 1i64..300, b in 0i64..1440, bl in 1i64..300) {
        let base = at(0, 0);
        let first = TimeRange::new(base + Duration::minutes(a), base + Duration::minutes(a + al)).unwrap();
        let second = TimeRange::new(base + Duration::minutes(b), base + Duration::minutes(b + bl)).unwrap();
        prop_assert_eq!(first.overlaps(&second), second.overlaps(&first));
    }
}
