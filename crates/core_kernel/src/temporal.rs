//! Half-open time ranges used for scheduling
//!
//! A booking occupies `[start, end)`: the end instant is free for the next
//! booking, so back-to-back bookings never conflict.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid range: start {start} must be before end {end}")]
    InvalidRange {
        start: String,
        end: String,
    },
}

/// A bounded, half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a new range, requiring `start < end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TemporalError> {
        if start >= end {
            return Err(TemporalError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Start of the range (inclusive)
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the range (exclusive)
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Length of the range
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns true if the instant falls inside the range
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Returns true if the two ranges share at least one instant
    ///
    /// Touching endpoints (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_touching_ranges_do_not_overlap() {
        let a = TimeRange::new(at(10), at(11)).unwrap();
        let b = TimeRange::new(at(11), at(12)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_empty_range_rejected() {
        assert!(TimeRange::new(at(10), at(10)).is_err());
    }
}
