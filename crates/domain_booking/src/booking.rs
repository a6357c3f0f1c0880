//! Booking aggregate and its status machine
//!
//! A booking reserves an aircraft for a member (optionally with an
//! instructor) over a half-open period `[start_time, end_time)`. Status
//! moves are permissive: any non-terminal booking may be set to any of the
//! five schedulable statuses. Only the explicit cancel operation produces
//! `cancelled`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    record_change, AircraftId, BookingId, ColumnChanges, FlightTypeId, LessonId, OrganizationId,
    TimeRange, UserId,
};

use crate::error::BookingError;

/// Maximum length of the booking purpose
pub const MAX_PURPOSE_LEN: usize = 500;

/// Maximum length of remarks and instructor comments
pub const MAX_REMARKS_LEN: usize = 1000;

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Requested, not yet confirmed by staff
    Unconfirmed,
    /// Confirmed slot
    Confirmed,
    /// Pre-flight briefing in progress
    Briefing,
    /// Checked out and airborne
    Flying,
    /// Flight finished
    Complete,
    /// Withdrawn
    Cancelled,
}

impl BookingStatus {
    /// Statuses a patch may set directly
    pub const SCHEDULABLE: [BookingStatus; 5] = [
        BookingStatus::Unconfirmed,
        BookingStatus::Confirmed,
        BookingStatus::Briefing,
        BookingStatus::Flying,
        BookingStatus::Complete,
    ];

    /// Whether bookings in this status hold their resources exclusively
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::Briefing | BookingStatus::Flying
        )
    }

    /// Whether the booking can no longer be modified
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Complete | BookingStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Unconfirmed => "unconfirmed",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Briefing => "briefing",
            BookingStatus::Flying => "flying",
            BookingStatus::Complete => "complete",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unconfirmed" => Ok(BookingStatus::Unconfirmed),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "briefing" => Ok(BookingStatus::Briefing),
            "flying" => Ok(BookingStatus::Flying),
            "complete" => Ok(BookingStatus::Complete),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(BookingError::invalid(format!("unknown booking status '{}'", other))),
        }
    }
}

/// What the aircraft is booked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Flight,
    Groundwork,
    Maintenance,
    Other,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Flight => "flight",
            BookingType::Groundwork => "groundwork",
            BookingType::Maintenance => "maintenance",
            BookingType::Other => "other",
        }
    }
}

/// A scheduled use of an aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub organization_id: OrganizationId,
    pub aircraft_id: AircraftId,
    /// The member flying
    pub user_id: UserId,
    pub instructor_id: Option<UserId>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub purpose: String,
    pub remarks: Option<String>,
    pub flight_type_id: Option<FlightTypeId>,
    pub lesson_id: Option<LessonId>,
    pub booking_type: Option<BookingType>,
    pub briefing_completed: bool,
    pub instructor_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a booking
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub organization_id: OrganizationId,
    pub aircraft_id: AircraftId,
    pub user_id: UserId,
    pub instructor_id: Option<UserId>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Defaults to unconfirmed
    pub status: Option<BookingStatus>,
    pub purpose: String,
    pub remarks: Option<String>,
    pub flight_type_id: Option<FlightTypeId>,
    pub lesson_id: Option<LessonId>,
    pub booking_type: Option<BookingType>,
}

impl NewBooking {
    /// Checks field lengths, status and the time range
    pub fn validate(&self) -> Result<(), BookingError> {
        validate_text("purpose", Some(&self.purpose), MAX_PURPOSE_LEN)?;
        validate_text("remarks", self.remarks.as_deref(), MAX_REMARKS_LEN)?;
        if let Some(status) = self.status {
            validate_schedulable(status)?;
        }
        validate_range(self.start_time, self.end_time)?;
        Ok(())
    }
}

/// Partial update of a booking
///
/// `None` leaves a field untouched. For nullable columns `Some(None)`
/// clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingPatch {
    pub aircraft_id: Option<AircraftId>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<BookingStatus>,
    pub purpose: Option<String>,
    pub remarks: Option<Option<String>>,
    pub flight_type_id: Option<Option<FlightTypeId>>,
    pub lesson_id: Option<Option<LessonId>>,
    pub booking_type: Option<Option<BookingType>>,
    pub briefing_completed: Option<bool>,
    pub instructor_comment: Option<Option<String>>,
}

impl BookingPatch {
    /// Checks everything that can be checked without the stored booking
    pub fn validate(&self) -> Result<(), BookingError> {
        validate_text("purpose", self.purpose.as_deref(), MAX_PURPOSE_LEN)?;
        validate_text("remarks", self.remarks.as_ref().and_then(|r| r.as_deref()), MAX_REMARKS_LEN)?;
        validate_text(
            "instructor_comment",
            self.instructor_comment.as_ref().and_then(|c| c.as_deref()),
            MAX_REMARKS_LEN,
        )?;
        if let Some(status) = self.status {
            validate_schedulable(status)?;
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            validate_range(start, end)?;
        }
        Ok(())
    }

    /// Returns true when the patch sets nothing
    pub fn is_empty(&self) -> bool {
        *self == BookingPatch::default()
    }
}

impl Booking {
    /// Creates a booking from validated input
    pub fn new(input: NewBooking, now: DateTime<Utc>) -> Result<Self, BookingError> {
        input.validate()?;

        Ok(Self {
            id: BookingId::new_v7(),
            organization_id: input.organization_id,
            aircraft_id: input.aircraft_id,
            user_id: input.user_id,
            instructor_id: input.instructor_id,
            start_time: input.start_time,
            end_time: input.end_time,
            status: input.status.unwrap_or(BookingStatus::Unconfirmed),
            purpose: input.purpose,
            remarks: input.remarks,
            flight_type_id: input.flight_type_id,
            lesson_id: input.lesson_id,
            booking_type: input.booking_type,
            briefing_completed: false,
            instructor_comment: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// The booked period
    pub fn period(&self) -> Result<TimeRange, BookingError> {
        TimeRange::new(self.start_time, self.end_time)
            .map_err(|e| BookingError::invalid(e.to_string()))
    }

    /// Rejects mutation of complete or cancelled bookings
    pub fn ensure_mutable(&self) -> Result<(), BookingError> {
        if self.status.is_terminal() {
            return Err(BookingError::Immutable { status: self.status });
        }
        Ok(())
    }

    /// Applies a patch and returns the changed columns
    ///
    /// The merged period is validated; on error the booking is left as it was.
    pub fn apply(
        &mut self,
        patch: &BookingPatch,
        now: DateTime<Utc>,
    ) -> Result<ColumnChanges, BookingError> {
        let start_time = patch.start_time.unwrap_or(self.start_time);
        let end_time = patch.end_time.unwrap_or(self.end_time);
        validate_range(start_time, end_time)?;

        let mut changes = ColumnChanges::new();

        if let Some(aircraft_id) = patch.aircraft_id {
            record_change(&mut changes, "aircraft_id", &self.aircraft_id, &aircraft_id);
            self.aircraft_id = aircraft_id;
        }
        record_change(&mut changes, "start_time", &self.start_time, &start_time);
        self.start_time = start_time;
        record_change(&mut changes, "end_time", &self.end_time, &end_time);
        self.end_time = end_time;
        if let Some(status) = patch.status {
            record_change(&mut changes, "status", &self.status, &status);
            self.status = status;
        }
        if let Some(purpose) = &patch.purpose {
            record_change(&mut changes, "purpose", &self.purpose, purpose);
            self.purpose = purpose.clone();
        }
        if let Some(remarks) = &patch.remarks {
            record_change(&mut changes, "remarks", &self.remarks, remarks);
            self.remarks = remarks.clone();
        }
        if let Some(flight_type_id) = patch.flight_type_id {
            record_change(&mut changes, "flight_type_id", &self.flight_type_id, &flight_type_id);
            self.flight_type_id = flight_type_id;
        }
        if let Some(lesson_id) = patch.lesson_id {
            record_change(&mut changes, "lesson_id", &self.lesson_id, &lesson_id);
            self.lesson_id = lesson_id;
        }
        if let Some(booking_type) = patch.booking_type {
            record_change(&mut changes, "booking_type", &self.booking_type, &booking_type);
            self.booking_type = booking_type;
        }
        if let Some(briefing_completed) = patch.briefing_completed {
            record_change(
                &mut changes,
                "briefing_completed",
                &self.briefing_completed,
                &briefing_completed,
            );
            self.briefing_completed = briefing_completed;
        }
        if let Some(comment) = &patch.instructor_comment {
            record_change(&mut changes, "instructor_comment", &self.instructor_comment, comment);
            self.instructor_comment = comment.clone();
        }

        self.updated_at = now;
        Ok(changes)
    }

    /// Moves the booking to a new status, returning the change
    pub fn transition(&mut self, status: BookingStatus, now: DateTime<Utc>) -> ColumnChanges {
        let mut changes = ColumnChanges::new();
        record_change(&mut changes, "status", &self.status, &status);
        self.status = status;
        self.updated_at = now;
        changes
    }
}

fn validate_text(field: &str, value: Option<&str>, max: usize) -> Result<(), BookingError> {
    match value {
        Some(text) if text.chars().count() > max => Err(BookingError::invalid(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

fn validate_schedulable(status: BookingStatus) -> Result<(), BookingError> {
    if BookingStatus::SCHEDULABLE.contains(&status) {
        Ok(())
    } else {
        Err(BookingError::invalid(format!(
            "status must be one of unconfirmed, confirmed, briefing, flying, complete (got {})",
            status
        )))
    }
}

fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), BookingError> {
    if start >= end {
        return Err(BookingError::invalid("start_time must be before end_time"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample() -> Booking {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        Booking::new(
            NewBooking {
                organization_id: OrganizationId::new(),
                aircraft_id: AircraftId::new(),
                user_id: UserId::new(),
                instructor_id: None,
                start_time: start,
                end_time: start + Duration::hours(1),
                status: None,
                purpose: "Circuits".to_string(),
                remarks: None,
                flight_type_id: None,
                lesson_id: None,
                booking_type: Some(BookingType::Flight),
            },
            start - Duration::days(1),
        )
        .unwrap()
    }

    #[test]
    fn test_new_booking_starts_unconfirmed() {
        let booking = sample();
        assert_eq!(booking.status, BookingStatus::Unconfirmed);
        assert!(!booking.briefing_completed);
    }

    #[test]
    fn test_apply_records_only_changed_columns() {
        let mut booking = sample();
        let now = booking.updated_at + Duration::hours(1);
        let patch = BookingPatch {
            status: Some(BookingStatus::Confirmed),
            purpose: Some("Circuits".to_string()),
            remarks: Some(Some("Bring headset".to_string())),
            ..Default::default()
        };

        let changes = booking.apply(&patch, now).unwrap();

        assert_eq!(changes.len(), 2);
        assert!(changes.contains_key("status"));
        assert!(changes.contains_key("remarks"));
        assert_eq!(booking.updated_at, now);
    }

    #[test]
    fn test_apply_rejects_inverted_merge() {
        let mut booking = sample();
        let before = booking.clone();
        let patch = BookingPatch {
            end_time: Some(booking.start_time - Duration::minutes(5)),
            ..Default::default()
        };

        let result = booking.apply(&patch, Utc::now());

        assert!(matches!(result, Err(BookingError::InvalidInput(_))));
        assert_eq!(booking, before);
    }

    #[test]
    fn test_patch_cannot_cancel() {
        let patch = BookingPatch {
            status: Some(BookingStatus::Cancelled),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_terminal_statuses_are_immutable() {
        let mut booking = sample();
        booking.transition(BookingStatus::Complete, Utc::now());
        assert!(matches!(booking.ensure_mutable(), Err(BookingError::Immutable { .. })));
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in BookingStatus::SCHEDULABLE {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("pending".parse::<BookingStatus>().is_err());
    }
}
