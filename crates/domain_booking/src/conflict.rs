//! Resource conflict detection
//!
//! Two bookings conflict when both are active, share the aircraft, the
//! member or the instructor, and their half-open periods overlap. Touching
//! endpoints never conflict. Storage adapters narrow candidates with the
//! same rules; [`find_conflicts`] is the final word.

use serde::{Deserialize, Serialize};

use core_kernel::{AircraftId, BookingId, TimeRange, UserId};

use crate::booking::{Booking, BookingStatus};
use crate::error::BookingError;

/// Statuses that hold their resources exclusively
pub const ACTIVE_STATUSES: [BookingStatus; 3] = [
    BookingStatus::Confirmed,
    BookingStatus::Briefing,
    BookingStatus::Flying,
];

/// Resource two bookings are competing for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResource {
    Aircraft,
    Member,
    Instructor,
}

impl ConflictResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResource::Aircraft => "aircraft",
            ConflictResource::Member => "member",
            ConflictResource::Instructor => "instructor",
        }
    }
}

/// An existing booking that blocks the candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConflict {
    pub booking_id: BookingId,
    pub resource: ConflictResource,
}

/// Resources and period a candidate booking wants to hold
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapQuery {
    /// The candidate itself, excluded from the search
    pub exclude: Option<BookingId>,
    pub aircraft_id: AircraftId,
    pub user_id: UserId,
    pub instructor_id: Option<UserId>,
    pub period: TimeRange,
}

impl OverlapQuery {
    /// Builds the query for a booking about to be written
    pub fn for_booking(booking: &Booking) -> Result<Self, BookingError> {
        Ok(Self {
            exclude: Some(booking.id),
            aircraft_id: booking.aircraft_id,
            user_id: booking.user_id,
            instructor_id: booking.instructor_id,
            period: booking.period()?,
        })
    }

    /// The first resource `other` competes for, if it conflicts at all
    pub fn conflict_with(&self, other: &Booking) -> Option<ConflictResource> {
        if Some(other.id) == self.exclude || !other.status.is_active() {
            return None;
        }
        let overlaps = self.period.start() < other.end_time && other.start_time < self.period.end();
        if !overlaps {
            return None;
        }

        if other.aircraft_id == self.aircraft_id {
            Some(ConflictResource::Aircraft)
        } else if other.user_id == self.user_id {
            Some(ConflictResource::Member)
        } else if self.instructor_id.is_some() && other.instructor_id == self.instructor_id {
            Some(ConflictResource::Instructor)
        } else {
            None
        }
    }
}

/// Returns every candidate that blocks the query
pub fn find_conflicts<'a>(
    query: &OverlapQuery,
    candidates: impl IntoIterator<Item = &'a Booking>,
) -> Vec<BookingConflict> {
    candidates
        .into_iter()
        .filter_map(|other| {
            query.conflict_with(other).map(|resource| BookingConflict {
                booking_id: other.id,
                resource,
            })
        })
        .collect()
}

/// Human-readable summary of conflicts for error messages
pub fn describe_conflicts(conflicts: &[BookingConflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("{} already booked by {}", c.resource.as_str(), c.booking_id))
        .collect::<Vec<_>>()
        .join(", ")
}
