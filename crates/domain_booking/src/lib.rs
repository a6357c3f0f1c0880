//! Booking Domain - Aircraft and Instructor Scheduling
//!
//! This crate owns the booking lifecycle of a flight school:
//!
//! - **Status machine**: `unconfirmed -> confirmed -> briefing -> flying -> complete`,
//!   with `cancelled` reachable from any non-terminal status
//! - **Conflict guard**: no two active bookings may overlap on the same
//!   aircraft, member or instructor
//! - **Check-out**: booking fields, flight details and the move to `flying`
//!   committed as one unit of work
//! - **Audit trail**: every committed mutation appends column-level changes
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_booking::{BookingPatch, BookingService, BookingStatus};
//!
//! let service = BookingService::new(bookings, access);
//! let patch = BookingPatch {
//!     status: Some(BookingStatus::Confirmed),
//!     ..Default::default()
//! };
//! let booking = service.update_booking(booking_id, patch, &principal).await?;
//! ```

pub mod booking;
pub mod details;
pub mod conflict;
pub mod ports;
pub mod services;
pub mod audit_trail;
pub mod error;

pub use booking::{Booking, BookingPatch, BookingStatus, BookingType, NewBooking};
pub use details::{BookingDetails, BookingDetailsPatch};
pub use conflict::{find_conflicts, BookingConflict, ConflictResource, OverlapQuery, ACTIVE_STATUSES};
pub use ports::{BookingPort, BookingUnit};
pub use services::{BookingService, BookingWithDetails, CheckOutOutcome, CheckOutRequest};
pub use audit_trail::{AuditLine, AuditTrailService};
pub use error::BookingError;
