//! Flight details captured at check-out
//!
//! One row per booking, created on the first check-out save and updated on
//! every later one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use core_kernel::{record_change, BookingDetailsId, BookingId, ColumnChanges, OrganizationId};

use crate::booking::{Booking, MAX_REMARKS_LEN};
use crate::error::BookingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub id: BookingDetailsId,
    pub booking_id: BookingId,
    pub organization_id: OrganizationId,
    pub eta: Option<DateTime<Utc>>,
    pub passengers: Option<String>,
    pub route: Option<String>,
    /// Free-form equipment checklist
    pub equipment: Option<Value>,
    pub remarks: Option<String>,
    pub authorization_completed: bool,
    /// Recorded for reporting only; the conflict guard still applies
    pub override_conflict: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of booking details
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingDetailsPatch {
    pub eta: Option<Option<DateTime<Utc>>>,
    pub passengers: Option<Option<String>>,
    pub route: Option<Option<String>>,
    pub equipment: Option<Option<Value>>,
    pub remarks: Option<Option<String>>,
    pub authorization_completed: Option<bool>,
    pub override_conflict: Option<bool>,
}

impl BookingDetailsPatch {
    pub fn validate(&self) -> Result<(), BookingError> {
        for (field, value) in [
            ("passengers", &self.passengers),
            ("route", &self.route),
            ("remarks", &self.remarks),
        ] {
            if let Some(Some(text)) = value {
                if text.chars().count() > MAX_REMARKS_LEN {
                    return Err(BookingError::invalid(format!(
                        "{} must be at most {} characters",
                        field, MAX_REMARKS_LEN
                    )));
                }
            }
        }
        Ok(())
    }
}

impl BookingDetails {
    /// Empty details for a booking
    pub fn new(booking: &Booking, now: DateTime<Utc>) -> Self {
        Self {
            id: BookingDetailsId::new_v7(),
            booking_id: booking.id,
            organization_id: booking.organization_id,
            eta: None,
            passengers: None,
            route: None,
            equipment: None,
            remarks: None,
            authorization_completed: false,
            override_conflict: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a patch and returns the changed columns
    pub fn apply(&mut self, patch: &BookingDetailsPatch, now: DateTime<Utc>) -> ColumnChanges {
        let mut changes = ColumnChanges::new();

        if let Some(eta) = patch.eta {
            record_change(&mut changes, "eta", &self.eta, &eta);
            self.eta = eta;
        }
        if let Some(passengers) = &patch.passengers {
            record_change(&mut changes, "passengers", &self.passengers, passengers);
            self.passengers = passengers.clone();
        }
        if let Some(route) = &patch.route {
            record_change(&mut changes, "route", &self.route, route);
            self.route = route.clone();
        }
        if let Some(equipment) = &patch.equipment {
            record_change(&mut changes, "equipment", &self.equipment, equipment);
            self.equipment = equipment.clone();
        }
        if let Some(remarks) = &patch.remarks {
            record_change(&mut changes, "remarks", &self.remarks, remarks);
            self.remarks = remarks.clone();
        }
        if let Some(completed) = patch.authorization_completed {
            record_change(
                &mut changes,
                "authorization_completed",
                &self.authorization_completed,
                &completed,
            );
            self.authorization_completed = completed;
        }
        if let Some(override_conflict) = patch.override_conflict {
            record_change(
                &mut changes,
                "override_conflict",
                &self.override_conflict,
                &override_conflict,
            );
            self.override_conflict = override_conflict;
        }

        self.updated_at = now;
        changes
    }
}
