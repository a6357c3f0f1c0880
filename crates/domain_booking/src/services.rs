//! Booking domain services
//!
//! [`BookingService`] orchestrates authorization, validation, the conflict
//! guard and the audit trail around one storage unit of work per call.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{
    authorize, resolve_actor, snapshot_changes, AccessPort, AuditAction, AuditEntry, BookingId,
    Capability, ColumnChanges, OrganizationId, Principal, UserId,
};

use crate::booking::{Booking, BookingPatch, BookingStatus, NewBooking};
use crate::conflict::{describe_conflicts, find_conflicts, OverlapQuery};
use crate::details::{BookingDetails, BookingDetailsPatch};
use crate::error::BookingError;
use crate::ports::{BookingPort, BookingUnit};

const BOOKINGS_TABLE: &str = "bookings";
const DETAILS_TABLE: &str = "booking_details";

/// A booking together with its check-out details
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BookingWithDetails {
    pub booking: Booking,
    #[serde(rename = "bookingDetails")]
    pub booking_details: Option<BookingDetails>,
}

/// Combined check-out submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckOutRequest {
    /// Scheduling fields; any status in it is ignored
    pub booking: Option<BookingPatch>,
    pub booking_details: Option<BookingDetailsPatch>,
}

/// Result of a check-out save
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CheckOutOutcome {
    pub booking: Booking,
    #[serde(rename = "bookingDetails")]
    pub booking_details: BookingDetails,
}

/// Service for the booking lifecycle
pub struct BookingService {
    bookings: Arc<dyn BookingPort>,
    access: Arc<dyn AccessPort>,
}

impl BookingService {
    pub fn new(bookings: Arc<dyn BookingPort>, access: Arc<dyn AccessPort>) -> Self {
        Self { bookings, access }
    }

    /// Reads a booking with its details
    ///
    /// Staff of the organization and the booked member may read.
    #[instrument(skip(self, principal), fields(booking_id = %booking_id))]
    pub async fn get_booking(
        &self,
        booking_id: BookingId,
        principal: &Principal,
    ) -> Result<BookingWithDetails, BookingError> {
        principal.user_id().ok_or(BookingError::Unauthorized)?;

        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking", booking_id))?;

        let actor = resolve_actor(self.access.as_ref(), principal, booking.organization_id).await?;
        if !actor.can(Capability::ManageBookings) && actor.user_id != booking.user_id {
            return Err(BookingError::Forbidden(format!(
                "role {} may only read its own bookings",
                actor.role
            )));
        }

        let booking_details = self.bookings.get_booking_details(booking_id).await?;
        Ok(BookingWithDetails {
            booking,
            booking_details,
        })
    }

    /// Creates a booking for a member of the organization
    #[instrument(skip(self, input, principal), fields(organization_id = %input.organization_id))]
    pub async fn create_booking(
        &self,
        input: NewBooking,
        principal: &Principal,
    ) -> Result<Booking, BookingError> {
        let user_id = principal.user_id().ok_or(BookingError::Unauthorized)?;
        input.validate()?;

        let organization_id = input.organization_id;
        authorize(self.access.as_ref(), principal, organization_id, Capability::ManageBookings).await?;
        self.ensure_member(organization_id, input.user_id).await?;
        if let Some(instructor_id) = input.instructor_id {
            self.ensure_instructor(organization_id, instructor_id).await?;
        }

        let booking = Booking::new(input, Utc::now())?;

        let mut unit = self.bookings.begin().await?;
        ensure_references(unit.as_mut(), organization_id, &booking).await?;
        if booking.status.is_active() {
            guard_overlaps(unit.as_mut(), &booking).await?;
        }

        unit.insert_booking(&booking).await?;
        append_audit(
            unit.as_mut(),
            &booking,
            BOOKINGS_TABLE,
            *booking.id.as_uuid(),
            AuditAction::Insert,
            user_id,
            snapshot_changes(&booking),
        )
        .await?;
        unit.commit().await?;

        info!(booking_id = %booking.id, status = %booking.status, "Booking created");
        Ok(booking)
    }

    /// Validates a patch against the stored booking and commits it
    #[instrument(skip(self, patch, principal), fields(booking_id = %booking_id))]
    pub async fn update_booking(
        &self,
        booking_id: BookingId,
        patch: BookingPatch,
        principal: &Principal,
    ) -> Result<Booking, BookingError> {
        let user_id = principal.user_id().ok_or(BookingError::Unauthorized)?;
        patch.validate()?;

        let mut unit = self.bookings.begin().await?;
        let current = self.lock_for_mutation(unit.as_mut(), booking_id, principal).await?;
        ensure_patch_references(unit.as_mut(), current.organization_id, &patch).await?;
        current.ensure_mutable()?;

        let mut updated = current.clone();
        let changes = updated.apply(&patch, Utc::now())?;
        if updated.status.is_active() {
            guard_overlaps(unit.as_mut(), &updated).await?;
        }

        unit.update_booking(&updated).await?;
        append_audit(
            unit.as_mut(),
            &updated,
            BOOKINGS_TABLE,
            *updated.id.as_uuid(),
            AuditAction::Update,
            user_id,
            changes,
        )
        .await?;
        unit.commit().await?;

        info!(
            booking_id = %updated.id,
            from = %current.status,
            to = %updated.status,
            "Booking updated"
        );
        Ok(updated)
    }

    /// Saves check-out fields and details, then moves the booking to flying
    ///
    /// Everything happens in one unit of work.
    #[instrument(skip(self, request, principal), fields(booking_id = %booking_id))]
    pub async fn check_out(
        &self,
        booking_id: BookingId,
        request: CheckOutRequest,
        principal: &Principal,
    ) -> Result<CheckOutOutcome, BookingError> {
        self.save_check_out_inner(booking_id, request, principal, Some(BookingStatus::Flying))
            .await
    }

    /// Saves check-out fields and details without changing status
    #[instrument(skip(self, request, principal), fields(booking_id = %booking_id))]
    pub async fn save_check_out(
        &self,
        booking_id: BookingId,
        request: CheckOutRequest,
        principal: &Principal,
    ) -> Result<CheckOutOutcome, BookingError> {
        self.save_check_out_inner(booking_id, request, principal, None)
            .await
    }

    /// Cancels a non-terminal booking
    #[instrument(skip(self, principal), fields(booking_id = %booking_id))]
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        principal: &Principal,
    ) -> Result<Booking, BookingError> {
        let user_id = principal.user_id().ok_or(BookingError::Unauthorized)?;

        let mut unit = self.bookings.begin().await?;
        let mut booking = self.lock_for_mutation(unit.as_mut(), booking_id, principal).await?;
        booking.ensure_mutable()?;

        let changes = booking.transition(BookingStatus::Cancelled, Utc::now());
        unit.update_booking(&booking).await?;
        append_audit(
            unit.as_mut(),
            &booking,
            BOOKINGS_TABLE,
            *booking.id.as_uuid(),
            AuditAction::Update,
            user_id,
            changes,
        )
        .await?;
        unit.commit().await?;

        info!(booking_id = %booking.id, "Booking cancelled");
        Ok(booking)
    }

    async fn save_check_out_inner(
        &self,
        booking_id: BookingId,
        request: CheckOutRequest,
        principal: &Principal,
        transition: Option<BookingStatus>,
    ) -> Result<CheckOutOutcome, BookingError> {
        let user_id = principal.user_id().ok_or(BookingError::Unauthorized)?;

        let mut booking_patch = request.booking.unwrap_or_default();
        booking_patch.status = transition;
        booking_patch.validate()?;
        let details_patch = request.booking_details.unwrap_or_default();
        details_patch.validate()?;

        let mut unit = self.bookings.begin().await?;
        let current = self.lock_for_mutation(unit.as_mut(), booking_id, principal).await?;
        ensure_patch_references(unit.as_mut(), current.organization_id, &booking_patch).await?;
        current.ensure_mutable()?;

        let now = Utc::now();
        let mut booking = current.clone();
        let booking_changes = booking.apply(&booking_patch, now)?;
        if booking.status.is_active() {
            guard_overlaps(unit.as_mut(), &booking).await?;
        }
        unit.update_booking(&booking).await?;
        append_audit(
            unit.as_mut(),
            &booking,
            BOOKINGS_TABLE,
            *booking.id.as_uuid(),
            AuditAction::Update,
            user_id,
            booking_changes,
        )
        .await?;

        let (mut details, action) = match unit.lock_details(booking_id).await? {
            Some(existing) => (existing, AuditAction::Update),
            None => (BookingDetails::new(&booking, now), AuditAction::Insert),
        };
        let mut details_changes = details.apply(&details_patch, now);
        if action == AuditAction::Insert {
            details_changes = snapshot_changes(&details);
        }
        unit.upsert_details(&details).await?;
        append_audit(
            unit.as_mut(),
            &booking,
            DETAILS_TABLE,
            *details.id.as_uuid(),
            action,
            user_id,
            details_changes,
        )
        .await?;

        unit.commit().await?;

        info!(
            booking_id = %booking.id,
            status = %booking.status,
            transitioned = transition.is_some(),
            "Check-out saved"
        );
        Ok(CheckOutOutcome {
            booking,
            booking_details: details,
        })
    }

    /// Loads the booking inside the unit and checks the caller may manage it
    async fn lock_for_mutation(
        &self,
        unit: &mut dyn BookingUnit,
        booking_id: BookingId,
        principal: &Principal,
    ) -> Result<Booking, BookingError> {
        let booking = unit
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking", booking_id))?;

        if let Err(error) = authorize(
            self.access.as_ref(),
            principal,
            booking.organization_id,
            Capability::ManageBookings,
        )
        .await
        {
            warn!(booking_id = %booking_id, error = %error, "Booking mutation refused");
            return Err(error.into());
        }
        Ok(booking)
    }

    async fn ensure_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<(), BookingError> {
        self.access
            .role_in(organization_id, user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| BookingError::not_found("Member", user_id))
    }

    async fn ensure_instructor(
        &self,
        organization_id: OrganizationId,
        instructor_id: UserId,
    ) -> Result<(), BookingError> {
        match self.access.role_in(organization_id, instructor_id).await? {
            Some(role) if role.is_staff() => Ok(()),
            Some(role) => Err(BookingError::invalid(format!(
                "instructor {} has role {}, a staff role is required",
                instructor_id, role
            ))),
            None => Err(BookingError::not_found("Instructor", instructor_id)),
        }
    }
}

/// Checks the catalog references of a full booking
async fn ensure_references(
    unit: &mut dyn BookingUnit,
    organization_id: OrganizationId,
    booking: &Booking,
) -> Result<(), BookingError> {
    let patch = BookingPatch {
        aircraft_id: Some(booking.aircraft_id),
        flight_type_id: Some(booking.flight_type_id),
        lesson_id: Some(booking.lesson_id),
        ..Default::default()
    };
    ensure_patch_references(unit, organization_id, &patch).await
}

/// Checks that every catalog entry a patch points at lives in the organization
async fn ensure_patch_references(
    unit: &mut dyn BookingUnit,
    organization_id: OrganizationId,
    patch: &BookingPatch,
) -> Result<(), BookingError> {
    if let Some(aircraft_id) = patch.aircraft_id {
        if !unit.aircraft_in_org(organization_id, aircraft_id).await? {
            return Err(BookingError::not_found("Aircraft", aircraft_id));
        }
    }
    if let Some(Some(flight_type_id)) = patch.flight_type_id {
        if !unit.flight_type_in_org(organization_id, flight_type_id).await? {
            return Err(BookingError::not_found("Flight type", flight_type_id));
        }
    }
    if let Some(Some(lesson_id)) = patch.lesson_id {
        if !unit.lesson_in_org(organization_id, lesson_id).await? {
            return Err(BookingError::not_found("Lesson", lesson_id));
        }
    }
    Ok(())
}

async fn guard_overlaps(unit: &mut dyn BookingUnit, booking: &Booking) -> Result<(), BookingError> {
    let query = OverlapQuery::for_booking(booking)?;
    let candidates = unit.find_active_overlaps(&query).await?;
    let conflicts = find_conflicts(&query, &candidates);
    if conflicts.is_empty() {
        return Ok(());
    }

    let message = describe_conflicts(&conflicts);
    warn!(booking_id = %booking.id, conflicts = %message, "Booking conflict");
    Err(BookingError::Conflict(message))
}

async fn append_audit(
    unit: &mut dyn BookingUnit,
    booking: &Booking,
    table_name: &str,
    row_id: uuid::Uuid,
    action: AuditAction,
    changed_by: UserId,
    changes: ColumnChanges,
) -> Result<(), BookingError> {
    if action == AuditAction::Update && changes.is_empty() {
        return Ok(());
    }
    let entry = AuditEntry::new(
        booking.organization_id,
        table_name,
        row_id,
        action,
        changed_by,
        changes,
    );
    unit.append_audit(&entry).await?;
    Ok(())
}
