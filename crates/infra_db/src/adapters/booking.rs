//! PostgreSQL Booking Adapter
//!
//! Implements [`BookingPort`] on top of [`BookingRepository`]. Every unit of
//! work is a SERIALIZABLE transaction, so two requests racing to confirm
//! overlapping bookings cannot both commit: the loser fails with a
//! serialization or exclusion error, surfaced as a conflict.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    AircraftId, AuditAction, AuditEntry, BookingDetailsId, BookingId, DomainPort, FlightTypeId,
    HealthCheckResult, HealthCheckable, LessonId, OrganizationId, PortError, UserId,
};
use domain_booking::{
    Booking, BookingDetails, BookingPort, BookingStatus, BookingType, BookingUnit, OverlapQuery,
};

use crate::adapters::check_pool;
use crate::repositories::audit::{AuditRow, DbAuditAction};
use crate::repositories::booking::{
    BookingDetailsRow, BookingRepository, BookingRow, BookingTx, DbBookingStatus, DbBookingType,
    ReferenceTable,
};

/// PostgreSQL implementation of the booking port
#[derive(Debug, Clone)]
pub struct PostgresBookingAdapter {
    repository: BookingRepository,
}

impl PostgresBookingAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: BookingRepository::new(pool),
        }
    }

    pub fn repository(&self) -> &BookingRepository {
        &self.repository
    }
}

impl DomainPort for PostgresBookingAdapter {}

#[async_trait]
impl HealthCheckable for PostgresBookingAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        check_pool(self.repository.pool(), "postgres-booking-adapter").await
    }
}

#[async_trait]
impl BookingPort for PostgresBookingAdapter {
    async fn begin(&self) -> Result<Box<dyn BookingUnit>, PortError> {
        let tx = self.repository.begin().await?;
        Ok(Box::new(PostgresBookingUnit { tx }))
    }

    #[instrument(skip(self), fields(booking_id = %id))]
    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, PortError> {
        debug!("Fetching booking");
        let row = self.repository.get(*id.as_uuid()).await?;
        Ok(row.map(row_to_booking))
    }

    #[instrument(skip(self), fields(booking_id = %booking_id))]
    async fn get_booking_details(&self, booking_id: BookingId) -> Result<Option<BookingDetails>, PortError> {
        let row = self.repository.get_details(*booking_id.as_uuid()).await?;
        Ok(row.map(row_to_details))
    }
}

struct PostgresBookingUnit {
    tx: BookingTx,
}

#[async_trait]
impl BookingUnit for PostgresBookingUnit {
    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>, PortError> {
        let row = self.tx.lock(*id.as_uuid()).await?;
        Ok(row.map(row_to_booking))
    }

    async fn aircraft_in_org(
        &mut self,
        organization_id: OrganizationId,
        aircraft_id: AircraftId,
    ) -> Result<bool, PortError> {
        Ok(self
            .tx
            .reference_in_org(ReferenceTable::Aircraft, *organization_id.as_uuid(), *aircraft_id.as_uuid())
            .await?)
    }

    async fn flight_type_in_org(
        &mut self,
        organization_id: OrganizationId,
        flight_type_id: FlightTypeId,
    ) -> Result<bool, PortError> {
        Ok(self
            .tx
            .reference_in_org(ReferenceTable::FlightTypes, *organization_id.as_uuid(), *flight_type_id.as_uuid())
            .await?)
    }

    async fn lesson_in_org(
        &mut self,
        organization_id: OrganizationId,
        lesson_id: LessonId,
    ) -> Result<bool, PortError> {
        Ok(self
            .tx
            .reference_in_org(ReferenceTable::Lessons, *organization_id.as_uuid(), *lesson_id.as_uuid())
            .await?)
    }

    async fn find_active_overlaps(&mut self, query: &OverlapQuery) -> Result<Vec<Booking>, PortError> {
        let rows = self
            .tx
            .active_overlaps(
                query.exclude.map(Into::into),
                *query.aircraft_id.as_uuid(),
                *query.user_id.as_uuid(),
                query.instructor_id.map(Into::into),
                query.period.start(),
                query.period.end(),
            )
            .await?;
        Ok(rows.into_iter().map(row_to_booking).collect())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
        Ok(self.tx.insert(&booking_to_row(booking)).await?)
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
        Ok(self.tx.update(&booking_to_row(booking)).await?)
    }

    async fn lock_details(&mut self, booking_id: BookingId) -> Result<Option<BookingDetails>, PortError> {
        let row = self.tx.lock_details(*booking_id.as_uuid()).await?;
        Ok(row.map(row_to_details))
    }

    async fn upsert_details(&mut self, details: &BookingDetails) -> Result<(), PortError> {
        Ok(self.tx.upsert_details(&details_to_row(details)).await?)
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), PortError> {
        Ok(self.tx.insert_audit(&audit_to_row(entry)).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        Ok(self.tx.commit().await?)
    }
}

fn row_to_booking(row: BookingRow) -> Booking {
    Booking {
        id: BookingId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        aircraft_id: AircraftId::from_uuid(row.aircraft_id),
        user_id: UserId::from_uuid(row.user_id),
        instructor_id: row.instructor_id.map(UserId::from_uuid),
        start_time: row.start_time,
        end_time: row.end_time,
        status: db_to_domain_status(row.status),
        purpose: row.purpose,
        remarks: row.remarks,
        flight_type_id: row.flight_type_id.map(FlightTypeId::from_uuid),
        lesson_id: row.lesson_id.map(LessonId::from_uuid),
        booking_type: row.booking_type.map(db_to_domain_booking_type),
        briefing_completed: row.briefing_completed,
        instructor_comment: row.instructor_comment,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn booking_to_row(booking: &Booking) -> BookingRow {
    BookingRow {
        id: *booking.id.as_uuid(),
        organization_id: *booking.organization_id.as_uuid(),
        aircraft_id: *booking.aircraft_id.as_uuid(),
        user_id: *booking.user_id.as_uuid(),
        instructor_id: booking.instructor_id.map(Into::into),
        start_time: booking.start_time,
        end_time: booking.end_time,
        status: domain_to_db_status(booking.status),
        purpose: booking.purpose.clone(),
        remarks: booking.remarks.clone(),
        flight_type_id: booking.flight_type_id.map(Into::into),
        lesson_id: booking.lesson_id.map(Into::into),
        booking_type: booking.booking_type.map(domain_to_db_booking_type),
        briefing_completed: booking.briefing_completed,
        instructor_comment: booking.instructor_comment.clone(),
        created_at: booking.created_at,
        updated_at: booking.updated_at,
    }
}

fn row_to_details(row: BookingDetailsRow) -> BookingDetails {
    BookingDetails {
        id: BookingDetailsId::from_uuid(row.id),
        booking_id: BookingId::from_uuid(row.booking_id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        eta: row.eta,
        passengers: row.passengers,
        route: row.route,
        equipment: row.equipment,
        remarks: row.remarks,
        authorization_completed: row.authorization_completed,
        override_conflict: row.override_conflict,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn details_to_row(details: &BookingDetails) -> BookingDetailsRow {
    BookingDetailsRow {
        id: *details.id.as_uuid(),
        booking_id: *details.booking_id.as_uuid(),
        organization_id: *details.organization_id.as_uuid(),
        eta: details.eta,
        passengers: details.passengers.clone(),
        route: details.route.clone(),
        equipment: details.equipment.clone(),
        remarks: details.remarks.clone(),
        authorization_completed: details.authorization_completed,
        override_conflict: details.override_conflict,
        created_at: details.created_at,
        updated_at: details.updated_at,
    }
}

pub(crate) fn audit_to_row(entry: &AuditEntry) -> AuditRow {
    AuditRow {
        id: *entry.id.as_uuid(),
        organization_id: *entry.organization_id.as_uuid(),
        table_name: entry.table_name.clone(),
        row_id: entry.row_id,
        action: match entry.action {
            AuditAction::Insert => DbAuditAction::Insert,
            AuditAction::Update => DbAuditAction::Update,
            AuditAction::Delete => DbAuditAction::Delete,
        },
        changed_by: entry.changed_by.map(Into::into),
        changed_at: entry.changed_at,
        column_changes: sqlx::types::Json(entry.column_changes.clone()),
    }
}

fn db_to_domain_status(status: DbBookingStatus) -> BookingStatus {
    match status {
        DbBookingStatus::Unconfirmed => BookingStatus::Unconfirmed,
        DbBookingStatus::Confirmed => BookingStatus::Confirmed,
        DbBookingStatus::Briefing => BookingStatus::Briefing,
        DbBookingStatus::Flying => BookingStatus::Flying,
        DbBookingStatus::Complete => BookingStatus::Complete,
        DbBookingStatus::Cancelled => BookingStatus::Cancelled,
    }
}

fn domain_to_db_status(status: BookingStatus) -> DbBookingStatus {
    match status {
        BookingStatus::Unconfirmed => DbBookingStatus::Unconfirmed,
        BookingStatus::Confirmed => DbBookingStatus::Confirmed,
        BookingStatus::Briefing => DbBookingStatus::Briefing,
        BookingStatus::Flying => DbBookingStatus::Flying,
        BookingStatus::Complete => DbBookingStatus::Complete,
        BookingStatus::Cancelled => DbBookingStatus::Cancelled,
    }
}

fn db_to_domain_booking_type(booking_type: DbBookingType) -> BookingType {
    match booking_type {
        DbBookingType::Flight => BookingType::Flight,
        DbBookingType::Groundwork => BookingType::Groundwork,
        DbBookingType::Maintenance => BookingType::Maintenance,
        DbBookingType::Other => BookingType::Other,
    }
}

fn domain_to_db_booking_type(booking_type: BookingType) -> DbBookingType {
    match booking_type {
        BookingType::Flight => DbBookingType::Flight,
        BookingType::Groundwork => DbBookingType::Groundwork,
        BookingType::Maintenance => DbBookingType::Maintenance,
        BookingType::Other => DbBookingType::Other,
    }
}
