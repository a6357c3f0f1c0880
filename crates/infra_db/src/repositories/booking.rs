//! Booking repository implementation
//!
//! Reads run straight against the pool. Writes go through a [`BookingTx`],
//! a SERIALIZABLE transaction in which booking rows are locked with
//! `SELECT ... FOR UPDATE`. The exclusion constraints on `bookings` back up
//! the overlap checks done inside the transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::repositories::audit::{insert_audit, AuditRow};

macro_rules! booking_columns {
    () => {
        "id, organization_id, aircraft_id, user_id, instructor_id, start_time, end_time, \
         status, purpose, remarks, flight_type_id, lesson_id, booking_type, \
         briefing_completed, instructor_comment, created_at, updated_at"
    };
}

macro_rules! details_columns {
    () => {
        "id, booking_id, organization_id, eta, passengers, route, equipment, remarks, \
         authorization_completed, override_conflict, created_at, updated_at"
    };
}

/// Repository for bookings and their operational details
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Retrieves a booking without locking it
    pub async fn get(&self, id: Uuid) -> Result<Option<BookingRow>, DatabaseError> {
        let row = sqlx::query_as::<_, BookingRow>(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Retrieves the details row of a booking
    pub async fn get_details(&self, booking_id: Uuid) -> Result<Option<BookingDetailsRow>, DatabaseError> {
        let row = sqlx::query_as::<_, BookingDetailsRow>(concat!(
            "SELECT ",
            details_columns!(),
            " FROM booking_details WHERE booking_id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Opens a serializable transaction for booking writes
    pub async fn begin(&self) -> Result<BookingTx, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(BookingTx { tx })
    }
}

/// Tables a booking references by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTable {
    Aircraft,
    FlightTypes,
    Lessons,
}

impl ReferenceTable {
    fn exists_query(&self) -> &'static str {
        match self {
            ReferenceTable::Aircraft => {
                "SELECT EXISTS (SELECT 1 FROM aircraft WHERE id = $1 AND organization_id = $2)"
            }
            ReferenceTable::FlightTypes => {
                "SELECT EXISTS (SELECT 1 FROM flight_types WHERE id = $1 AND organization_id = $2)"
            }
            ReferenceTable::Lessons => {
                "SELECT EXISTS (SELECT 1 FROM lessons WHERE id = $1 AND organization_id = $2)"
            }
        }
    }
}

/// An open booking transaction
///
/// Dropping it without [`BookingTx::commit`] rolls everything back.
pub struct BookingTx {
    tx: Transaction<'static, Postgres>,
}

impl BookingTx {
    /// Reads a booking and locks the row until the transaction ends
    pub async fn lock(&mut self, id: Uuid) -> Result<Option<BookingRow>, DatabaseError> {
        let row = sqlx::query_as::<_, BookingRow>(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row)
    }

    /// Checks that a referenced row belongs to the organization
    pub async fn reference_in_org(
        &mut self,
        table: ReferenceTable,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(table.exists_query())
            .bind(id)
            .bind(organization_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(exists)
    }

    /// Active bookings whose half-open period intersects `[start, end)` and
    /// that share the aircraft, the member or the instructor
    pub async fn active_overlaps(
        &mut self,
        exclude: Option<Uuid>,
        aircraft_id: Uuid,
        user_id: Uuid,
        instructor_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BookingRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, BookingRow>(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings \
              WHERE status IN ('confirmed', 'briefing', 'flying') \
                AND ($1::uuid IS NULL OR id <> $1) \
                AND tstzrange(start_time, end_time, '[)') && tstzrange($2, $3, '[)') \
                AND (aircraft_id = $4 \
                     OR user_id = $5 \
                     OR ($6::uuid IS NOT NULL AND instructor_id = $6)) \
              ORDER BY start_time"
        ))
        .bind(exclude)
        .bind(start)
        .bind(end)
        .bind(aircraft_id)
        .bind(user_id)
        .bind(instructor_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    pub async fn insert(&mut self, row: &BookingRow) -> Result<(), DatabaseError> {
        sqlx::query(concat!(
            "INSERT INTO bookings (",
            booking_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        ))
        .bind(row.id)
        .bind(row.organization_id)
        .bind(row.aircraft_id)
        .bind(row.user_id)
        .bind(row.instructor_id)
        .bind(row.start_time)
        .bind(row.end_time)
        .bind(row.status)
        .bind(&row.purpose)
        .bind(&row.remarks)
        .bind(row.flight_type_id)
        .bind(row.lesson_id)
        .bind(row.booking_type)
        .bind(row.briefing_completed)
        .bind(&row.instructor_comment)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    pub async fn update(&mut self, row: &BookingRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                aircraft_id = $2,
                instructor_id = $3,
                start_time = $4,
                end_time = $5,
                status = $6,
                purpose = $7,
                remarks = $8,
                flight_type_id = $9,
                lesson_id = $10,
                booking_type = $11,
                briefing_completed = $12,
                instructor_comment = $13,
                updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(row.aircraft_id)
        .bind(row.instructor_id)
        .bind(row.start_time)
        .bind(row.end_time)
        .bind(row.status)
        .bind(&row.purpose)
        .bind(&row.remarks)
        .bind(row.flight_type_id)
        .bind(row.lesson_id)
        .bind(row.booking_type)
        .bind(row.briefing_completed)
        .bind(&row.instructor_comment)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Booking", row.id));
        }
        Ok(())
    }

    /// Reads the details row of a booking and locks it
    pub async fn lock_details(&mut self, booking_id: Uuid) -> Result<Option<BookingDetailsRow>, DatabaseError> {
        let row = sqlx::query_as::<_, BookingDetailsRow>(concat!(
            "SELECT ",
            details_columns!(),
            " FROM booking_details WHERE booking_id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row)
    }

    /// Inserts the details row or overwrites the one keyed on its booking
    pub async fn upsert_details(&mut self, row: &BookingDetailsRow) -> Result<(), DatabaseError> {
        sqlx::query(concat!(
            "INSERT INTO booking_details (",
            details_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (booking_id) DO UPDATE SET \
                eta = EXCLUDED.eta, \
                passengers = EXCLUDED.passengers, \
                route = EXCLUDED.route, \
                equipment = EXCLUDED.equipment, \
                remarks = EXCLUDED.remarks, \
                authorization_completed = EXCLUDED.authorization_completed, \
                override_conflict = EXCLUDED.override_conflict, \
                updated_at = EXCLUDED.updated_at"
        ))
        .bind(row.id)
        .bind(row.booking_id)
        .bind(row.organization_id)
        .bind(row.eta)
        .bind(&row.passengers)
        .bind(&row.route)
        .bind(&row.equipment)
        .bind(&row.remarks)
        .bind(row.authorization_completed)
        .bind(row.override_conflict)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    pub async fn insert_audit(&mut self, row: &AuditRow) -> Result<(), DatabaseError> {
        insert_audit(&mut *self.tx, row).await
    }

    pub async fn commit(self) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Database row for a booking
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub aircraft_id: Uuid,
    pub user_id: Uuid,
    pub instructor_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: DbBookingStatus,
    pub purpose: String,
    pub remarks: Option<String>,
    pub flight_type_id: Option<Uuid>,
    pub lesson_id: Option<Uuid>,
    pub booking_type: Option<DbBookingType>,
    pub briefing_completed: bool,
    pub instructor_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for booking details
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingDetailsRow {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub organization_id: Uuid,
    pub eta: Option<DateTime<Utc>>,
    pub passengers: Option<String>,
    pub route: Option<String>,
    pub equipment: Option<serde_json::Value>,
    pub remarks: Option<String>,
    pub authorization_completed: bool,
    pub override_conflict: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database enum for booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
pub enum DbBookingStatus {
    Unconfirmed,
    Confirmed,
    Briefing,
    Flying,
    Complete,
    Cancelled,
}

/// Database enum for booking type
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "booking_type", rename_all = "snake_case")]
pub enum DbBookingType {
    Flight,
    Groundwork,
    Maintenance,
    Other,
}
