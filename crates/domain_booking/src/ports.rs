//! Storage ports for bookings
//!
//! Every mutation runs inside a [`BookingUnit`]: reads, conflict checks and
//! writes share one storage transaction, and nothing is visible to other
//! callers until [`BookingUnit::commit`]. Dropping a unit rolls it back.

use async_trait::async_trait;

use core_kernel::{
    AircraftId, AuditEntry, BookingId, DomainPort, FlightTypeId, LessonId, OrganizationId,
    PortError,
};

use crate::booking::Booking;
use crate::conflict::OverlapQuery;
use crate::details::BookingDetails;

/// Entry point to booking storage
#[async_trait]
pub trait BookingPort: DomainPort {
    /// Opens a unit of work
    async fn begin(&self) -> Result<Box<dyn BookingUnit>, PortError>;

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, PortError>;

    async fn get_booking_details(
        &self,
        booking_id: BookingId,
    ) -> Result<Option<BookingDetails>, PortError>;
}

/// One atomic set of booking reads and writes
#[async_trait]
pub trait BookingUnit: Send {
    /// Reads a booking and holds it against concurrent writers
    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>, PortError>;

    async fn aircraft_in_org(
        &mut self,
        organization_id: OrganizationId,
        aircraft_id: AircraftId,
    ) -> Result<bool, PortError>;

    async fn flight_type_in_org(
        &mut self,
        organization_id: OrganizationId,
        flight_type_id: FlightTypeId,
    ) -> Result<bool, PortError>;

    async fn lesson_in_org(
        &mut self,
        organization_id: OrganizationId,
        lesson_id: LessonId,
    ) -> Result<bool, PortError>;

    /// Active bookings that may compete with the query
    async fn find_active_overlaps(&mut self, query: &OverlapQuery) -> Result<Vec<Booking>, PortError>;

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), PortError>;

    async fn update_booking(&mut self, booking: &Booking) -> Result<(), PortError>;

    async fn lock_details(&mut self, booking_id: BookingId) -> Result<Option<BookingDetails>, PortError>;

    /// Inserts or replaces the details row keyed on booking id
    async fn upsert_details(&mut self, details: &BookingDetails) -> Result<(), PortError>;

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), PortError>;

    async fn commit(self: Box<Self>) -> Result<(), PortError>;
}

/// In-memory booking storage for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};
    use uuid::Uuid;

    use core_kernel::AuditLogPort;

    #[derive(Debug, Clone, Default)]
    struct BookingState {
        bookings: HashMap<BookingId, Booking>,
        details: HashMap<BookingId, BookingDetails>,
        aircraft: HashSet<(OrganizationId, AircraftId)>,
        flight_types: HashSet<(OrganizationId, FlightTypeId)>,
        lessons: HashSet<(OrganizationId, LessonId)>,
        audit: Vec<AuditEntry>,
    }

    /// Booking store backed by a mutex-guarded map
    ///
    /// A unit works on a copy of the state and writes it back on commit, so
    /// a failed unit leaves no trace.
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryBookingStore {
        state: Arc<Mutex<BookingState>>,
        fail_details_upsert: Arc<AtomicBool>,
    }

    impl InMemoryBookingStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn add_aircraft(&self, organization_id: OrganizationId, aircraft_id: AircraftId) {
            self.state.lock().await.aircraft.insert((organization_id, aircraft_id));
        }

        pub async fn add_flight_type(&self, organization_id: OrganizationId, flight_type_id: FlightTypeId) {
            self.state.lock().await.flight_types.insert((organization_id, flight_type_id));
        }

        pub async fn add_lesson(&self, organization_id: OrganizationId, lesson_id: LessonId) {
            self.state.lock().await.lessons.insert((organization_id, lesson_id));
        }

        /// Seeds a booking directly, bypassing the conflict guard
        pub async fn seed_booking(&self, booking: Booking) {
            self.state.lock().await.bookings.insert(booking.id, booking);
        }

        pub async fn audit_entries(&self) -> Vec<AuditEntry> {
            self.state.lock().await.audit.clone()
        }

        pub async fn booking_count(&self) -> usize {
            self.state.lock().await.bookings.len()
        }

        /// Makes the next details upsert fail
        pub fn fail_details_upsert(&self, fail: bool) {
            self.fail_details_upsert.store(fail, Ordering::SeqCst);
        }
    }

    impl DomainPort for InMemoryBookingStore {}

    #[async_trait]
    impl BookingPort for InMemoryBookingStore {
        async fn begin(&self) -> Result<Box<dyn BookingUnit>, PortError> {
            let guard = Arc::clone(&self.state).lock_owned().await;
            let working = guard.clone();
            Ok(Box::new(InMemoryBookingUnit {
                guard,
                working,
                fail_details_upsert: self.fail_details_upsert.load(Ordering::SeqCst),
            }))
        }

        async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, PortError> {
            Ok(self.state.lock().await.bookings.get(&id).cloned())
        }

        async fn get_booking_details(
            &self,
            booking_id: BookingId,
        ) -> Result<Option<BookingDetails>, PortError> {
            Ok(self.state.lock().await.details.get(&booking_id).cloned())
        }
    }

    #[async_trait]
    impl AuditLogPort for InMemoryBookingStore {
        async fn list_for_row(
            &self,
            table_name: &str,
            row_id: Uuid,
        ) -> Result<Vec<AuditEntry>, PortError> {
            let state = self.state.lock().await;
            let mut entries: Vec<AuditEntry> = state
                .audit
                .iter()
                .filter(|e| e.table_name == table_name && e.row_id == row_id)
                .cloned()
                .collect();
            entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at).then(b.id.cmp(&a.id)));
            Ok(entries)
        }
    }

    struct InMemoryBookingUnit {
        guard: OwnedMutexGuard<BookingState>,
        working: BookingState,
        fail_details_upsert: bool,
    }

    #[async_trait]
    impl BookingUnit for InMemoryBookingUnit {
        async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>, PortError> {
            Ok(self.working.bookings.get(&id).cloned())
        }

        async fn aircraft_in_org(
            &mut self,
            organization_id: OrganizationId,
            aircraft_id: AircraftId,
        ) -> Result<bool, PortError> {
            Ok(self.working.aircraft.contains(&(organization_id, aircraft_id)))
        }

        async fn flight_type_in_org(
            &mut self,
            organization_id: OrganizationId,
            flight_type_id: FlightTypeId,
        ) -> Result<bool, PortError> {
            Ok(self.working.flight_types.contains(&(organization_id, flight_type_id)))
        }

        async fn lesson_in_org(
            &mut self,
            organization_id: OrganizationId,
            lesson_id: LessonId,
        ) -> Result<bool, PortError> {
            Ok(self.working.lessons.contains(&(organization_id, lesson_id)))
        }

        async fn find_active_overlaps(&mut self, query: &OverlapQuery) -> Result<Vec<Booking>, PortError> {
            Ok(self
                .working
                .bookings
                .values()
                .filter(|other| query.conflict_with(other).is_some())
                .cloned()
                .collect())
        }

        async fn insert_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
            if self.working.bookings.contains_key(&booking.id) {
                return Err(PortError::conflict(format!("booking {} already exists", booking.id)));
            }
            self.working.bookings.insert(booking.id, booking.clone());
            Ok(())
        }

        async fn update_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
            match self.working.bookings.get_mut(&booking.id) {
                Some(row) => {
                    *row = booking.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("Booking", booking.id)),
            }
        }

        async fn lock_details(&mut self, booking_id: BookingId) -> Result<Option<BookingDetails>, PortError> {
            Ok(self.working.details.get(&booking_id).cloned())
        }

        async fn upsert_details(&mut self, details: &BookingDetails) -> Result<(), PortError> {
            if self.fail_details_upsert {
                return Err(PortError::internal("injected details upsert failure"));
            }
            self.working.details.insert(details.booking_id, details.clone());
            Ok(())
        }

        async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), PortError> {
            self.working.audit.push(entry.clone());
            Ok(())
        }

        async fn commit(self: Box<Self>) -> Result<(), PortError> {
            let InMemoryBookingUnit { mut guard, working, .. } = *self;
            *guard = working;
            Ok(())
        }
    }
}
