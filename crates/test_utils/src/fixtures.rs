//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for a small flight school: one
//! organization with staff, a member, an aircraft, syllabus references and a
//! chargeable. These fixtures are consistent and predictable for unit tests.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::access::mock::MockAccessPort;
use core_kernel::{
    AircraftId, ChargeableId, FlightTypeId, LessonId, OrganizationId, Principal, Role, UserId,
};
use domain_billing::ports::mock::InMemoryBillingStore;
use domain_billing::{Chargeable, InvoiceService, PaymentService};
use domain_booking::ports::mock::InMemoryBookingStore;
use domain_booking::{AuditTrailService, BookingService};

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Start of the standard morning slot (1 June 2024, 09:00 UTC)
    pub fn morning_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    /// End of the standard morning slot, one hour after the start
    pub fn morning_end() -> DateTime<Utc> {
        Self::morning_start() + Duration::hours(1)
    }

    /// A slot of `hours` starting `offset_minutes` after the morning start
    pub fn slot(offset_minutes: i64, hours: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Self::morning_start() + Duration::minutes(offset_minutes);
        (start, start + Duration::hours(hours))
    }

    /// Due date thirty days after the morning slot
    pub fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }
}

/// Fixture for money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Hourly rate of a dual training flight
    pub fn dual_rate() -> Decimal {
        dec!(250.00)
    }

    /// Hourly rate of a ground briefing
    pub fn briefing_rate() -> Decimal {
        dec!(80.00)
    }

    /// Standard tax rate as a fraction
    pub fn standard_tax_rate() -> Decimal {
        dec!(0.15)
    }
}

/// Identifiers of a seeded flight school
#[derive(Debug, Clone)]
pub struct SchoolFixture {
    pub organization_id: OrganizationId,
    pub owner: UserId,
    pub admin: UserId,
    pub instructor: UserId,
    pub member: UserId,
    pub second_member: UserId,
    pub aircraft_id: AircraftId,
    pub second_aircraft_id: AircraftId,
    pub flight_type_id: FlightTypeId,
    pub lesson_id: LessonId,
    pub chargeable: Chargeable,
}

impl SchoolFixture {
    /// Fresh identifiers with nothing persisted yet
    pub fn new() -> Self {
        let organization_id = OrganizationId::new();
        Self {
            organization_id,
            owner: UserId::new(),
            admin: UserId::new(),
            instructor: UserId::new(),
            member: UserId::new(),
            second_member: UserId::new(),
            aircraft_id: AircraftId::new(),
            second_aircraft_id: AircraftId::new(),
            flight_type_id: FlightTypeId::new(),
            lesson_id: LessonId::new(),
            chargeable: Chargeable {
                id: ChargeableId::new(),
                organization_id,
                name: "Dual flight".to_string(),
                rate: MoneyFixtures::dual_rate(),
            },
        }
    }

    pub fn admin_principal(&self) -> Principal {
        Principal::User(self.admin)
    }

    pub fn instructor_principal(&self) -> Principal {
        Principal::User(self.instructor)
    }

    pub fn member_principal(&self) -> Principal {
        Principal::User(self.member)
    }

    /// Members and their roles
    pub fn memberships(&self) -> [(UserId, Role); 5] {
        [
            (self.owner, Role::Owner),
            (self.admin, Role::Admin),
            (self.instructor, Role::Instructor),
            (self.member, Role::Member),
            (self.second_member, Role::Student),
        ]
    }
}

impl Default for SchoolFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory stores and services wired around a seeded school
pub struct InMemorySchool {
    pub fixture: SchoolFixture,
    pub access: MockAccessPort,
    pub booking_store: InMemoryBookingStore,
    pub billing_store: InMemoryBillingStore,
    pub bookings: BookingService,
    pub audit_trail: AuditTrailService,
    pub invoices: InvoiceService,
    pub payments: PaymentService,
}

impl InMemorySchool {
    /// Seeds a school into fresh in-memory stores
    pub async fn seed() -> Self {
        let fixture = SchoolFixture::new();
        let access = MockAccessPort::new();
        let booking_store = InMemoryBookingStore::new();
        let billing_store = InMemoryBillingStore::new();

        let org = fixture.organization_id;
        for (user, role) in fixture.memberships() {
            access.grant(org, user, role).await;
        }
        booking_store.add_aircraft(org, fixture.aircraft_id).await;
        booking_store.add_aircraft(org, fixture.second_aircraft_id).await;
        booking_store.add_flight_type(org, fixture.flight_type_id).await;
        booking_store.add_lesson(org, fixture.lesson_id).await;
        billing_store.add_chargeable(fixture.chargeable.clone()).await;

        let access_port = Arc::new(access.clone());
        Self {
            bookings: BookingService::new(Arc::new(booking_store.clone()), access_port.clone()),
            audit_trail: AuditTrailService::new(Arc::new(booking_store.clone()), access_port.clone()),
            invoices: InvoiceService::new(Arc::new(billing_store.clone()), access_port.clone()),
            payments: PaymentService::new(Arc::new(billing_store.clone()), access_port),
            fixture,
            access,
            booking_store,
            billing_store,
        }
    }
}
