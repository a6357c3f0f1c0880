//! Test Data Builders
//!
//! Builders for service inputs with sensible defaults taken from a
//! [`SchoolFixture`]. Tests set only the fields they care about.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{AircraftId, ChargeableId, TaxRate, UserId};
use domain_billing::{CreateInvoiceRequest, NewInvoiceItem, PaymentMethod, PaymentRequest};
use domain_booking::{BookingStatus, BookingType, NewBooking};

use crate::fixtures::{MoneyFixtures, SchoolFixture, TemporalFixtures};

/// Builder for [`NewBooking`]
pub struct NewBookingBuilder {
    input: NewBooking,
}

impl NewBookingBuilder {
    /// A one hour unconfirmed booking of the school's aircraft by its member
    pub fn new(school: &SchoolFixture) -> Self {
        Self {
            input: NewBooking {
                organization_id: school.organization_id,
                aircraft_id: school.aircraft_id,
                user_id: school.member,
                instructor_id: None,
                start_time: TemporalFixtures::morning_start(),
                end_time: TemporalFixtures::morning_end(),
                status: None,
                purpose: "Circuit training".to_string(),
                remarks: None,
                flight_type_id: None,
                lesson_id: None,
                booking_type: Some(BookingType::Flight),
            },
        }
    }

    pub fn aircraft(mut self, aircraft_id: AircraftId) -> Self {
        self.input.aircraft_id = aircraft_id;
        self
    }

    pub fn member(mut self, user_id: UserId) -> Self {
        self.input.user_id = user_id;
        self
    }

    pub fn instructor(mut self, instructor_id: UserId) -> Self {
        self.input.instructor_id = Some(instructor_id);
        self
    }

    pub fn period(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.input.start_time = start;
        self.input.end_time = end;
        self
    }

    pub fn status(mut self, status: BookingStatus) -> Self {
        self.input.status = Some(status);
        self
    }

    /// Shorthand for a confirmed booking
    pub fn confirmed(self) -> Self {
        self.status(BookingStatus::Confirmed)
    }

    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.input.purpose = purpose.into();
        self
    }

    pub fn build(self) -> NewBooking {
        self.input
    }
}

/// Builder for [`CreateInvoiceRequest`]
pub struct InvoiceRequestBuilder {
    request: CreateInvoiceRequest,
    chargeable_id: ChargeableId,
}

impl InvoiceRequestBuilder {
    /// An invoice for the school's member without items
    pub fn new(school: &SchoolFixture) -> Self {
        Self {
            request: CreateInvoiceRequest {
                organization_id: school.organization_id,
                user_id: school.member,
                due_date: TemporalFixtures::due_date(),
                reference: None,
                notes: None,
                items: Vec::new(),
            },
            chargeable_id: school.chargeable.id,
        }
    }

    pub fn for_member(mut self, user_id: UserId) -> Self {
        self.request.user_id = user_id;
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.request.due_date = due_date;
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.request.reference = Some(reference.into());
        self
    }

    /// Adds a line billed at the default tax rate
    pub fn item(mut self, description: impl Into<String>, quantity: Decimal, rate: Decimal) -> Self {
        self.request.items.push(NewInvoiceItem {
            chargeable_id: self.chargeable_id,
            description: description.into(),
            quantity,
            rate,
            tax_rate: None,
        });
        self
    }

    /// Adds a line with an explicit tax rate
    pub fn taxed_item(
        mut self,
        description: impl Into<String>,
        quantity: Decimal,
        rate: Decimal,
        tax_rate: TaxRate,
    ) -> Self {
        self.request.items.push(NewInvoiceItem {
            chargeable_id: self.chargeable_id,
            description: description.into(),
            quantity,
            rate,
            tax_rate: Some(tax_rate),
        });
        self
    }

    /// One hour of dual instruction: 250.00 + 15% tax = 287.50
    pub fn dual_flight(self) -> Self {
        self.item("Dual flight", dec!(1), MoneyFixtures::dual_rate())
    }

    pub fn build(self) -> CreateInvoiceRequest {
        self.request
    }
}

/// Builder for [`PaymentRequest`]
pub struct PaymentRequestBuilder {
    request: PaymentRequest,
}

impl PaymentRequestBuilder {
    /// A cash payment of `amount`
    pub fn new(amount: Decimal) -> Self {
        Self {
            request: PaymentRequest::new(amount, PaymentMethod::Cash),
        }
    }

    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.request.payment_method = method;
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.request.payment_reference = Some(reference.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.request.notes = Some(notes.into());
        self
    }

    pub fn paid_at(mut self, date: DateTime<Utc>) -> Self {
        self.request.date = Some(date);
        self
    }

    pub fn build(self) -> PaymentRequest {
        self.request
    }
}
