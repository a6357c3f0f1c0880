//! Storage tests against a real PostgreSQL instance
//!
//! Each test starts its own container. They are ignored by default and run
//! with `cargo test -p test_utils -- --ignored` on a host with Docker.

use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{AccessPort, ErrorKind, Role};
use domain_billing::{BillingPort, InvoiceService, InvoiceStatus, PaymentService};
use domain_booking::{AuditTrailService, BookingPort, BookingService, BookingStatus};
use infra_db::{
    PostgresAccessAdapter, PostgresAuditLogAdapter, PostgresBillingAdapter, PostgresBookingAdapter,
};
use test_utils::{
    assert_error_kind, assert_ledger_consistent, assert_money_eq, db_test, InvoiceRequestBuilder,
    NewBookingBuilder, PaymentRequestBuilder, TemporalFixtures,
};

db_test!(test_membership_roles_resolve, |db| {
    let school = db.seed_school().await.unwrap();
    let access = PostgresAccessAdapter::new(db.pool().clone());

    let role = access.role_in(school.organization_id, school.instructor).await.unwrap();
    assert_eq!(role, Some(Role::Instructor));

    let outsider = access
        .role_in(school.organization_id, core_kernel::UserId::new())
        .await
        .unwrap();
    assert_eq!(outsider, None);
});

db_test!(test_overlapping_confirmed_bookings_conflict, |db| {
    let school = db.seed_school().await.unwrap();
    let pool = db.pool().clone();
    let bookings = BookingService::new(
        Arc::new(PostgresBookingAdapter::new(pool.clone())),
        Arc::new(PostgresAccessAdapter::new(pool.clone())),
    );
    let staff = school.admin_principal();

    let first = bookings
        .create_booking(NewBookingBuilder::new(&school).confirmed().build(), &staff)
        .await
        .unwrap();

    let (start, end) = TemporalFixtures::slot(15, 1);
    let clash = bookings
        .create_booking(
            NewBookingBuilder::new(&school)
                .member(school.second_member)
                .period(start, end)
                .confirmed()
                .build(),
            &staff,
        )
        .await;
    assert_error_kind(clash, ErrorKind::Conflict, |e| e.kind());

    let (adjacent_start, adjacent_end) = TemporalFixtures::slot(60, 1);
    let adjacent = bookings
        .create_booking(
            NewBookingBuilder::new(&school)
                .period(adjacent_start, adjacent_end)
                .confirmed()
                .build(),
            &staff,
        )
        .await
        .unwrap();
    assert_eq!(adjacent.status, BookingStatus::Confirmed);

    let stored = PostgresBookingAdapter::new(pool)
        .get_booking(first.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert_eq!(stored.start_time, first.start_time);
});

db_test!(test_audit_history_survives_round_trip, |db| {
    let school = db.seed_school().await.unwrap();
    let pool = db.pool().clone();
    let access = Arc::new(PostgresAccessAdapter::new(pool.clone()));
    let bookings = BookingService::new(Arc::new(PostgresBookingAdapter::new(pool.clone())), access.clone());
    let trail = AuditTrailService::new(Arc::new(PostgresAuditLogAdapter::new(pool)), access);
    let staff = school.admin_principal();

    let booking = bookings
        .create_booking(NewBookingBuilder::new(&school).build(), &staff)
        .await
        .unwrap();
    bookings.cancel_booking(booking.id, &staff).await.unwrap();

    let lines = trail
        .history("bookings", *booking.id.as_uuid(), &staff)
        .await
        .unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0].description,
        "Status changed from \"unconfirmed\" to \"cancelled\""
    );
});

db_test!(test_invoice_and_payments_commit_together, |db| {
    let school = db.seed_school().await.unwrap();
    let pool = db.pool().clone();
    let access = Arc::new(PostgresAccessAdapter::new(pool.clone()));
    let billing = Arc::new(PostgresBillingAdapter::new(pool));
    let invoices = InvoiceService::new(billing.clone(), access.clone());
    let payments = PaymentService::new(billing.clone(), access);
    let staff = school.admin_principal();

    let created = invoices
        .create_invoice(InvoiceRequestBuilder::new(&school).dual_flight().build(), &staff)
        .await
        .unwrap();
    assert_eq!(created.invoice_number, "INV-000001");
    assert_money_eq(created.invoice.total_amount, dec!(287.50));

    payments
        .record_payment(created.invoice.id, PaymentRequestBuilder::new(dec!(100.00)).build(), &staff)
        .await
        .unwrap();
    payments
        .record_payment(created.invoice.id, PaymentRequestBuilder::new(dec!(187.50)).build(), &staff)
        .await
        .unwrap();

    let view = billing
        .get_invoice_view(created.invoice.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.invoice.status, InvoiceStatus::Paid);
    assert_eq!(view.transactions.len(), 3);
    assert_ledger_consistent(&view);

    let second = invoices
        .create_invoice(InvoiceRequestBuilder::new(&school).dual_flight().build(), &staff)
        .await
        .unwrap();
    assert_eq!(second.invoice_number, "INV-000002");
});

db_test!(test_clear_data_allows_reseeding, |db| {
    let first = db.seed_school().await.unwrap();
    db.clear_data().await.unwrap();

    let access = PostgresAccessAdapter::new(db.pool().clone());
    let gone = access.role_in(first.organization_id, first.admin).await.unwrap();
    assert_eq!(gone, None);

    let second = db.seed_school().await.unwrap();
    let role = access.role_in(second.organization_id, second.admin).await.unwrap();
    assert_eq!(role, Some(Role::Admin));
});
