//! End-to-end workflows over the in-memory stores
//!
//! A lesson goes from booking to check-out to invoice to payment, with the
//! services wired the same way the API wires them.

use rust_decimal_macros::dec;

use core_kernel::ErrorKind;
use domain_billing::{InvoiceStatus, PaymentMethod, TransactionType};
use domain_booking::{BookingDetailsPatch, BookingPatch, BookingStatus, CheckOutRequest};
use test_utils::{
    assert_error_kind, assert_ledger_consistent, assert_money_eq, assert_no_active_overlaps,
    InMemorySchool, InvoiceRequestBuilder, NewBookingBuilder, PaymentRequestBuilder,
    TemporalFixtures,
};

mod lesson_lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_book_fly_invoice_and_pay() {
        let school = InMemorySchool::seed().await;
        let fx = &school.fixture;
        let staff = fx.admin_principal();

        let booking = school
            .bookings
            .create_booking(
                NewBookingBuilder::new(fx).instructor(fx.instructor).confirmed().build(),
                &staff,
            )
            .await
            .expect("booking created");
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let outcome = school
            .bookings
            .check_out(
                booking.id,
                CheckOutRequest {
                    booking: None,
                    booking_details: Some(BookingDetailsPatch {
                        route: Some(Some("NZAR - NZWP - NZAR".to_string())),
                        authorization_completed: Some(true),
                        ..Default::default()
                    }),
                },
                &fx.instructor_principal(),
            )
            .await
            .expect("checked out");
        assert_eq!(outcome.booking.status, BookingStatus::Flying);
        assert!(outcome.booking_details.authorization_completed);

        school
            .bookings
            .update_booking(
                booking.id,
                BookingPatch {
                    status: Some(BookingStatus::Complete),
                    ..Default::default()
                },
                &staff,
            )
            .await
            .expect("completed");

        let created = school
            .invoices
            .create_invoice(
                InvoiceRequestBuilder::new(fx).dual_flight().reference("Lesson 1").build(),
                &staff,
            )
            .await
            .expect("invoice created");
        assert_eq!(created.invoice.status, InvoiceStatus::Pending);
        assert_money_eq(created.invoice.total_amount, dec!(287.50));
        assert_eq!(created.transaction.transaction_type, TransactionType::Debit);
        assert_money_eq(created.transaction.amount, dec!(-287.50));

        let first = school
            .payments
            .record_payment(
                created.invoice.id,
                PaymentRequestBuilder::new(dec!(100.00)).reference("EFTPOS 1").build(),
                &staff,
            )
            .await
            .expect("first payment");
        assert_eq!(first.invoice.invoice.status, InvoiceStatus::Pending);
        assert_money_eq(first.invoice.invoice.balance_due, dec!(187.50));

        let second = school
            .payments
            .record_payment(
                created.invoice.id,
                PaymentRequestBuilder::new(dec!(187.50))
                    .method(PaymentMethod::BankTransfer)
                    .build(),
                &staff,
            )
            .await
            .expect("second payment");
        let view = second.invoice;
        assert_eq!(view.invoice.status, InvoiceStatus::Paid);
        assert!(view.invoice.paid_date.is_some());
        assert_eq!(view.payments.len(), 2);
        assert_ledger_consistent(&view);

        let history = school
            .audit_trail
            .history("bookings", *booking.id.as_uuid(), &staff)
            .await
            .expect("history");
        assert_eq!(history.len(), 3);
        assert_eq!(
            history[0].description,
            "Status changed from \"flying\" to \"complete\""
        );
    }

    #[tokio::test]
    async fn test_account_credit_settles_invoice() {
        let school = InMemorySchool::seed().await;
        let fx = &school.fixture;
        let staff = fx.admin_principal();
        school
            .billing_store
            .set_account_balance(fx.organization_id, fx.member, dec!(500.00))
            .await;

        let created = school
            .invoices
            .create_invoice(InvoiceRequestBuilder::new(fx).dual_flight().build(), &staff)
            .await
            .unwrap();
        let recorded = school
            .payments
            .record_payment(
                created.invoice.id,
                PaymentRequestBuilder::new(dec!(287.50))
                    .method(PaymentMethod::AccountCredit)
                    .build(),
                &staff,
            )
            .await
            .unwrap();

        assert_eq!(recorded.transaction.transaction_type, TransactionType::Credit);
        assert_eq!(recorded.invoice.invoice.status, InvoiceStatus::Paid);
        let balance = school
            .billing_store
            .account_balance(fx.organization_id, fx.member)
            .await
            .unwrap();
        assert_money_eq(balance.balance, dec!(212.50));
    }
}

mod invoicing {
    use super::*;
    use core_kernel::TaxRate;
    use test_utils::MoneyFixtures;

    #[tokio::test]
    async fn test_flight_and_briefing_on_one_invoice() {
        let school = InMemorySchool::seed().await;
        let fx = &school.fixture;
        let standard = TaxRate::new(MoneyFixtures::standard_tax_rate()).unwrap();

        let created = school
            .invoices
            .create_invoice(
                InvoiceRequestBuilder::new(fx)
                    .for_member(fx.second_member)
                    .dual_flight()
                    .taxed_item("Ground briefing", dec!(1), MoneyFixtures::briefing_rate(), standard)
                    .build(),
                &fx.admin_principal(),
            )
            .await
            .unwrap();

        let invoice = &created.invoice;
        assert_eq!(invoice.user_id, fx.second_member);
        assert_money_eq(invoice.subtotal, dec!(330.00));
        assert_money_eq(invoice.tax_amount, dec!(49.50));
        assert_money_eq(invoice.total_amount, dec!(379.50));
        assert_eq!(created.items.len(), 2);
    }
}

mod scheduling_conflicts {
    use super::*;

    #[tokio::test]
    async fn test_double_booking_is_refused_and_nothing_overlaps() {
        let school = InMemorySchool::seed().await;
        let fx = &school.fixture;
        let staff = fx.admin_principal();

        let first = school
            .bookings
            .create_booking(NewBookingBuilder::new(fx).confirmed().build(), &staff)
            .await
            .unwrap();

        let (start, end) = TemporalFixtures::slot(30, 1);
        let clash = school
            .bookings
            .create_booking(
                NewBookingBuilder::new(fx)
                    .member(fx.second_member)
                    .period(start, end)
                    .confirmed()
                    .build(),
                &staff,
            )
            .await;
        assert_error_kind(clash, ErrorKind::Conflict, |e| e.kind());

        let other_aircraft = school
            .bookings
            .create_booking(
                NewBookingBuilder::new(fx)
                    .member(fx.second_member)
                    .aircraft(fx.second_aircraft_id)
                    .period(start, end)
                    .confirmed()
                    .build(),
                &staff,
            )
            .await
            .unwrap();

        // back-to-back slot on the same aircraft
        let (next_start, next_end) = TemporalFixtures::slot(60, 1);
        let adjacent = school
            .bookings
            .create_booking(
                NewBookingBuilder::new(fx)
                    .period(next_start, next_end)
                    .confirmed()
                    .build(),
                &staff,
            )
            .await
            .unwrap();

        assert_no_active_overlaps(&[first, other_aircraft, adjacent]);
        assert_eq!(school.booking_store.booking_count().await, 3);
    }

    #[tokio::test]
    async fn test_cancelled_booking_frees_the_slot() {
        let school = InMemorySchool::seed().await;
        let fx = &school.fixture;
        let staff = fx.admin_principal();

        let first = school
            .bookings
            .create_booking(NewBookingBuilder::new(fx).confirmed().build(), &staff)
            .await
            .unwrap();
        school.bookings.cancel_booking(first.id, &staff).await.unwrap();

        let replacement = school
            .bookings
            .create_booking(
                NewBookingBuilder::new(fx).member(fx.second_member).confirmed().build(),
                &staff,
            )
            .await
            .unwrap();
        assert_eq!(replacement.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_members_cannot_manage_bookings() {
        let school = InMemorySchool::seed().await;
        let fx = &school.fixture;

        let result = school
            .bookings
            .create_booking(NewBookingBuilder::new(fx).build(), &fx.member_principal())
            .await;
        assert_error_kind(result, ErrorKind::Forbidden, |e| e.kind());
    }
}
