//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random bookings and invoice
//! lines that respect the domain's validation rules.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{ChargeableId, TaxRate};
use domain_billing::NewInvoiceItem;
use domain_booking::BookingStatus;

/// Strategy for money amounts between 0.01 and 10 000.00
pub fn money_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for hourly rates including free items
pub fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for item quantities from 1.00 to 10.00 in tenths
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (10i64..=100i64).prop_map(|tenths| Decimal::new(tenths, 1))
}

/// Strategy for tax rates from 0% to 30%
pub fn tax_rate_strategy() -> impl Strategy<Value = TaxRate> {
    (0i64..=3000i64).prop_map(|basis| {
        TaxRate::new(Decimal::new(basis, 4)).expect("generated rate is non-negative")
    })
}

/// Strategy for invoice lines billed to the given chargeable
pub fn invoice_item_strategy(chargeable_id: ChargeableId) -> impl Strategy<Value = NewInvoiceItem> {
    (quantity_strategy(), rate_strategy(), proptest::option::of(tax_rate_strategy())).prop_map(
        move |(quantity, rate, tax_rate)| NewInvoiceItem {
            chargeable_id,
            description: "Generated line".to_string(),
            quantity,
            rate,
            tax_rate,
        },
    )
}

/// Strategy for booking periods on a quarter-hour grid in June 2024
pub fn booking_period_strategy() -> impl Strategy<Value = (DateTime<Utc>, DateTime<Utc>)> {
    (0i64..(30 * 96), 1i64..=16i64).prop_map(|(slot, quarters)| {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::minutes(slot * 15);
        (start, start + Duration::minutes(quarters * 15))
    })
}

/// Strategy for any booking status
pub fn booking_status_strategy() -> impl Strategy<Value = BookingStatus> {
    prop_oneof![
        Just(BookingStatus::Unconfirmed),
        Just(BookingStatus::Confirmed),
        Just(BookingStatus::Briefing),
        Just(BookingStatus::Flying),
        Just(BookingStatus::Complete),
        Just(BookingStatus::Cancelled),
    ]
}

/// Strategy for statuses a booking may be patched to
pub fn schedulable_status_strategy() -> impl Strategy<Value = BookingStatus> {
    proptest::sample::select(BookingStatus::SCHEDULABLE.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn periods_are_non_empty((start, end) in booking_period_strategy()) {
            prop_assert!(start < end);
        }

        #[test]
        fn generated_items_validate(item in invoice_item_strategy(ChargeableId::new())) {
            prop_assert!(item.validate().is_ok());
        }

        #[test]
        fn generated_payments_validate(amount in money_amount_strategy()) {
            let request = domain_billing::PaymentRequest::new(amount, domain_billing::PaymentMethod::Cash);
            prop_assert_eq!(request.validate().unwrap(), amount);
        }

        #[test]
        fn active_statuses_are_not_terminal(status in booking_status_strategy()) {
            prop_assert!(!(status.is_active() && status.is_terminal()));
        }

        #[test]
        fn schedulable_statuses_exclude_cancelled(status in schedulable_status_strategy()) {
            prop_assert_ne!(status, BookingStatus::Cancelled);
        }
    }
}
