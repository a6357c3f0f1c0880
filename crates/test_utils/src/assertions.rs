//! Custom Test Assertions
//!
//! Assertion helpers for bookings and the billing ledger that give more
//! meaningful failure messages than a bare `assert_eq!`.

use rust_decimal::Decimal;

use core_kernel::{round_money, ErrorKind};
use domain_billing::{Invoice, InvoiceView, TransactionType};
use domain_booking::Booking;

/// Asserts two money amounts are equal at cent precision
pub fn assert_money_eq(actual: Decimal, expected: Decimal) {
    assert_eq!(
        round_money(actual),
        round_money(expected),
        "Money mismatch: actual={}, expected={}",
        actual,
        expected
    );
}

/// Asserts the stored totals of an invoice agree with each other
///
/// # Panics
///
/// Panics if `total != subtotal + tax` or `balance_due != total - paid`
pub fn assert_invoice_balanced(invoice: &Invoice) {
    assert_eq!(
        invoice.total_amount,
        invoice.subtotal + invoice.tax_amount,
        "Invoice {} total {} != subtotal {} + tax {}",
        invoice.invoice_number,
        invoice.total_amount,
        invoice.subtotal,
        invoice.tax_amount
    );
    assert_eq!(
        invoice.balance_due,
        invoice.total_amount - invoice.paid,
        "Invoice {} balance {} != total {} - paid {}",
        invoice.invoice_number,
        invoice.balance_due,
        invoice.total_amount,
        invoice.paid
    );
}

/// Asserts an invoice view is internally consistent
///
/// Items sum to the invoice totals, payments sum to `paid`, and every
/// payment has its ledger transaction.
pub fn assert_ledger_consistent(view: &InvoiceView) {
    let invoice = &view.invoice;
    assert_invoice_balanced(invoice);

    let subtotal: Decimal = view.items.iter().map(|i| i.amount).sum();
    let tax: Decimal = view.items.iter().map(|i| i.tax_amount).sum();
    assert_money_eq(invoice.subtotal, subtotal);
    assert_money_eq(invoice.tax_amount, tax);

    let paid: Decimal = view.payments.iter().map(|p| p.amount).sum();
    assert_money_eq(invoice.paid, paid);

    for payment in &view.payments {
        let transaction = view
            .transactions
            .iter()
            .find(|t| t.id == payment.transaction_id)
            .unwrap_or_else(|| panic!("Payment {} has no ledger transaction", payment.id));
        assert!(
            matches!(
                transaction.transaction_type,
                TransactionType::Payment | TransactionType::Credit
            ),
            "Payment {} linked to a {} transaction",
            payment.id,
            transaction.transaction_type
        );
        assert_money_eq(transaction.amount, payment.amount);
    }
}

/// Asserts that no two active bookings share a resource in overlapping periods
pub fn assert_no_active_overlaps(bookings: &[Booking]) {
    let active: Vec<&Booking> = bookings.iter().filter(|b| b.status.is_active()).collect();
    for (i, a) in active.iter().enumerate() {
        for b in active.iter().skip(i + 1) {
            let overlapping = a.start_time < b.end_time && b.start_time < a.end_time;
            if !overlapping {
                continue;
            }
            let shares_instructor = a.instructor_id.is_some() && a.instructor_id == b.instructor_id;
            assert!(
                a.aircraft_id != b.aircraft_id && a.user_id != b.user_id && !shares_instructor,
                "Active bookings {} and {} overlap on a shared resource",
                a.id,
                b.id
            );
        }
    }
}

/// Asserts a result failed with the given error kind
pub fn assert_error_kind<T: std::fmt::Debug, E>(result: Result<T, E>, expected: ErrorKind, kind: impl Fn(&E) -> ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {} error, got Ok({:?})", expected.as_str(), value),
        Err(e) => assert_eq!(kind(&e), expected, "Unexpected error kind"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_eq_ignores_trailing_scale() {
        assert_money_eq(dec!(287.5), dec!(287.50));
    }

    #[test]
    #[should_panic(expected = "Money mismatch")]
    fn test_money_eq_detects_difference() {
        assert_money_eq(dec!(287.50), dec!(287.49));
    }
}
