//! Tests for invoice arithmetic and payment reconciliation

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{ChargeableId, ErrorKind, InvoiceId, OrganizationId, TaxRate, UserId};

use domain_billing::{
    Invoice, InvoiceItem, InvoiceItemEdit, InvoiceStatus, InvoiceTotals, NewInvoiceItem,
    PaymentMethod, PaymentRequest,
};

fn new_item(quantity: Decimal, rate: Decimal, tax_rate: Option<TaxRate>) -> NewInvoiceItem {
    NewInvoiceItem {
        chargeable_id: ChargeableId::new(),
        description: "Aircraft hire".to_string(),
        quantity,
        rate,
        tax_rate,
    }
}

fn issued_invoice(items: &[InvoiceItem]) -> Invoice {
    let now = Utc::now();
    let mut invoice = Invoice::draft(
        OrganizationId::new(),
        UserId::new(),
        "INV-000042".to_string(),
        TaxRate::DEFAULT,
        NaiveDate::from_ymd_opt(2024, 7, 31).unwrap(),
        now,
    );
    invoice.apply_totals(InvoiceTotals::from_items(items).unwrap(), now);
    invoice.finalize(now);
    invoice
}

mod status_tests {
    use super::*;

    #[test]
    fn test_editable_statuses() {
        assert!(InvoiceStatus::Draft.is_editable());
        assert!(InvoiceStatus::Pending.is_editable());
        for status in [
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Cancelled,
            InvoiceStatus::Refunded,
        ] {
            assert!(!status.is_editable());
        }
    }

    #[test]
    fn test_payment_acceptance() {
        assert!(InvoiceStatus::Pending.accepts_payments());
        assert!(InvoiceStatus::Overdue.accepts_payments());
        assert!(InvoiceStatus::Draft.accepts_payments());
        assert!(!InvoiceStatus::Paid.accepts_payments());
        assert!(!InvoiceStatus::Cancelled.accepts_payments());
        assert!(!InvoiceStatus::Refunded.accepts_payments());
    }

    #[test]
    fn test_invalid_state_kind() {
        let mut invoice = issued_invoice(&[]);
        invoice.status = InvoiceStatus::Cancelled;
        let err = invoice.ensure_editable().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.to_string().contains("cancelled"));
    }
}

mod item_tests {
    use super::*;

    #[test]
    fn test_default_tax_rate() {
        let item = InvoiceItem::new(InvoiceId::new(), &new_item(dec!(1), dec!(80), None), Utc::now()).unwrap();
        assert_eq!(item.tax_rate, TaxRate::DEFAULT);
        assert_eq!(item.tax_amount, dec!(12.00));
    }

    #[test]
    fn test_explicit_zero_tax_rate() {
        let zero = TaxRate::new(Decimal::ZERO).unwrap();
        let item = InvoiceItem::new(InvoiceId::new(), &new_item(dec!(3), dec!(40), Some(zero)), Utc::now()).unwrap();
        assert_eq!(item.total_amount, dec!(120));
    }

    #[test]
    fn test_fractional_hours() {
        let item = InvoiceItem::new(InvoiceId::new(), &new_item(dec!(1.3), dec!(245), None), Utc::now()).unwrap();
        assert_eq!(item.amount, dec!(318.50));
        assert_eq!(item.tax_amount, dec!(47.78));
        assert_eq!(item.total_amount, dec!(366.28));
    }

    #[test]
    fn test_edit_takes_invoice_tax_rate() {
        let mut item = InvoiceItem::new(
            InvoiceId::new(),
            &new_item(dec!(1), dec!(100), Some(TaxRate::new(dec!(0.10)).unwrap())),
            Utc::now(),
        )
        .unwrap();
        item.edit(
            &InvoiceItemEdit {
                id: item.id,
                quantity: dec!(2),
                rate: dec!(100),
                description: "Aircraft hire (dual)".to_string(),
            },
            TaxRate::DEFAULT,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(item.amount, dec!(200));
        assert_eq!(item.tax_amount, dec!(30.00));
        assert_eq!(item.description, "Aircraft hire (dual)");
    }

    #[test]
    fn test_validation_rejects_bad_lines() {
        assert!(new_item(dec!(0), dec!(10), None).validate().is_err());
        assert!(new_item(dec!(1), dec!(-0.01), None).validate().is_err());
        assert!(new_item(dec!(1), dec!(0), None).validate().is_ok());
    }

    #[test]
    fn test_schema_ranges_are_enforced() {
        assert!(new_item(dec!(1.005), dec!(100), None).validate().is_err());
        assert!(new_item(dec!(100000000), dec!(100), None).validate().is_err());
        assert!(new_item(dec!(1), dec!(10000000000), None).validate().is_err());
        assert!(new_item(dec!(99999999.99), dec!(9999999999.99), None).validate().is_ok());
    }

    #[test]
    fn test_overflowing_line_is_invalid_input() {
        let huge = dec!(100000000000000000000);
        let err = InvoiceItem::new(InvoiceId::new(), &new_item(huge, huge, None), Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}

mod payment_tests {
    use super::*;

    #[test]
    fn test_payment_request_validation() {
        let mut request = PaymentRequest::new(dec!(50), PaymentMethod::Cash);
        request.notes = Some("n".repeat(1001));
        assert_eq!(request.validate().unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_paid_date_set_once() {
        let items = vec![InvoiceItem::new(InvoiceId::new(), &new_item(dec!(1), dec!(100), None), Utc::now()).unwrap()];
        let mut invoice = issued_invoice(&items);
        invoice.apply_payment(dec!(115), Utc::now()).unwrap();
        let paid_date = invoice.paid_date;
        assert!(paid_date.is_some());

        invoice.apply_payment(dec!(5), Utc::now()).unwrap();
        assert_eq!(invoice.paid_date, paid_date);
        assert_eq!(invoice.balance_due, Decimal::ZERO);
    }
}

fn money() -> impl Strategy<Value = Decimal> {
    (0i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn quantity() -> impl Strategy<Value = Decimal> {
    (10i64..100i64).prop_map(|tenths| Decimal::new(tenths, 1))
}

proptest! {
    #[test]
    fn prop_totals_invariants(lines in prop::collection::vec((quantity(), money()), 1..8)) {
        let invoice_id = InvoiceId::new();
        let items: Vec<InvoiceItem> = lines
            .iter()
            .map(|(q, r)| InvoiceItem::new(invoice_id, &new_item(*q, *r, None), Utc::now()).unwrap())
            .collect();
        let invoice = issued_invoice(&items);

        let sum_amount: Decimal = items.iter().map(|i| i.amount).sum();
        let sum_tax: Decimal = items.iter().map(|i| i.tax_amount).sum();
        let sum_total: Decimal = items.iter().map(|i| i.total_amount).sum();

        prop_assert_eq!(invoice.subtotal, sum_amount);
        prop_assert_eq!(invoice.tax_amount, sum_tax);
        prop_assert_eq!(invoice.total_amount, invoice.subtotal + invoice.tax_amount);
        prop_assert_eq!(invoice.total_amount, sum_total);
    }

    #[test]
    fn prop_balance_after_payments(
        lines in prop::collection::vec((quantity(), money()), 1..4),
        payments in prop::collection::vec((1i64..50_000i64).prop_map(|c| Decimal::new(c, 2)), 1..6),
    ) {
        let invoice_id = InvoiceId::new();
        let items: Vec<InvoiceItem> = lines
            .iter()
            .map(|(q, r)| InvoiceItem::new(invoice_id, &new_item(*q, *r, None), Utc::now()).unwrap())
            .collect();
        let mut invoice = issued_invoice(&items);
        prop_assume!(invoice.status == InvoiceStatus::Pending);

        let mut total_paid = Decimal::ZERO;
        for amount in payments {
            if !invoice.status.accepts_payments() {
                break;
            }
            invoice.apply_payment(amount, Utc::now()).unwrap();
            total_paid += amount;
        }

        prop_assert_eq!(invoice.paid, total_paid);
        prop_assert_eq!(invoice.balance_due, (invoice.total_amount - total_paid).max(Decimal::ZERO));
        prop_assert_eq!(invoice.status == InvoiceStatus::Paid, invoice.balance_due.is_zero());
    }
}
