//! Billing Domain - Invoices, Payments and the Member Ledger
//!
//! This crate keeps a member's invoices, payments and ledger rows
//! consistent with each other.
//!
//! # Invariants
//!
//! - `subtotal = Σ item.amount`, `tax_amount = Σ item.tax_amount`,
//!   `total_amount = subtotal + tax_amount`
//! - `balance_due = max(total_amount − paid, 0)`
//! - an invoice that left draft is `paid` exactly when its balance is zero
//! - only draft and pending invoices can be edited
//! - every money-moving event appends an immutable [`Transaction`]
//!
//! Each service call runs in one [`BillingUnit`]; a failure at any step
//! leaves every table as it was.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{PaymentMethod, PaymentRequest, PaymentService};
//!
//! let service = PaymentService::new(billing, access);
//! let recorded = service
//!     .record_payment(invoice_id, PaymentRequest::new(dec!(100), PaymentMethod::Cash), &principal)
//!     .await?;
//! assert_eq!(recorded.invoice.invoice.balance_due, dec!(187.50));
//! ```

pub mod account;
pub mod transaction;
pub mod invoice;
pub mod payment;
pub mod ports;
pub mod services;
pub mod error;

pub use account::AccountBalance;
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use invoice::{
    Chargeable, Invoice, InvoiceItem, InvoiceItemEdit, InvoiceStatus, InvoiceTotals, InvoiceView,
    NewInvoiceItem,
};
pub use payment::{Payment, PaymentMethod, PaymentRequest};
pub use ports::{BillingPort, BillingUnit};
pub use services::{
    CreateInvoiceRequest, CreatedInvoice, EditInvoiceRequest, EditedInvoice, InvoiceService,
    PaymentService, RecordedPayment,
};
pub use error::BillingError;
