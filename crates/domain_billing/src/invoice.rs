//! Invoices and their line items
//!
//! Line item amounts are rounded per item and invoice totals are plain sums
//! of the rounded item values, so the totals invariants hold exactly.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    checked_money, ensure_money_scale, ChargeableId, InvoiceId, InvoiceItemId, OrganizationId,
    TaxRate, UserId, MAX_AMOUNT,
};
use rust_decimal_macros::dec;

use crate::error::BillingError;
use crate::payment::Payment;
use crate::transaction::Transaction;

/// Maximum length of item descriptions, references and notes
pub const MAX_TEXT_LEN: usize = 1000;

/// Largest item quantity the item table holds (`NUMERIC(10, 2)`)
pub const MAX_QUANTITY: Decimal = dec!(99999999.99);

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Being composed
    Draft,
    /// Issued and awaiting payment
    Pending,
    /// Fully paid
    Paid,
    /// Past due date with a balance
    Overdue,
    /// Voided
    Cancelled,
    /// Paid then refunded
    Refunded,
}

impl InvoiceStatus {
    /// Whether items and due date may still change
    pub fn is_editable(&self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Pending)
    }

    /// Whether payments may be recorded against the invoice
    pub fn accepts_payments(&self) -> bool {
        !matches!(
            self,
            InvoiceStatus::Paid | InvoiceStatus::Cancelled | InvoiceStatus::Refunded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "pending" => Ok(InvoiceStatus::Pending),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            "refunded" => Ok(InvoiceStatus::Refunded),
            other => Err(BillingError::invalid(format!("unknown invoice status '{}'", other))),
        }
    }
}

/// A billable catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chargeable {
    pub id: ChargeableId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub rate: Decimal,
}

/// A line item submitted with a new invoice
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceItem {
    pub chargeable_id: ChargeableId,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    /// Defaults to [`TaxRate::DEFAULT`]
    pub tax_rate: Option<TaxRate>,
}

impl NewInvoiceItem {
    pub fn validate(&self) -> Result<(), BillingError> {
        validate_line(&self.description, self.quantity, self.rate)
    }
}

/// An edit to an existing line item
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceItemEdit {
    pub id: InvoiceItemId,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub description: String,
}

impl InvoiceItemEdit {
    pub fn validate(&self) -> Result<(), BillingError> {
        validate_line(&self.description, self.quantity, self.rate)
    }
}

fn validate_line(description: &str, quantity: Decimal, rate: Decimal) -> Result<(), BillingError> {
    if description.chars().count() > MAX_TEXT_LEN {
        return Err(BillingError::invalid(format!(
            "description must be at most {} characters",
            MAX_TEXT_LEN
        )));
    }
    if quantity < Decimal::ONE {
        return Err(BillingError::invalid(format!("quantity must be at least 1 (got {})", quantity)));
    }
    if quantity > MAX_QUANTITY {
        return Err(BillingError::invalid(format!(
            "quantity must be at most {} (got {})",
            MAX_QUANTITY, quantity
        )));
    }
    if rate.is_sign_negative() && !rate.is_zero() {
        return Err(BillingError::invalid(format!("rate must not be negative (got {})", rate)));
    }
    if rate > MAX_AMOUNT {
        return Err(BillingError::invalid(format!(
            "rate must be at most {} (got {})",
            MAX_AMOUNT, rate
        )));
    }
    ensure_money_scale(quantity)?;
    ensure_money_scale(rate)?;
    Ok(())
}

/// A line item on an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub invoice_id: InvoiceId,
    pub chargeable_id: ChargeableId,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub tax_rate: TaxRate,
    /// `round(quantity × rate)`
    pub amount: Decimal,
    /// `round(amount × tax_rate)`
    pub tax_amount: Decimal,
    /// `amount + tax_amount`
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceItem {
    /// Creates a priced item for an invoice
    pub fn new(
        invoice_id: InvoiceId,
        input: &NewInvoiceItem,
        now: DateTime<Utc>,
    ) -> Result<Self, BillingError> {
        let mut item = Self {
            id: InvoiceItemId::new_v7(),
            invoice_id,
            chargeable_id: input.chargeable_id,
            description: input.description.clone(),
            quantity: input.quantity,
            rate: input.rate,
            tax_rate: input.tax_rate.unwrap_or_default(),
            amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        item.reprice()?;
        Ok(item)
    }

    /// Applies an edit, repricing at the invoice's tax rate
    ///
    /// The item is left untouched when the new price is out of range.
    pub fn edit(
        &mut self,
        edit: &InvoiceItemEdit,
        tax_rate: TaxRate,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        let mut edited = self.clone();
        edited.quantity = edit.quantity;
        edited.rate = edit.rate;
        edited.description = edit.description.clone();
        edited.tax_rate = tax_rate;
        edited.updated_at = now;
        edited.reprice()?;
        *self = edited;
        Ok(())
    }

    fn reprice(&mut self) -> Result<(), BillingError> {
        self.amount = checked_money(self.quantity.checked_mul(self.rate))?;
        self.tax_amount = self.tax_rate.tax_on(self.amount)?;
        self.total_amount = checked_money(self.amount.checked_add(self.tax_amount))?;
        Ok(())
    }
}

/// Invoice-level sums over line items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl InvoiceTotals {
    /// Recomputes totals from scratch
    pub fn from_items<'a>(
        items: impl IntoIterator<Item = &'a InvoiceItem>,
    ) -> Result<Self, BillingError> {
        let (mut subtotal, mut tax_amount) = (Decimal::ZERO, Decimal::ZERO);
        for item in items {
            subtotal = checked_money(subtotal.checked_add(item.amount))?;
            tax_amount = checked_money(tax_amount.checked_add(item.tax_amount))?;
        }
        Ok(Self {
            subtotal,
            tax_amount,
            total_amount: checked_money(subtotal.checked_add(tax_amount))?,
        })
    }
}

/// An invoice issued to a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub subtotal: Decimal,
    pub tax_rate: TaxRate,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    /// Cumulative payments
    pub paid: Decimal,
    pub balance_due: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<DateTime<Utc>>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates an empty draft invoice
    pub fn draft(
        organization_id: OrganizationId,
        user_id: UserId,
        invoice_number: String,
        tax_rate: TaxRate,
        due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvoiceId::new_v7(),
            organization_id,
            user_id,
            invoice_number,
            status: InvoiceStatus::Draft,
            subtotal: Decimal::ZERO,
            tax_rate,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            paid: Decimal::ZERO,
            balance_due: Decimal::ZERO,
            issue_date: now.date_naive(),
            due_date,
            paid_date: None,
            reference: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the reference and notes
    pub fn with_reference(mut self, reference: Option<String>, notes: Option<String>) -> Self {
        self.reference = reference;
        self.notes = notes;
        self
    }

    /// Stores recomputed totals and the balance derived from them
    pub fn apply_totals(&mut self, totals: InvoiceTotals, now: DateTime<Utc>) {
        self.subtotal = totals.subtotal;
        self.tax_amount = totals.tax_amount;
        self.total_amount = totals.total_amount;
        self.balance_due = (self.total_amount - self.paid).max(Decimal::ZERO);
        self.updated_at = now;
    }

    /// Issues a draft: pending, or paid outright when nothing is owed
    pub fn finalize(&mut self, now: DateTime<Utc>) {
        if self.balance_due.is_zero() {
            self.mark_paid(now);
        } else {
            self.status = InvoiceStatus::Pending;
        }
        self.updated_at = now;
    }

    /// Re-derives paid status after an edit
    ///
    /// Drafts keep their status; an issued invoice whose balance fell to zero
    /// becomes paid.
    pub fn reconcile(&mut self, now: DateTime<Utc>) {
        if self.status != InvoiceStatus::Draft && self.balance_due.is_zero() {
            self.mark_paid(now);
        }
    }

    /// Adds a payment and reconciles balance and status
    pub fn apply_payment(&mut self, amount: Decimal, now: DateTime<Utc>) -> Result<(), BillingError> {
        self.paid = checked_money(self.paid.checked_add(amount))?;
        self.balance_due = (self.total_amount - self.paid).max(Decimal::ZERO);
        if self.balance_due.is_zero() {
            self.mark_paid(now);
        } else if self.status == InvoiceStatus::Draft {
            self.status = InvoiceStatus::Pending;
        }
        self.updated_at = now;
        Ok(())
    }

    fn mark_paid(&mut self, now: DateTime<Utc>) {
        if self.status != InvoiceStatus::Paid {
            self.status = InvoiceStatus::Paid;
            self.paid_date = Some(now);
        }
    }

    /// Rejects edits outside draft and pending
    pub fn ensure_editable(&self) -> Result<(), BillingError> {
        if !self.status.is_editable() {
            return Err(BillingError::InvalidState {
                status: self.status,
                operation: "edit",
            });
        }
        Ok(())
    }

    /// Rejects payments on settled or voided invoices
    pub fn ensure_accepts_payments(&self) -> Result<(), BillingError> {
        if !self.status.accepts_payments() {
            return Err(BillingError::InvalidState {
                status: self.status,
                operation: "record a payment on",
            });
        }
        Ok(())
    }

    /// Whether the invoice is past due with a balance outstanding
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        matches!(self.status, InvoiceStatus::Pending | InvoiceStatus::Overdue)
            && self.balance_due > Decimal::ZERO
            && today > self.due_date
    }
}

/// An invoice with everything attached to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceView {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
    pub transactions: Vec<Transaction>,
}
