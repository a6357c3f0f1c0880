//! Billing domain services
//!
//! [`InvoiceService`] composes and edits invoices; [`PaymentService`]
//! records payments and reconciles the invoice. Each call is one
//! [`BillingUnit`](crate::ports::BillingUnit).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{
    authorize, resolve_actor, AccessPort, Capability, InvoiceId, OrganizationId, PaymentId,
    Principal, TaxRate, UserId,
};

use crate::error::BillingError;
use crate::invoice::{
    Invoice, InvoiceItem, InvoiceItemEdit, InvoiceTotals, InvoiceView, NewInvoiceItem, MAX_TEXT_LEN,
};
use crate::payment::{Payment, PaymentMethod, PaymentRequest};
use crate::ports::BillingPort;
use crate::transaction::{Transaction, TransactionType};

/// Input for composing an invoice
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInvoiceRequest {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub due_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewInvoiceItem>,
}

impl CreateInvoiceRequest {
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.items.is_empty() {
            return Err(BillingError::invalid("an invoice needs at least one item"));
        }
        for item in &self.items {
            item.validate()?;
        }
        for (field, value) in [("reference", &self.reference), ("notes", &self.notes)] {
            if value.as_ref().is_some_and(|v| v.chars().count() > MAX_TEXT_LEN) {
                return Err(BillingError::invalid(format!(
                    "{} must be at most {} characters",
                    field, MAX_TEXT_LEN
                )));
            }
        }
        Ok(())
    }
}

/// Input for editing an invoice
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditInvoiceRequest {
    pub due_date: Option<NaiveDate>,
    pub items: Option<Vec<InvoiceItemEdit>>,
}

impl EditInvoiceRequest {
    pub fn validate(&self) -> Result<(), BillingError> {
        for edit in self.items.iter().flatten() {
            edit.validate()?;
        }
        Ok(())
    }
}

/// Result of composing an invoice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedInvoice {
    pub invoice: Invoice,
    pub invoice_number: String,
    pub items: Vec<InvoiceItem>,
    pub transaction: Transaction,
}

/// Result of editing an invoice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditedInvoice {
    pub invoice: Invoice,
    /// Compensating ledger row when the total moved
    pub transaction: Option<Transaction>,
}

/// Result of recording a payment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedPayment {
    pub invoice: InvoiceView,
    pub payment: Payment,
    pub transaction: Transaction,
}

/// Service for invoice composition
pub struct InvoiceService {
    billing: Arc<dyn BillingPort>,
    access: Arc<dyn AccessPort>,
}

impl InvoiceService {
    pub fn new(billing: Arc<dyn BillingPort>, access: Arc<dyn AccessPort>) -> Self {
        Self { billing, access }
    }

    /// Composes, prices and issues an invoice
    ///
    /// The invoice, its items, the move out of draft and the member's debit
    /// row are committed together.
    #[instrument(skip(self, request, principal), fields(organization_id = %request.organization_id))]
    pub async fn create_invoice(
        &self,
        request: CreateInvoiceRequest,
        principal: &Principal,
    ) -> Result<CreatedInvoice, BillingError> {
        principal.user_id().ok_or(BillingError::Unauthorized)?;
        request.validate()?;

        let organization_id = request.organization_id;
        authorize(self.access.as_ref(), principal, organization_id, Capability::ManageInvoices).await?;
        if self.access.role_in(organization_id, request.user_id).await?.is_none() {
            return Err(BillingError::not_found("Member", request.user_id));
        }

        let mut unit = self.billing.begin().await?;
        for item in &request.items {
            if !unit.chargeable_in_org(organization_id, item.chargeable_id).await? {
                return Err(BillingError::not_found("Chargeable", item.chargeable_id));
            }
        }

        let invoice_number = unit
            .next_invoice_number(organization_id)
            .await
            .map_err(BillingError::Dependency)?;

        let now = Utc::now();
        let tax_rate = request
            .items
            .first()
            .and_then(|item| item.tax_rate)
            .unwrap_or(TaxRate::DEFAULT);
        let mut invoice = Invoice::draft(
            organization_id,
            request.user_id,
            invoice_number.clone(),
            tax_rate,
            request.due_date,
            now,
        )
        .with_reference(request.reference, request.notes);
        let items: Vec<InvoiceItem> = request
            .items
            .iter()
            .map(|item| InvoiceItem::new(invoice.id, item, now))
            .collect::<Result<_, BillingError>>()?;
        invoice.apply_totals(InvoiceTotals::from_items(&items)?, now);

        unit.insert_invoice(&invoice).await?;
        unit.insert_items(&items).await?;

        invoice.finalize(now);
        unit.update_invoice(&invoice).await?;

        let transaction = Transaction::completed(
            organization_id,
            invoice.user_id,
            invoice.id,
            TransactionType::Debit,
            -invoice.total_amount,
            format!("Invoice {}", invoice.invoice_number),
            now,
        )
        .with_reference(Some(invoice.invoice_number.clone()));
        unit.insert_transaction(&transaction).await?;

        unit.commit().await?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total_amount,
            status = %invoice.status,
            "Invoice created"
        );
        Ok(CreatedInvoice {
            invoice,
            invoice_number,
            items,
            transaction,
        })
    }

    /// Edits due date and items of a draft or pending invoice
    ///
    /// Totals are recomputed over every item of the invoice. A change of the
    /// total appends a compensating transaction for the difference.
    #[instrument(skip(self, request, principal), fields(invoice_id = %invoice_id))]
    pub async fn edit_invoice(
        &self,
        invoice_id: InvoiceId,
        request: EditInvoiceRequest,
        principal: &Principal,
    ) -> Result<EditedInvoice, BillingError> {
        principal.user_id().ok_or(BillingError::Unauthorized)?;
        request.validate()?;

        let mut unit = self.billing.begin().await?;
        let mut invoice = unit
            .lock_invoice(invoice_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Invoice", invoice_id))?;
        authorize(
            self.access.as_ref(),
            principal,
            invoice.organization_id,
            Capability::ManageInvoices,
        )
        .await?;

        if let Err(error) = invoice.ensure_editable() {
            warn!(invoice_id = %invoice_id, status = %invoice.status, "Invoice edit refused");
            return Err(error);
        }

        let now = Utc::now();
        let previous_total = invoice.total_amount;

        if let Some(edits) = &request.items {
            let mut items = unit.invoice_items(invoice_id).await?;
            for edit in edits {
                let item = items
                    .iter_mut()
                    .find(|item| item.id == edit.id)
                    .ok_or_else(|| BillingError::not_found("Invoice item", edit.id))?;
                item.edit(edit, invoice.tax_rate, now)?;
                unit.update_item(item).await?;
            }
            invoice.apply_totals(InvoiceTotals::from_items(&items)?, now);
            invoice.reconcile(now);
        }
        if let Some(due_date) = request.due_date {
            invoice.due_date = due_date;
        }
        invoice.updated_at = now;
        unit.update_invoice(&invoice).await?;

        let delta = invoice.total_amount - previous_total;
        let transaction = if delta.is_zero() {
            None
        } else {
            let transaction_type = if delta > Decimal::ZERO {
                TransactionType::Credit
            } else {
                TransactionType::Debit
            };
            let transaction = Transaction::completed(
                invoice.organization_id,
                invoice.user_id,
                invoice.id,
                transaction_type,
                delta.abs(),
                format!("Adjustment for invoice {}", invoice.invoice_number),
                now,
            )
            .with_reference(Some(invoice.invoice_number.clone()))
            .with_metadata(json!({
                "invoice_id": invoice.id,
                "previous_total": previous_total,
                "new_total": invoice.total_amount,
            }));
            unit.insert_transaction(&transaction).await?;
            Some(transaction)
        };

        unit.commit().await?;

        info!(
            invoice_id = %invoice.id,
            total = %invoice.total_amount,
            delta = %delta,
            "Invoice edited"
        );
        Ok(EditedInvoice {
            invoice,
            transaction,
        })
    }

    /// Reads the expanded invoice
    ///
    /// Staff of the organization and the invoiced member may read.
    #[instrument(skip(self, principal), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        invoice_id: InvoiceId,
        principal: &Principal,
    ) -> Result<InvoiceView, BillingError> {
        principal.user_id().ok_or(BillingError::Unauthorized)?;

        let view = self
            .billing
            .get_invoice_view(invoice_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Invoice", invoice_id))?;

        let actor = resolve_actor(self.access.as_ref(), principal, view.invoice.organization_id).await?;
        if !actor.can(Capability::ManageInvoices) && actor.user_id != view.invoice.user_id {
            return Err(BillingError::Forbidden(format!(
                "role {} may only read its own invoices",
                actor.role
            )));
        }
        Ok(view)
    }
}

/// Service for recording payments
pub struct PaymentService {
    billing: Arc<dyn BillingPort>,
    access: Arc<dyn AccessPort>,
}

impl PaymentService {
    pub fn new(billing: Arc<dyn BillingPort>, access: Arc<dyn AccessPort>) -> Self {
        Self { billing, access }
    }

    /// Records a payment and reconciles the invoice
    ///
    /// Account credit debit, ledger row, payment row and invoice update are
    /// committed together; any failure leaves all of them untouched.
    #[instrument(skip(self, request, principal), fields(invoice_id = %invoice_id, method = %request.payment_method))]
    pub async fn record_payment(
        &self,
        invoice_id: InvoiceId,
        request: PaymentRequest,
        principal: &Principal,
    ) -> Result<RecordedPayment, BillingError> {
        principal.user_id().ok_or(BillingError::Unauthorized)?;
        let amount = request.validate()?;

        let mut unit = self.billing.begin().await?;
        let mut invoice = unit
            .lock_invoice(invoice_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Invoice", invoice_id))?;
        authorize(
            self.access.as_ref(),
            principal,
            invoice.organization_id,
            Capability::RecordPayments,
        )
        .await?;

        if let Err(error) = invoice.ensure_accepts_payments() {
            warn!(invoice_id = %invoice_id, status = %invoice.status, "Payment refused");
            return Err(error);
        }

        let now = Utc::now();
        let paid_at = request.date.unwrap_or(now);
        let transaction = payment_transaction(&invoice, &request, amount, paid_at, now);

        let debited_balance = if request.payment_method == PaymentMethod::AccountCredit {
            let mut balance = unit
                .lock_account_balance(invoice.organization_id, invoice.user_id)
                .await?
                .ok_or(BillingError::InsufficientCredit {
                    available: Decimal::ZERO,
                    requested: amount,
                })?;
            if let Err(error) = balance.debit(amount, transaction.id, now) {
                warn!(invoice_id = %invoice_id, error = %error, "Account credit refused");
                return Err(error);
            }
            Some(balance)
        } else {
            None
        };

        unit.insert_transaction(&transaction).await?;
        if let Some(balance) = &debited_balance {
            unit.update_account_balance(balance).await?;
        }

        let payment = Payment {
            id: PaymentId::new_v7(),
            organization_id: invoice.organization_id,
            invoice_id: invoice.id,
            transaction_id: transaction.id,
            amount,
            payment_method: request.payment_method,
            payment_reference: request.payment_reference.clone(),
            notes: request.notes.clone(),
            paid_at,
            created_at: now,
        };
        unit.insert_payment(&payment).await?;

        invoice.apply_payment(amount, now)?;
        unit.update_invoice(&invoice).await?;

        let view = unit
            .invoice_view(invoice.id)
            .await?
            .ok_or_else(|| BillingError::not_found("Invoice", invoice.id))?;
        unit.commit().await?;

        info!(
            invoice_id = %invoice.id,
            payment_id = %payment.id,
            amount = %amount,
            balance_due = %invoice.balance_due,
            status = %invoice.status,
            "Payment recorded"
        );
        Ok(RecordedPayment {
            invoice: view,
            payment,
            transaction,
        })
    }
}

fn payment_transaction(
    invoice: &Invoice,
    request: &PaymentRequest,
    amount: Decimal,
    paid_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Transaction {
    let transaction_type = match request.payment_method {
        PaymentMethod::AccountCredit => TransactionType::Credit,
        _ => TransactionType::Payment,
    };
    Transaction::completed(
        invoice.organization_id,
        invoice.user_id,
        invoice.id,
        transaction_type,
        amount,
        format!("Payment for invoice {}", invoice.invoice_number),
        now,
    )
    .with_reference(request.payment_reference.clone())
    .with_metadata(json!({
        "invoice_id": invoice.id,
        "payment_method": request.payment_method,
        "payment_reference": request.payment_reference,
        "notes": request.notes,
        "date": paid_at,
    }))
}
