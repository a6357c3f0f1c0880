//! PostgreSQL Billing Adapter
//!
//! Implements [`BillingPort`] on top of [`BillingRepository`]. Invoice and
//! account balance reads inside a unit take row locks, and invoice numbers
//! come from a per-organization counter row incremented in the same
//! transaction.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    AccountBalanceId, ChargeableId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId,
    InvoiceItemId, OrganizationId, PaymentId, PortError, TaxRate, TransactionId, UserId,
};
use domain_billing::{
    AccountBalance, BillingPort, BillingUnit, Invoice, InvoiceItem, InvoiceStatus, InvoiceView,
    Payment, PaymentMethod, Transaction, TransactionStatus, TransactionType,
};

use crate::adapters::check_pool;
use crate::repositories::billing::{
    AccountBalanceRow, BillingRepository, BillingTx, DbInvoiceStatus, DbPaymentMethod,
    DbTransactionStatus, DbTransactionType, InvoiceItemRow, InvoiceRow, InvoiceWithChildren,
    PaymentRow, TransactionRow,
};

/// PostgreSQL implementation of the billing port
#[derive(Debug, Clone)]
pub struct PostgresBillingAdapter {
    repository: BillingRepository,
}

impl PostgresBillingAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: BillingRepository::new(pool),
        }
    }

    pub fn repository(&self) -> &BillingRepository {
        &self.repository
    }
}

impl DomainPort for PostgresBillingAdapter {}

#[async_trait]
impl HealthCheckable for PostgresBillingAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        check_pool(self.repository.pool(), "postgres-billing-adapter").await
    }
}

#[async_trait]
impl BillingPort for PostgresBillingAdapter {
    async fn begin(&self) -> Result<Box<dyn BillingUnit>, PortError> {
        let tx = self.repository.begin().await?;
        Ok(Box::new(PostgresBillingUnit { tx }))
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn get_invoice_view(&self, id: InvoiceId) -> Result<Option<InvoiceView>, PortError> {
        debug!("Fetching invoice view");
        self.repository
            .get_invoice_with_children(*id.as_uuid())
            .await?
            .map(rows_to_view)
            .transpose()
    }
}

struct PostgresBillingUnit {
    tx: BillingTx,
}

#[async_trait]
impl BillingUnit for PostgresBillingUnit {
    async fn next_invoice_number(&mut self, organization_id: OrganizationId) -> Result<String, PortError> {
        let value = self.tx.next_invoice_sequence(*organization_id.as_uuid()).await?;
        Ok(format!("INV-{:06}", value))
    }

    async fn chargeable_in_org(
        &mut self,
        organization_id: OrganizationId,
        chargeable_id: ChargeableId,
    ) -> Result<bool, PortError> {
        Ok(self
            .tx
            .chargeable_in_org(*organization_id.as_uuid(), *chargeable_id.as_uuid())
            .await?)
    }

    async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        self.tx.lock_invoice(*id.as_uuid()).await?.map(row_to_invoice).transpose()
    }

    async fn invoice_items(&mut self, invoice_id: InvoiceId) -> Result<Vec<InvoiceItem>, PortError> {
        self.tx
            .items(*invoice_id.as_uuid())
            .await?
            .into_iter()
            .map(row_to_item)
            .collect()
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        Ok(self.tx.insert_invoice(&invoice_to_row(invoice)).await?)
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        Ok(self.tx.update_invoice(&invoice_to_row(invoice)).await?)
    }

    async fn insert_items(&mut self, items: &[InvoiceItem]) -> Result<(), PortError> {
        for item in items {
            self.tx.insert_item(&item_to_row(item)).await?;
        }
        Ok(())
    }

    async fn update_item(&mut self, item: &InvoiceItem) -> Result<(), PortError> {
        Ok(self.tx.update_item(&item_to_row(item)).await?)
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), PortError> {
        Ok(self.tx.insert_transaction(&transaction_to_row(transaction)).await?)
    }

    async fn lock_account_balance(
        &mut self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<AccountBalance>, PortError> {
        let row = self
            .tx
            .lock_account_balance(*organization_id.as_uuid(), *user_id.as_uuid())
            .await?;
        Ok(row.map(row_to_account_balance))
    }

    async fn update_account_balance(&mut self, balance: &AccountBalance) -> Result<(), PortError> {
        Ok(self
            .tx
            .upsert_account_balance(&account_balance_to_row(balance))
            .await?)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        Ok(self.tx.insert_payment(&payment_to_row(payment)).await?)
    }

    async fn invoice_view(&mut self, id: InvoiceId) -> Result<Option<InvoiceView>, PortError> {
        self.tx
            .invoice_with_children(*id.as_uuid())
            .await?
            .map(rows_to_view)
            .transpose()
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        Ok(self.tx.commit().await?)
    }
}

fn tax_rate(value: rust_decimal::Decimal) -> Result<TaxRate, PortError> {
    TaxRate::new(value).map_err(|e| PortError::internal(format!("stored tax rate: {}", e)))
}

fn rows_to_view(rows: InvoiceWithChildren) -> Result<InvoiceView, PortError> {
    Ok(InvoiceView {
        invoice: row_to_invoice(rows.invoice)?,
        items: rows.items.into_iter().map(row_to_item).collect::<Result<_, _>>()?,
        payments: rows.payments.into_iter().map(row_to_payment).collect(),
        transactions: rows.transactions.into_iter().map(row_to_transaction).collect(),
    })
}

fn row_to_invoice(row: InvoiceRow) -> Result<Invoice, PortError> {
    Ok(Invoice {
        id: InvoiceId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        user_id: UserId::from_uuid(row.user_id),
        invoice_number: row.invoice_number,
        status: db_to_domain_invoice_status(row.status),
        subtotal: row.subtotal,
        tax_rate: tax_rate(row.tax_rate)?,
        tax_amount: row.tax_amount,
        total_amount: row.total_amount,
        paid: row.paid,
        balance_due: row.balance_due,
        issue_date: row.issue_date,
        due_date: row.due_date,
        paid_date: row.paid_date,
        reference: row.reference,
        notes: row.notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn invoice_to_row(invoice: &Invoice) -> InvoiceRow {
    InvoiceRow {
        id: *invoice.id.as_uuid(),
        organization_id: *invoice.organization_id.as_uuid(),
        user_id: *invoice.user_id.as_uuid(),
        invoice_number: invoice.invoice_number.clone(),
        status: domain_to_db_invoice_status(invoice.status),
        subtotal: invoice.subtotal,
        tax_rate: invoice.tax_rate.as_decimal(),
        tax_amount: invoice.tax_amount,
        total_amount: invoice.total_amount,
        paid: invoice.paid,
        balance_due: invoice.balance_due,
        issue_date: invoice.issue_date,
        due_date: invoice.due_date,
        paid_date: invoice.paid_date,
        reference: invoice.reference.clone(),
        notes: invoice.notes.clone(),
        created_at: invoice.created_at,
        updated_at: invoice.updated_at,
    }
}

fn row_to_item(row: InvoiceItemRow) -> Result<InvoiceItem, PortError> {
    Ok(InvoiceItem {
        id: InvoiceItemId::from_uuid(row.id),
        invoice_id: InvoiceId::from_uuid(row.invoice_id),
        chargeable_id: ChargeableId::from_uuid(row.chargeable_id),
        description: row.description,
        quantity: row.quantity,
        rate: row.rate,
        tax_rate: tax_rate(row.tax_rate)?,
        amount: row.amount,
        tax_amount: row.tax_amount,
        total_amount: row.total_amount,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn item_to_row(item: &InvoiceItem) -> InvoiceItemRow {
    InvoiceItemRow {
        id: *item.id.as_uuid(),
        invoice_id: *item.invoice_id.as_uuid(),
        chargeable_id: *item.chargeable_id.as_uuid(),
        description: item.description.clone(),
        quantity: item.quantity,
        rate: item.rate,
        tax_rate: item.tax_rate.as_decimal(),
        amount: item.amount,
        tax_amount: item.tax_amount,
        total_amount: item.total_amount,
        created_at: item.created_at,
        updated_at: item.updated_at,
    }
}

fn row_to_payment(row: PaymentRow) -> Payment {
    Payment {
        id: PaymentId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        invoice_id: InvoiceId::from_uuid(row.invoice_id),
        transaction_id: TransactionId::from_uuid(row.transaction_id),
        amount: row.amount,
        payment_method: db_to_domain_payment_method(row.payment_method),
        payment_reference: row.payment_reference,
        notes: row.notes,
        paid_at: row.paid_at,
        created_at: row.created_at,
    }
}

fn payment_to_row(payment: &Payment) -> PaymentRow {
    PaymentRow {
        id: *payment.id.as_uuid(),
        organization_id: *payment.organization_id.as_uuid(),
        invoice_id: *payment.invoice_id.as_uuid(),
        transaction_id: *payment.transaction_id.as_uuid(),
        amount: payment.amount,
        payment_method: domain_to_db_payment_method(payment.payment_method),
        payment_reference: payment.payment_reference.clone(),
        notes: payment.notes.clone(),
        paid_at: payment.paid_at,
        created_at: payment.created_at,
    }
}

fn row_to_transaction(row: TransactionRow) -> Transaction {
    Transaction {
        id: TransactionId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        user_id: UserId::from_uuid(row.user_id),
        invoice_id: row.invoice_id.map(InvoiceId::from_uuid),
        transaction_type: db_to_domain_transaction_type(row.transaction_type),
        status: db_to_domain_transaction_status(row.status),
        amount: row.amount,
        description: row.description,
        reference_number: row.reference_number,
        metadata: row.metadata,
        created_at: row.created_at,
        completed_at: row.completed_at,
    }
}

fn transaction_to_row(transaction: &Transaction) -> TransactionRow {
    TransactionRow {
        id: *transaction.id.as_uuid(),
        organization_id: *transaction.organization_id.as_uuid(),
        user_id: *transaction.user_id.as_uuid(),
        invoice_id: transaction.invoice_id.map(Into::into),
        transaction_type: domain_to_db_transaction_type(transaction.transaction_type),
        status: domain_to_db_transaction_status(transaction.status),
        amount: transaction.amount,
        description: transaction.description.clone(),
        reference_number: transaction.reference_number.clone(),
        metadata: transaction.metadata.clone(),
        created_at: transaction.created_at,
        completed_at: transaction.completed_at,
    }
}

fn row_to_account_balance(row: AccountBalanceRow) -> AccountBalance {
    AccountBalance {
        id: AccountBalanceId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        user_id: UserId::from_uuid(row.user_id),
        balance: row.balance,
        last_transaction_id: row.last_transaction_id.map(TransactionId::from_uuid),
        updated_at: row.updated_at,
    }
}

fn account_balance_to_row(balance: &AccountBalance) -> AccountBalanceRow {
    AccountBalanceRow {
        id: *balance.id.as_uuid(),
        organization_id: *balance.organization_id.as_uuid(),
        user_id: *balance.user_id.as_uuid(),
        balance: balance.balance,
        last_transaction_id: balance.last_transaction_id.map(Into::into),
        updated_at: balance.updated_at,
    }
}

fn db_to_domain_invoice_status(status: DbInvoiceStatus) -> InvoiceStatus {
    match status {
        DbInvoiceStatus::Draft => InvoiceStatus::Draft,
        DbInvoiceStatus::Pending => InvoiceStatus::Pending,
        DbInvoiceStatus::Paid => InvoiceStatus::Paid,
        DbInvoiceStatus::Overdue => InvoiceStatus::Overdue,
        DbInvoiceStatus::Cancelled => InvoiceStatus::Cancelled,
        DbInvoiceStatus::Refunded => InvoiceStatus::Refunded,
    }
}

fn domain_to_db_invoice_status(status: InvoiceStatus) -> DbInvoiceStatus {
    match status {
        InvoiceStatus::Draft => DbInvoiceStatus::Draft,
        InvoiceStatus::Pending => DbInvoiceStatus::Pending,
        InvoiceStatus::Paid => DbInvoiceStatus::Paid,
        InvoiceStatus::Overdue => DbInvoiceStatus::Overdue,
        InvoiceStatus::Cancelled => DbInvoiceStatus::Cancelled,
        InvoiceStatus::Refunded => DbInvoiceStatus::Refunded,
    }
}

fn db_to_domain_payment_method(method: DbPaymentMethod) -> PaymentMethod {
    match method {
        DbPaymentMethod::Cash => PaymentMethod::Cash,
        DbPaymentMethod::CreditCard => PaymentMethod::CreditCard,
        DbPaymentMethod::BankTransfer => PaymentMethod::BankTransfer,
        DbPaymentMethod::DirectDebit => PaymentMethod::DirectDebit,
        DbPaymentMethod::Cheque => PaymentMethod::Cheque,
        DbPaymentMethod::Other => PaymentMethod::Other,
        DbPaymentMethod::AccountCredit => PaymentMethod::AccountCredit,
    }
}

fn domain_to_db_payment_method(method: PaymentMethod) -> DbPaymentMethod {
    match method {
        PaymentMethod::Cash => DbPaymentMethod::Cash,
        PaymentMethod::CreditCard => DbPaymentMethod::CreditCard,
        PaymentMethod::BankTransfer => DbPaymentMethod::BankTransfer,
        PaymentMethod::DirectDebit => DbPaymentMethod::DirectDebit,
        PaymentMethod::Cheque => DbPaymentMethod::Cheque,
        PaymentMethod::Other => DbPaymentMethod::Other,
        PaymentMethod::AccountCredit => DbPaymentMethod::AccountCredit,
    }
}

fn db_to_domain_transaction_type(transaction_type: DbTransactionType) -> TransactionType {
    match transaction_type {
        DbTransactionType::Payment => TransactionType::Payment,
        DbTransactionType::Refund => TransactionType::Refund,
        DbTransactionType::Credit => TransactionType::Credit,
        DbTransactionType::Debit => TransactionType::Debit,
        DbTransactionType::Adjustment => TransactionType::Adjustment,
    }
}

fn domain_to_db_transaction_type(transaction_type: TransactionType) -> DbTransactionType {
    match transaction_type {
        TransactionType::Payment => DbTransactionType::Payment,
        TransactionType::Refund => DbTransactionType::Refund,
        TransactionType::Credit => DbTransactionType::Credit,
        TransactionType::Debit => DbTransactionType::Debit,
        TransactionType::Adjustment => DbTransactionType::Adjustment,
    }
}

fn db_to_domain_transaction_status(status: DbTransactionStatus) -> TransactionStatus {
    match status {
        DbTransactionStatus::Pending => TransactionStatus::Pending,
        DbTransactionStatus::Completed => TransactionStatus::Completed,
        DbTransactionStatus::Failed => TransactionStatus::Failed,
        DbTransactionStatus::Reversed => TransactionStatus::Reversed,
        DbTransactionStatus::Cancelled => TransactionStatus::Cancelled,
    }
}

fn domain_to_db_transaction_status(status: TransactionStatus) -> DbTransactionStatus {
    match status {
        TransactionStatus::Pending => DbTransactionStatus::Pending,
        TransactionStatus::Completed => DbTransactionStatus::Completed,
        TransactionStatus::Failed => DbTransactionStatus::Failed,
        TransactionStatus::Reversed => DbTransactionStatus::Reversed,
        TransactionStatus::Cancelled => DbTransactionStatus::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_invoice_row_mapping_keeps_money_and_rate() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let invoice = Invoice {
            id: InvoiceId::new(),
            organization_id: OrganizationId::new(),
            user_id: UserId::new(),
            invoice_number: "INV-000042".to_string(),
            status: InvoiceStatus::Pending,
            subtotal: dec!(250.00),
            tax_rate: TaxRate::new(dec!(0.15)).unwrap(),
            tax_amount: dec!(37.50),
            total_amount: dec!(287.50),
            paid: dec!(100.00),
            balance_due: dec!(187.50),
            issue_date: date,
            due_date: date + chrono::Duration::days(30),
            paid_date: None,
            reference: Some("Dual flight".to_string()),
            notes: None,
            created_at: now,
            updated_at: now,
        };

        let row = invoice_to_row(&invoice);
        assert_eq!(row.tax_rate, dec!(0.15));
        assert_eq!(row.status, DbInvoiceStatus::Pending);
        assert_eq!(row_to_invoice(row).unwrap(), invoice);
    }

    #[test]
    fn test_negative_stored_rate_is_rejected() {
        assert!(tax_rate(dec!(-0.10)).is_err());
    }
}
