//! Billing repository implementation
//!
//! Invoices, their items, payments, ledger transactions and account credit.
//! Writes run in a [`BillingTx`]; invoice and account balance rows are
//! locked with `SELECT ... FOR UPDATE` so concurrent payments against the
//! same invoice serialize.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;

macro_rules! invoice_columns {
    () => {
        "id, organization_id, user_id, invoice_number, status, subtotal, tax_rate, tax_amount, \
         total_amount, paid, balance_due, issue_date, due_date, paid_date, reference, notes, \
         created_at, updated_at"
    };
}

macro_rules! item_columns {
    () => {
        "id, invoice_id, chargeable_id, description, quantity, rate, tax_rate, amount, \
         tax_amount, total_amount, created_at, updated_at"
    };
}

macro_rules! payment_columns {
    () => {
        "id, organization_id, invoice_id, transaction_id, amount, payment_method, \
         payment_reference, notes, paid_at, created_at"
    };
}

macro_rules! transaction_columns {
    () => {
        "id, organization_id, user_id, invoice_id, type, status, amount, description, \
         reference_number, metadata, created_at, completed_at"
    };
}

/// Repository for invoices and the member ledger
#[derive(Debug, Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

impl BillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Reads an invoice with everything attached to it
    pub async fn get_invoice_with_children(&self, id: Uuid) -> Result<Option<InvoiceWithChildren>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        invoice_with_children(&mut conn, id, false).await
    }

    pub async fn begin(&self) -> Result<BillingTx, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(BillingTx { tx })
    }
}

/// An open billing transaction
///
/// Dropping it without [`BillingTx::commit`] rolls everything back.
pub struct BillingTx {
    tx: Transaction<'static, Postgres>,
}

impl BillingTx {
    /// Increments and returns the organization's invoice counter
    pub async fn next_invoice_sequence(&mut self, organization_id: Uuid) -> Result<i64, DatabaseError> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO invoice_sequences (organization_id, last_value)
            VALUES ($1, 1)
            ON CONFLICT (organization_id)
            DO UPDATE SET last_value = invoice_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(organization_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(value)
    }

    pub async fn chargeable_in_org(&mut self, organization_id: Uuid, chargeable_id: Uuid) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM chargeables WHERE id = $1 AND organization_id = $2)",
        )
        .bind(chargeable_id)
        .bind(organization_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    pub async fn lock_invoice(&mut self, id: Uuid) -> Result<Option<InvoiceRow>, DatabaseError> {
        let row = sqlx::query_as::<_, InvoiceRow>(concat!(
            "SELECT ",
            invoice_columns!(),
            " FROM invoices WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row)
    }

    pub async fn items(&mut self, invoice_id: Uuid) -> Result<Vec<InvoiceItemRow>, DatabaseError> {
        fetch_items(&mut self.tx, invoice_id).await
    }

    pub async fn insert_invoice(&mut self, row: &InvoiceRow) -> Result<(), DatabaseError> {
        sqlx::query(concat!(
            "INSERT INTO invoices (",
            invoice_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(row.id)
        .bind(row.organization_id)
        .bind(row.user_id)
        .bind(&row.invoice_number)
        .bind(row.status)
        .bind(row.subtotal)
        .bind(row.tax_rate)
        .bind(row.tax_amount)
        .bind(row.total_amount)
        .bind(row.paid)
        .bind(row.balance_due)
        .bind(row.issue_date)
        .bind(row.due_date)
        .bind(row.paid_date)
        .bind(&row.reference)
        .bind(&row.notes)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    pub async fn update_invoice(&mut self, row: &InvoiceRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                status = $2,
                subtotal = $3,
                tax_rate = $4,
                tax_amount = $5,
                total_amount = $6,
                paid = $7,
                balance_due = $8,
                due_date = $9,
                paid_date = $10,
                reference = $11,
                notes = $12,
                updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(row.status)
        .bind(row.subtotal)
        .bind(row.tax_rate)
        .bind(row.tax_amount)
        .bind(row.total_amount)
        .bind(row.paid)
        .bind(row.balance_due)
        .bind(row.due_date)
        .bind(row.paid_date)
        .bind(&row.reference)
        .bind(&row.notes)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Invoice", row.id));
        }
        Ok(())
    }

    pub async fn insert_item(&mut self, row: &InvoiceItemRow) -> Result<(), DatabaseError> {
        sqlx::query(concat!(
            "INSERT INTO invoice_items (",
            item_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(row.id)
        .bind(row.invoice_id)
        .bind(row.chargeable_id)
        .bind(&row.description)
        .bind(row.quantity)
        .bind(row.rate)
        .bind(row.tax_rate)
        .bind(row.amount)
        .bind(row.tax_amount)
        .bind(row.total_amount)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    pub async fn update_item(&mut self, row: &InvoiceItemRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE invoice_items SET
                description = $2,
                quantity = $3,
                rate = $4,
                tax_rate = $5,
                amount = $6,
                tax_amount = $7,
                total_amount = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(&row.description)
        .bind(row.quantity)
        .bind(row.rate)
        .bind(row.tax_rate)
        .bind(row.amount)
        .bind(row.tax_amount)
        .bind(row.total_amount)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("InvoiceItem", row.id));
        }
        Ok(())
    }

    pub async fn insert_transaction(&mut self, row: &TransactionRow) -> Result<(), DatabaseError> {
        sqlx::query(concat!(
            "INSERT INTO transactions (",
            transaction_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(row.id)
        .bind(row.organization_id)
        .bind(row.user_id)
        .bind(row.invoice_id)
        .bind(row.transaction_type)
        .bind(row.status)
        .bind(row.amount)
        .bind(&row.description)
        .bind(&row.reference_number)
        .bind(&row.metadata)
        .bind(row.created_at)
        .bind(row.completed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    pub async fn lock_account_balance(
        &mut self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccountBalanceRow>, DatabaseError> {
        let row = sqlx::query_as::<_, AccountBalanceRow>(
            r#"
            SELECT id, organization_id, user_id, balance, last_transaction_id, updated_at
            FROM account_balances
            WHERE organization_id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row)
    }

    pub async fn upsert_account_balance(&mut self, row: &AccountBalanceRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO account_balances (id, organization_id, user_id, balance, last_transaction_id, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (organization_id, user_id) DO UPDATE SET
                balance = EXCLUDED.balance,
                last_transaction_id = EXCLUDED.last_transaction_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(row.id)
        .bind(row.organization_id)
        .bind(row.user_id)
        .bind(row.balance)
        .bind(row.last_transaction_id)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    pub async fn insert_payment(&mut self, row: &PaymentRow) -> Result<(), DatabaseError> {
        sqlx::query(concat!(
            "INSERT INTO payments (",
            payment_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(row.id)
        .bind(row.organization_id)
        .bind(row.invoice_id)
        .bind(row.transaction_id)
        .bind(row.amount)
        .bind(row.payment_method)
        .bind(&row.payment_reference)
        .bind(&row.notes)
        .bind(row.paid_at)
        .bind(row.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// Reads the invoice and its children as this transaction sees them
    pub async fn invoice_with_children(&mut self, id: Uuid) -> Result<Option<InvoiceWithChildren>, DatabaseError> {
        invoice_with_children(&mut self.tx, id, true).await
    }

    pub async fn commit(self) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }
}

async fn invoice_with_children(
    conn: &mut PgConnection,
    id: Uuid,
    in_transaction: bool,
) -> Result<Option<InvoiceWithChildren>, DatabaseError> {
    let sql = if in_transaction {
        concat!("SELECT ", invoice_columns!(), " FROM invoices WHERE id = $1 FOR UPDATE")
    } else {
        concat!("SELECT ", invoice_columns!(), " FROM invoices WHERE id = $1")
    };

    let Some(invoice) = sqlx::query_as::<_, InvoiceRow>(sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let items = fetch_items(&mut *conn, id).await?;

    let payments = sqlx::query_as::<_, PaymentRow>(concat!(
        "SELECT ",
        payment_columns!(),
        " FROM payments WHERE invoice_id = $1 ORDER BY created_at, id"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let transactions = sqlx::query_as::<_, TransactionRow>(concat!(
        "SELECT ",
        transaction_columns!(),
        " FROM transactions WHERE invoice_id = $1 ORDER BY created_at, id"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(InvoiceWithChildren {
        invoice,
        items,
        payments,
        transactions,
    }))
}

async fn fetch_items(conn: &mut PgConnection, invoice_id: Uuid) -> Result<Vec<InvoiceItemRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, InvoiceItemRow>(concat!(
        "SELECT ",
        item_columns!(),
        " FROM invoice_items WHERE invoice_id = $1 ORDER BY created_at, id"
    ))
    .bind(invoice_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// An invoice row with its items, payments and ledger transactions
#[derive(Debug, Clone)]
pub struct InvoiceWithChildren {
    pub invoice: InvoiceRow,
    pub items: Vec<InvoiceItemRow>,
    pub payments: Vec<PaymentRow>,
    pub transactions: Vec<TransactionRow>,
}

/// Database row for an invoice
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub invoice_number: String,
    pub status: DbInvoiceStatus,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
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

/// Database row for an invoice line
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceItemRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub chargeable_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub tax_rate: Decimal,
    pub amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for a payment
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub invoice_id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Decimal,
    pub payment_method: DbPaymentMethod,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Database row for a ledger transaction
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub invoice_id: Option<Uuid>,
    #[sqlx(rename = "type")]
    pub transaction_type: DbTransactionType,
    pub status: DbTransactionStatus,
    pub amount: Decimal,
    pub description: String,
    pub reference_number: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Database row for a member's account credit
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountBalanceRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub last_transaction_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// Database enum for invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
pub enum DbInvoiceStatus {
    Draft,
    Pending,
    Paid,
    Overdue,
    Cancelled,
    Refunded,
}

/// Database enum for payment methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum DbPaymentMethod {
    Cash,
    CreditCard,
    BankTransfer,
    DirectDebit,
    Cheque,
    Other,
    AccountCredit,
}

/// Database enum for transaction types
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
pub enum DbTransactionType {
    Payment,
    Refund,
    Credit,
    Debit,
    Adjustment,
}

/// Database enum for transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
pub enum DbTransactionStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
    Cancelled,
}
