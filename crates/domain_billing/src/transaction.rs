//! Member ledger rows
//!
//! A transaction is written once for every money-moving event and never
//! changed afterwards: invoice issue (debit), invoice edits (credit or debit
//! of the delta) and payments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use core_kernel::{InvoiceId, OrganizationId, TransactionId, UserId};

/// Kind of ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Payment,
    Refund,
    Credit,
    Debit,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::Refund => "refund",
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
            TransactionType::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing state of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Reversed => "reversed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

/// An immutable ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    /// Invoice this movement belongs to, if any
    pub invoice_id: Option<InvoiceId>,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    /// Signed amount; invoice debits are negative
    pub amount: Decimal,
    pub description: String,
    pub reference_number: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Creates a completed transaction for an invoice
    pub fn completed(
        organization_id: OrganizationId,
        user_id: UserId,
        invoice_id: InvoiceId,
        transaction_type: TransactionType,
        amount: Decimal,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new_v7(),
            organization_id,
            user_id,
            invoice_id: Some(invoice_id),
            transaction_type,
            status: TransactionStatus::Completed,
            amount,
            description: description.into(),
            reference_number: None,
            metadata: serde_json::json!({ "invoice_id": invoice_id }),
            created_at: now,
            completed_at: Some(now),
        }
    }

    /// Sets the external reference number
    pub fn with_reference(mut self, reference_number: Option<String>) -> Self {
        self.reference_number = reference_number;
        self
    }

    /// Replaces the metadata document
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
