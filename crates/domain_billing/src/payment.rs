//! Payments recorded against invoices
//!
//! Payments are append-only. The method is stored exactly as submitted,
//! account credit included.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{round_money, InvoiceId, OrganizationId, PaymentId, TransactionId, MAX_AMOUNT};

use crate::error::BillingError;
use crate::invoice::MAX_TEXT_LEN;

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    BankTransfer,
    DirectDebit,
    Cheque,
    Other,
    /// Drawn from the member's account balance
    AccountCredit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::DirectDebit => "direct_debit",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Other => "other",
            PaymentMethod::AccountCredit => "account_credit",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "direct_debit" => Ok(PaymentMethod::DirectDebit),
            "cheque" => Ok(PaymentMethod::Cheque),
            "other" => Ok(PaymentMethod::Other),
            "account_credit" => Ok(PaymentMethod::AccountCredit),
            other => Err(BillingError::invalid(format!("unknown payment method '{}'", other))),
        }
    }
}

/// A payment submission
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    /// When the money was received; defaults to now
    pub date: Option<DateTime<Utc>>,
}

impl PaymentRequest {
    pub fn new(amount: Decimal, payment_method: PaymentMethod) -> Self {
        Self {
            amount,
            payment_method,
            payment_reference: None,
            notes: None,
            date: None,
        }
    }

    /// Checks the request and returns the amount at stored precision
    pub fn validate(&self) -> Result<Decimal, BillingError> {
        let amount = round_money(self.amount);
        if amount <= Decimal::ZERO {
            return Err(BillingError::invalid(format!(
                "amount must be greater than zero (got {})",
                self.amount
            )));
        }
        if amount > MAX_AMOUNT {
            return Err(BillingError::invalid(format!(
                "amount must be at most {} (got {})",
                MAX_AMOUNT, self.amount
            )));
        }
        for (field, value) in [("payment_reference", &self.payment_reference), ("notes", &self.notes)] {
            if value.as_ref().is_some_and(|v| v.chars().count() > MAX_TEXT_LEN) {
                return Err(BillingError::invalid(format!(
                    "{} must be at most {} characters",
                    field, MAX_TEXT_LEN
                )));
            }
        }
        Ok(amount)
    }
}

/// A recorded payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_rejects_non_positive() {
        assert!(PaymentRequest::new(Decimal::ZERO, PaymentMethod::Cash).validate().is_err());
        assert!(PaymentRequest::new(dec!(-5), PaymentMethod::Cash).validate().is_err());
        assert!(PaymentRequest::new(dec!(0.001), PaymentMethod::Cash).validate().is_err());
        assert!(PaymentRequest::new(dec!(10000000000), PaymentMethod::Cash).validate().is_err());
    }

    #[test]
    fn test_validate_rounds_amount() {
        let amount = PaymentRequest::new(dec!(10.005), PaymentMethod::Cheque).validate().unwrap();
        assert_eq!(amount, dec!(10.01));
    }

    #[test]
    fn test_method_round_trip() {
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::CreditCard,
            PaymentMethod::BankTransfer,
            PaymentMethod::DirectDebit,
            PaymentMethod::Cheque,
            PaymentMethod::Other,
            PaymentMethod::AccountCredit,
        ] {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
            assert_eq!(serde_json::to_value(method).unwrap(), method.as_str());
        }
    }
}
