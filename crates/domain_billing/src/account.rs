//! Member account credit
//!
//! A running credit balance per member and organization. In this domain it
//! only ever goes down, when a payment is made with account credit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountBalanceId, OrganizationId, TransactionId, UserId};

use crate::error::BillingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub id: AccountBalanceId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub balance: Decimal,
    pub last_transaction_id: Option<TransactionId>,
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Opens a balance for a member
    pub fn new(organization_id: OrganizationId, user_id: UserId, balance: Decimal) -> Self {
        Self {
            id: AccountBalanceId::new_v7(),
            organization_id,
            user_id,
            balance,
            last_transaction_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Takes `amount` off the balance
    ///
    /// Fails without changing anything when the balance does not cover it.
    pub fn debit(
        &mut self,
        amount: Decimal,
        transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        if self.balance < amount {
            return Err(BillingError::InsufficientCredit {
                available: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        self.last_transaction_id = Some(transaction_id);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_debit_reduces_balance() {
        let mut account = AccountBalance::new(OrganizationId::new(), UserId::new(), dec!(150));
        let txn = TransactionId::new();
        account.debit(dec!(100), txn, Utc::now()).unwrap();
        assert_eq!(account.balance, dec!(50));
        assert_eq!(account.last_transaction_id, Some(txn));
    }

    #[test]
    fn test_debit_exact_balance() {
        let mut account = AccountBalance::new(OrganizationId::new(), UserId::new(), dec!(100));
        account.debit(dec!(100), TransactionId::new(), Utc::now()).unwrap();
        assert_eq!(account.balance, Decimal::ZERO);
    }

    #[test]
    fn test_insufficient_credit_leaves_balance() {
        let mut account = AccountBalance::new(OrganizationId::new(), UserId::new(), dec!(20));
        let before = account.clone();
        let err = account.debit(dec!(20.01), TransactionId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, BillingError::InsufficientCredit { .. }));
        assert_eq!(account, before);
    }
}
