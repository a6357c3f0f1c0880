//! Money helpers on top of rust_decimal
//!
//! Amounts are plain `Decimal` values in the organization's currency. All
//! persisted amounts are rounded to two decimal places with midpoint away
//! from zero, so sums of rounded line items are exactly the invoice totals.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of decimal places kept on every stored amount
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Largest amount a money column holds (`NUMERIC(12, 2)`)
pub const MAX_AMOUNT: Decimal = dec!(9999999999.99);

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid tax rate: {0}")]
    InvalidRate(String),

    #[error("Amount out of range: {0}")]
    OutOfRange(String),
}

/// Rounds an amount to the stored precision
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Rejects values with more than two decimal places
pub fn ensure_money_scale(value: Decimal) -> Result<Decimal, MoneyError> {
    let normalized = value.normalize();
    if normalized.scale() > MONEY_DECIMAL_PLACES {
        return Err(MoneyError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            value, MONEY_DECIMAL_PLACES
        )));
    }
    Ok(normalized)
}

/// Rounds a computed amount and checks it fits a money column
pub fn checked_money(amount: Option<Decimal>) -> Result<Decimal, MoneyError> {
    amount
        .map(round_money)
        .filter(|value| value.abs() <= MAX_AMOUNT)
        .ok_or_else(|| MoneyError::OutOfRange(format!("exceeds {}", MAX_AMOUNT)))
}

/// A tax rate expressed as a fraction (0.15 = 15%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Rate applied when a line item does not specify one
    pub const DEFAULT: TaxRate = TaxRate(dec!(0.15));

    /// Highest accepted rate (100%)
    pub const MAX: TaxRate = TaxRate(Decimal::ONE);

    /// Creates a tax rate, rejecting negative values and rates above 100%
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::InvalidRate(format!("{} is negative", value)));
        }
        if value > Self::MAX.0 {
            return Err(MoneyError::InvalidRate(format!("{} is above 1", value)));
        }
        Ok(Self(value))
    }

    /// Creates from a percentage value (e.g., 15 for 15%)
    pub fn from_percentage(percentage: Decimal) -> Result<Self, MoneyError> {
        Self::new(percentage / dec!(100))
    }

    /// Returns the rate as a fraction
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns the rate as a percentage
    pub fn as_percentage(&self) -> Decimal {
        self.0 * dec!(100)
    }

    /// Computes the rounded tax on an amount
    pub fn tax_on(&self, amount: Decimal) -> Result<Decimal, MoneyError> {
        checked_money(amount.checked_mul(self.0))
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}
