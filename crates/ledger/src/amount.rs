//! Ledger-native fixed precision amounts
//!
//! Amounts carry at most seven decimal places (one stroop is 0.0000001) and
//! are bounded by the largest signed 64-bit stroop count.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{LedgerError, LedgerResult};

/// Decimal places of a ledger amount
pub const AMOUNT_SCALE: u32 = 7;

/// An amount of an asset, in whole units with stroop precision
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    /// Create a new amount with the given integer value
    pub fn new(units: i64) -> Self {
        Self {
            value: Decimal::new(units, 0),
        }
    }

    /// Create a zero amount
    pub fn zero() -> Self {
        Self { value: Decimal::ZERO }
    }

    /// The largest amount the ledger can hold or trade (i64::MAX stroops)
    pub fn max_tradable() -> Self {
        Self::from_stroops(i64::MAX)
    }

    /// Create an amount from a stroop count
    pub fn from_stroops(stroops: i64) -> Self {
        Self {
            value: Decimal::new(stroops, AMOUNT_SCALE),
        }
    }

    /// Wrap a decimal, rejecting values that are negative, exceed the
    /// ledger maximum or carry more than seven decimal places
    pub fn from_decimal(value: Decimal) -> LedgerResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(LedgerError::InvalidAmount(format!("{} is negative", value)));
        }
        if value.normalize().scale() > AMOUNT_SCALE {
            return Err(LedgerError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                value, AMOUNT_SCALE
            )));
        }
        if value > Self::max_tradable().value {
            return Err(LedgerError::InvalidAmount(format!("{} exceeds the ledger maximum", value)));
        }
        Ok(Self { value })
    }

    /// Whole units, bounded like any other amount
    pub fn from_units(units: i64) -> LedgerResult<Self> {
        Self::from_decimal(Decimal::from(units))
    }

    /// Parse a decimal string such as `"12.5"`
    pub fn parse(input: &str) -> LedgerResult<Self> {
        let value = Decimal::from_str(input.trim())
            .map_err(|e| LedgerError::InvalidAmount(format!("{:?}: {}", input, e)))?;
        Self::from_decimal(value)
    }

    /// Stroop count of this amount
    pub fn to_stroops(&self) -> i64 {
        // bounded by max_tradable on construction
        (self.value * Decimal::new(10_000_000, 0))
            .trunc()
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Get the underlying decimal value
    pub fn decimal_value(&self) -> Decimal {
        self.value
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Check if the amount is positive
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Subtract, failing when the result would go negative
    pub fn checked_sub(&self, other: Amount) -> Option<Amount> {
        let value = self.value.checked_sub(other.value)?;
        if value.is_sign_negative() && !value.is_zero() {
            return None;
        }
        Some(Self { value })
    }

    /// Multiply by a whole count, staying within the ledger maximum
    pub fn checked_mul(&self, count: u64) -> Option<Amount> {
        let value = self.value.checked_mul(Decimal::from(count))?;
        Self::from_decimal(value).ok()
    }

    /// Split into `parts` equal shares, truncating each share to stroop
    /// precision. The remainder is discarded.
    pub fn split_even(&self, parts: u32) -> LedgerResult<Amount> {
        if parts == 0 {
            return Err(LedgerError::InvalidAmount("cannot split into zero parts".to_string()));
        }
        let share = (self.value / Decimal::from(parts))
            .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::ToZero);
        Ok(Self { value: share })
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            value: self.value + other.value,
        }
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, other: Self) {
        self.value += other.value;
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            value: self.value - other.value,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.normalize())
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.value.normalize())
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Amount {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(Amount::parse("12.5000000").unwrap().to_string(), "12.5");
        assert_eq!(Amount::parse(" 100 ").unwrap(), Amount::new(100));
        assert_eq!(Amount::parse("0").unwrap().to_string(), "0");
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Amount::parse("-1").is_err());
        assert!(Amount::parse("0.00000001").is_err());
        assert!(Amount::parse("922337203685.4775808").is_err());
        assert!(Amount::parse("abc").is_err());
    }

    #[test]
    fn test_from_units_is_bounded() {
        assert_eq!(Amount::from_units(40).unwrap(), Amount::new(40));
        assert!(Amount::from_units(922_337_203_686).is_err());
        assert!(Amount::from_units(-1).is_err());
    }

    #[test]
    fn test_max_tradable() {
        assert_eq!(Amount::max_tradable().to_string(), "922337203685.4775807");
        assert_eq!(Amount::max_tradable().to_stroops(), i64::MAX);
    }

    #[test]
    fn test_stroops() {
        assert_eq!(Amount::parse("1.5").unwrap().to_stroops(), 15_000_000);
        assert_eq!(Amount::from_stroops(1), Amount::parse("0.0000001").unwrap());
    }

    #[test]
    fn test_split_even_truncates() {
        let share = Amount::new(10).split_even(3).unwrap();
        assert_eq!(share.to_string(), "3.3333333");

        let share = Amount::max_tradable().checked_sub(Amount::new(100)).unwrap().split_even(3).unwrap();
        assert_eq!(share.to_string(), "307445734528.4925269");

        assert!(Amount::new(1).split_even(0).is_err());
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(Amount::new(5).checked_sub(Amount::new(2)), Some(Amount::new(3)));
        assert_eq!(Amount::new(2).checked_sub(Amount::new(5)), None);
        assert_eq!(Amount::parse("0.5").unwrap().checked_mul(21), Some(Amount::parse("10.5").unwrap()));
        assert_eq!(Amount::max_tradable().checked_mul(2), None);
    }

    #[test]
    fn test_exact_comparison() {
        let quorum = Amount::parse("100").unwrap();
        assert!(Amount::parse("100.0000000").unwrap() >= quorum);
        assert!(Amount::parse("99.9999999").unwrap() < quorum);
    }
}
