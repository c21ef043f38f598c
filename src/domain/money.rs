use crate::error::{Result, StorefrontError};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places in the currency's minor unit.
pub const MINOR_UNIT_SCALE: u32 = 2;

const MINOR_UNITS_PER_MAJOR: i64 = 10_i64.pow(MINOR_UNIT_SCALE);

/// A monetary value held at minor-unit precision.
///
/// Every constructor rounds half-up (midpoint away from zero) to
/// [`MINOR_UNIT_SCALE`] places, so two `Money` values are equal exactly when
/// their minor-unit integers are equal. Arithmetic is checked and reports
/// overflow as a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(Decimal);

fn overflow() -> StorefrontError {
    StorefrontError::ValidationError("Amount is too large".to_string())
}

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        let mut rounded =
            amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(MINOR_UNIT_SCALE);
        Self(rounded)
    }

    /// Builds a price or transfer amount, which must be strictly positive.
    pub fn positive(amount: Decimal) -> Result<Self> {
        if amount > Decimal::ZERO {
            Ok(Self::new(amount))
        } else {
            Err(StorefrontError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// The amount as an integer count of minor units (e.g. cents), or `None`
    /// when it does not fit in an `i64`.
    pub fn minor_units(&self) -> Option<i64> {
        let scaled = self.0.checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))?;
        i64::try_from(scaled.trunc()).ok()
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        self.0.checked_add(rhs.0).map(Self).ok_or_else(overflow)
    }

    /// Adds up a list of amounts.
    pub fn total(amounts: impl IntoIterator<Item = Self>) -> Result<Self> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    /// Applies a percentage discount and rounds the result half-up.
    pub fn discounted(&self, percent: u8) -> Result<Self> {
        let keep = Decimal::from(100_u32.saturating_sub(u32::from(percent)));
        let scaled = self.0.checked_mul(keep).ok_or_else(overflow)?;
        Ok(Self::new(scaled / Decimal::ONE_HUNDRED))
    }
}

/// Parses an amount reported by a payment provider or a bank statement.
///
/// Accepts plain decimals and scientific notation; anything not strictly
/// positive is rejected.
pub fn parse_reported_amount(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
        .filter(|amount| *amount > Decimal::ZERO)
}

/// Compares a raw amount reported by a payment provider against an order
/// total with zero tolerance on minor units.
///
/// Amounts carrying precision below the minor unit never match, and neither
/// do amounts too large to express in minor units.
pub fn matches_exactly(reported: Decimal, expected: Money) -> bool {
    let Some(scaled) = reported.checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR)) else {
        return false;
    };
    scaled.fract().is_zero()
        && i64::try_from(scaled).ok().is_some_and(|units| Some(units) == expected.minor_units())
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
