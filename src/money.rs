// =============================================================================
// Fixed-scale currency type
// =============================================================================
//
// Currency never crosses a module boundary as a float. Conversion to f64
// happens only at the final ratio/percentage computation, via `ratio_pct`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn from_major_minor(major: i64, minor_cents: i64) -> Self {
        Self(Decimal::new(major * 100 + minor_cents, 2))
    }

    /// Parses a decimal string, rounding to 2 places.
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<Decimal>().ok().map(|d| Self(d.round_dp(2)))
    }

    pub fn from_decimal(d: Decimal) -> Self {
        Self(d.round_dp(2))
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Decimal::ZERO
    }

    pub fn checked_mul_int(&self, factor: i64) -> Option<Self> {
        self.0
            .checked_mul(Decimal::from(factor))
            .map(|d| Self(d.round_dp(2)))
    }

    /// Multiplies by a fraction expressed as `numerator / denominator`, used
    /// to prorate monthly targets by period completeness.
    pub fn checked_mul_fraction(&self, numerator: f64, denominator: f64) -> Option<Self> {
        if denominator == 0.0 {
            return None;
        }
        let factor = Decimal::try_from(numerator / denominator).ok()?;
        self.0.checked_mul(factor).map(|d| Self(d.round_dp(2)))
    }

    pub fn checked_div(&self, divisor: Decimal) -> Option<Self> {
        if divisor.is_zero() {
            return None;
        }
        self.0.checked_div(divisor).map(|d| Self(d.round_dp(2)))
    }

    /// Converts to f64 for display. Only call at a rendering boundary.
    pub fn to_f64(&self) -> f64 {
        self.0.try_into().unwrap_or(0.0)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |a, b| a + b)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computes `numerator / denominator * 100` as a percentage, returning
/// `None` when the denominator is zero rather than dividing by it. Every
/// variance-percent computation in the detectors and trend module goes
/// through this helper (spec §9: "funnel through a single helper").
pub fn ratio_pct(numerator: Money, denominator: Money) -> Option<f64> {
    if denominator.is_zero() {
        return None;
    }
    let ratio = (numerator.0 - denominator.0) / denominator.0;
    Some((ratio * Decimal::from(100)).try_into().unwrap_or(0.0))
}

/// Percentage of `part` relative to `whole`, with the spec §4.9 zero-zero
/// convention: 0/0 -> 0%, nonzero/0 -> 100%.
pub fn share_pct(part: Money, whole: Money) -> f64 {
    if whole.is_zero() {
        return if part.is_zero() { 0.0 } else { 100.0 };
    }
    (part.0 / whole.0 * Decimal::from(100)).try_into().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_pct_zero_denominator_is_none() {
        assert_eq!(ratio_pct(Money::from_major_minor(10, 0), Money::ZERO), None);
    }

    #[test]
    fn ratio_pct_computes_percent_change() {
        let current = Money::from_major_minor(200_000, 0);
        let baseline = Money::from_major_minor(100_000, 0);
        let pct = ratio_pct(current, baseline).unwrap();
        assert!((pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn share_pct_zero_whole_zero_part_is_zero() {
        assert_eq!(share_pct(Money::ZERO, Money::ZERO), 0.0);
    }

    #[test]
    fn share_pct_zero_whole_nonzero_part_is_hundred() {
        assert_eq!(share_pct(Money::from_major_minor(5, 0), Money::ZERO), 100.0);
    }

    #[test]
    fn addition_is_exact() {
        let a = Money::from_major_minor(10, 10);
        let b = Money::from_major_minor(5, 5);
        assert_eq!(a + b, Money::from_major_minor(15, 15));
    }
}
