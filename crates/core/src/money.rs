//! Fixed-point monetary amounts.
//!
//! All ledger math uses exact decimal arithmetic at scale 4; floating point
//! never touches a monetary value. Presentation rounding (2 digits,
//! round-half-to-even) happens only at the boundary via [`Money::rounded`].

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DomainError;

/// A signed monetary amount with exactly 4 decimal places of precision.
///
/// Positive amounts are debits, negative amounts are credits (posting
/// convention). Equality is exact: balancing checks compare against
/// [`Money::ZERO`] with no tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Money(Decimal);

impl Money {
    /// Internal scale carried by every amount.
    pub const SCALE: u32 = 4;

    pub const ZERO: Self = Money(Decimal::ZERO);

    /// Normalize an arbitrary decimal to ledger scale.
    pub fn new(value: Decimal) -> Self {
        let mut normalized = value;
        normalized.rescale(Self::SCALE);
        Money(normalized)
    }

    /// Amount from a whole number of currency units (e.g. dollars).
    pub fn from_major(units: i64) -> Self {
        Self::new(Decimal::from(units))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Presentation value: 2 decimal places, round-half-to-even.
    ///
    /// Never used internally; balancing always compares unrounded amounts.
    pub fn rounded(&self) -> Decimal {
        self.0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation(format!("amount '{s}': {e}")))?;
        Ok(Money::new(decimal))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Money::new(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Money::new(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Money::new(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:.4}", self.0))
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Money::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn normalizes_to_scale_four() {
        assert_eq!(money("1.5").to_string(), "1.5000");
        assert_eq!(money("  2.25  ").to_string(), "2.2500");
        assert_eq!(money("-3").to_string(), "-3.0000");
    }

    #[test]
    fn exact_zero_comparison_rejects_residuals() {
        let residual = money("0.0001");
        assert!(!residual.is_zero());
        assert!((residual - residual).is_zero());
    }

    #[test]
    fn negation_is_involutive() {
        let amount = money("1500.00");
        assert_eq!(-(-amount), amount);
        assert!((amount + -amount).is_zero());
    }

    #[test]
    fn ten_thousand_cents_sum_exactly() {
        let cent = money("0.01");
        let total: Money = std::iter::repeat(cent).take(10_000).sum();
        assert_eq!(total, money("100.0000"));
    }

    #[test]
    fn presentation_rounds_half_to_even() {
        assert_eq!(money("1.005").rounded().to_string(), "1.00");
        assert_eq!(money("1.015").rounded().to_string(), "1.02");
        assert_eq!(money("2.675").rounded().to_string(), "2.68");
    }

    #[test]
    fn serde_round_trips_as_string() {
        let amount = money("15.00");
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"15.0000\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    proptest! {
        /// Summation order never changes an exact decimal total.
        #[test]
        fn sum_is_order_independent(cents in prop::collection::vec(-100_000i64..100_000i64, 1..50)) {
            let amounts: Vec<Money> = cents
                .iter()
                .map(|c| Money::new(Decimal::new(*c, 2)))
                .collect();

            let forward: Money = amounts.iter().sum();
            let mut reversed = amounts.clone();
            reversed.reverse();
            let backward: Money = reversed.iter().sum();

            prop_assert_eq!(forward, backward);
        }
    }
}
