//! Money & Rounding
//!
//! Quantization of fractional currency amounts to the minor unit of a currency.
//! All fee arithmetic happens in minor units (`i64`) and is only lifted back into
//! [`Money`] once an amount has been rounded with a [`RoundingPolicy`].

use decimal_percentage::Percentage;
use num_traits::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while converting or rounding amounts.
#[derive(Debug, Error, PartialEq)]
pub enum AmountError {
    /// The amount could not be represented in minor units.
    #[error("amount overflowed or could not be represented in minor units")]
    Overflow,

    /// A proportional split was requested over zero units.
    #[error("cannot split an amount over zero units")]
    ZeroDenominator,
}

/// How fractional minor units are rounded.
///
/// The default truncates toward zero, so intermediate fee fragments never exceed
/// their exact share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Truncate toward zero.
    #[default]
    Down,

    /// Round half away from zero.
    HalfUp,

    /// Round half to even (banker's rounding).
    HalfEven,

    /// Round away from zero.
    Up,
}

impl RoundingPolicy {
    /// The equivalent `rust_decimal` strategy.
    #[must_use]
    pub const fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingPolicy::Down => RoundingStrategy::ToZero,
            RoundingPolicy::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingPolicy::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingPolicy::Up => RoundingStrategy::AwayFromZero,
        }
    }

    /// Round an amount expressed in (fractional) minor units to a whole minor unit.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] if the rounded value does not fit in an `i64`.
    pub fn round_minor(self, minor: Decimal) -> Result<i64, AmountError> {
        minor
            .round_dp_with_strategy(0, self.strategy())
            .to_i64()
            .ok_or(AmountError::Overflow)
    }

    /// Quantize a major-unit amount to the precision of `currency`.
    pub fn quantize(self, amount: Decimal, currency: &Currency) -> Decimal {
        amount.round_dp_with_strategy(currency.exponent, self.strategy())
    }
}

/// Number of minor units in one major unit of `currency`.
fn minor_scale(currency: &Currency) -> Result<Decimal, AmountError> {
    10_i64
        .checked_pow(currency.exponent)
        .map(Decimal::from)
        .ok_or(AmountError::Overflow)
}

/// Convert a major-unit amount (e.g. `2.50`) into minor units (e.g. `250`).
///
/// # Errors
///
/// Returns [`AmountError::Overflow`] if the amount cannot be represented.
pub fn major_to_minor(
    amount: Decimal,
    currency: &Currency,
    rounding: RoundingPolicy,
) -> Result<i64, AmountError> {
    let scaled = amount
        .checked_mul(minor_scale(currency)?)
        .ok_or(AmountError::Overflow)?;

    rounding.round_minor(scaled)
}

/// Convert minor units back into a major-unit decimal.
pub fn minor_to_major(minor: i64, currency: &Currency) -> Decimal {
    Decimal::new(minor, currency.exponent)
}

/// Build a [`Money`] value from a major-unit decimal.
///
/// # Errors
///
/// Returns [`AmountError::Overflow`] if the amount cannot be represented.
pub fn money_from_major<'a>(
    amount: Decimal,
    currency: &'a Currency,
    rounding: RoundingPolicy,
) -> Result<Money<'a, Currency>, AmountError> {
    Ok(Money::from_minor(
        major_to_minor(amount, currency, rounding)?,
        currency,
    ))
}

/// Share of `total_minor` proportional to `part / whole`, rounded to a minor unit.
///
/// # Errors
///
/// - [`AmountError::ZeroDenominator`] when `whole` is zero.
/// - [`AmountError::Overflow`] when the intermediate product cannot be represented.
pub fn proportion_of_minor(
    total_minor: i64,
    part: u64,
    whole: u64,
    rounding: RoundingPolicy,
) -> Result<i64, AmountError> {
    if whole == 0 {
        return Err(AmountError::ZeroDenominator);
    }

    let share = Decimal::from(total_minor)
        .checked_mul(Decimal::from(part))
        .and_then(|value| value.checked_div(Decimal::from(whole)))
        .ok_or(AmountError::Overflow)?;

    rounding.round_minor(share)
}

/// Percentage of a minor-unit amount, rounded to a minor unit.
///
/// # Errors
///
/// Returns [`AmountError::Overflow`] if the calculation cannot be represented.
pub fn percent_of_minor(
    percent: &Percentage,
    minor: i64,
    rounding: RoundingPolicy,
) -> Result<i64, AmountError> {
    // decimal_percentage doesn't expose the underlying Decimal
    let applied = ((*percent) * Decimal::ONE)
        .checked_mul(Decimal::from(minor))
        .ok_or(AmountError::Overflow)?;

    rounding.round_minor(applied)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rusty_money::iso::{GBP, JPY};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn default_policy_truncates() -> TestResult {
        assert_eq!(RoundingPolicy::default(), RoundingPolicy::Down);
        assert_eq!(RoundingPolicy::Down.round_minor(Decimal::from_str("333.99")?)?, 333);
        assert_eq!(RoundingPolicy::Down.round_minor(Decimal::from_str("-1.5")?)?, -1);

        Ok(())
    }

    #[test]
    fn other_policies_round_as_named() -> TestResult {
        let half = Decimal::from_str("2.5")?;

        assert_eq!(RoundingPolicy::HalfUp.round_minor(half)?, 3);
        assert_eq!(RoundingPolicy::HalfEven.round_minor(half)?, 2);
        assert_eq!(RoundingPolicy::Up.round_minor(Decimal::from_str("2.01")?)?, 3);

        Ok(())
    }

    #[test]
    fn quantize_uses_currency_exponent() -> TestResult {
        let amount = Decimal::from_str("1.999")?;

        assert_eq!(
            RoundingPolicy::Down.quantize(amount, GBP),
            Decimal::from_str("1.99")?
        );
        assert_eq!(RoundingPolicy::Down.quantize(amount, JPY), Decimal::ONE);

        Ok(())
    }

    #[test]
    fn major_and_minor_conversions() -> TestResult {
        assert_eq!(
            major_to_minor(Decimal::from_str("2.50")?, GBP, RoundingPolicy::Down)?,
            250
        );
        assert_eq!(
            major_to_minor(Decimal::from_str("0.019")?, GBP, RoundingPolicy::Down)?,
            1
        );
        assert_eq!(minor_to_major(250, GBP), Decimal::from_str("2.50")?);

        let money = money_from_major(Decimal::from_str("5")?, GBP, RoundingPolicy::Down)?;

        assert_eq!(money, Money::from_minor(500, GBP));

        Ok(())
    }

    #[test]
    fn major_to_minor_overflow_returns_error() {
        let result = major_to_minor(Decimal::MAX, GBP, RoundingPolicy::Down);

        assert_eq!(result, Err(AmountError::Overflow));
    }

    #[test]
    fn proportion_of_minor_rounds_down_by_default() -> TestResult {
        assert_eq!(proportion_of_minor(1000, 1, 3, RoundingPolicy::Down)?, 333);
        assert_eq!(proportion_of_minor(1000, 2, 3, RoundingPolicy::HalfUp)?, 667);

        Ok(())
    }

    #[test]
    fn proportion_of_minor_rejects_zero_denominator() {
        let result = proportion_of_minor(1000, 1, 0, RoundingPolicy::Down);

        assert_eq!(result, Err(AmountError::ZeroDenominator));
    }

    #[test]
    fn percent_of_minor_calculates_correctly() -> TestResult {
        let percent = Percentage::from(0.125);

        assert_eq!(percent_of_minor(&percent, 999, RoundingPolicy::Down)?, 124);
        assert_eq!(percent_of_minor(&percent, 999, RoundingPolicy::HalfUp)?, 125);

        Ok(())
    }

    #[test]
    fn percent_of_minor_overflow_returns_error() {
        let percent = Percentage::from(2.0);
        let result = percent_of_minor(&percent, i64::MAX, RoundingPolicy::Down);

        assert_eq!(result, Err(AmountError::Overflow));
    }
}
