//! Prices

use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::basket::Line;

/// Errors that can occur while calculating line or basket totals.
#[derive(Debug, Error, PartialEq)]
pub enum TotalPriceError {
    /// Unit price multiplied by quantity overflowed.
    #[error("line price overflowed")]
    Overflow,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Price of `quantity` units at `unit_price`.
///
/// # Errors
///
/// Returns [`TotalPriceError::Overflow`] if the multiplication overflows.
pub fn extended_price<'a>(
    unit_price: &Money<'a, Currency>,
    quantity: u32,
) -> Result<Money<'a, Currency>, TotalPriceError> {
    let minor = unit_price
        .to_minor_units()
        .checked_mul(i64::from(quantity))
        .ok_or(TotalPriceError::Overflow)?;

    Ok(Money::from_minor(minor, unit_price.currency()))
}

/// Calculates the total price of a list of lines
///
/// # Errors
///
/// - [`TotalPriceError::Overflow`]: a line price overflowed.
/// - [`TotalPriceError::Money`]: Wrapped money arithmetic or currency mismatch error.
pub fn total_price<'a>(
    lines: &[Line<'a>],
    currency: &'a Currency,
) -> Result<Money<'a, Currency>, TotalPriceError> {
    lines
        .iter()
        .try_fold(Money::from_minor(0, currency), |acc, line| {
            Ok(acc.add(line.line_price()?)?)
        })
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use crate::products::ProductKey;

    use super::*;

    #[test]
    fn extended_price_multiplies_by_quantity() -> TestResult {
        let price = extended_price(&Money::from_minor(125, GBP), 4)?;

        assert_eq!(price, Money::from_minor(500, GBP));

        Ok(())
    }

    #[test]
    fn extended_price_overflow_returns_error() {
        let result = extended_price(&Money::from_minor(i64::MAX, GBP), 2);

        assert_eq!(result, Err(TotalPriceError::Overflow));
    }

    #[test]
    fn test_total_price() -> TestResult {
        let lines = [
            Line::new(ProductKey::default(), Money::from_minor(100, GBP), 2),
            Line::new(ProductKey::default(), Money::from_minor(250, GBP), 1),
        ];

        assert_eq!(total_price(&lines, GBP)?, Money::from_minor(450, GBP));

        Ok(())
    }

    #[test]
    fn test_total_price_empty_is_zero() -> TestResult {
        let lines: [Line<'static>; 0] = [];

        assert_eq!(total_price(&lines, GBP)?, Money::from_minor(0, GBP));

        Ok(())
    }

    #[test]
    fn test_total_price_currency_mismatch() {
        let lines = [Line::new(ProductKey::default(), Money::from_minor(100, USD), 1)];

        assert!(matches!(
            total_price(&lines, GBP),
            Err(TotalPriceError::Money(_))
        ));
    }
}
