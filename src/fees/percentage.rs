//! Percentage Fee

use std::sync::Arc;

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::iso::Currency;

use crate::{
    basket::Basket,
    conditions::Condition,
    fees::{
        FeeBehaviour, FeeContext, FeeError, PercentageBase,
        allocation::{CoveredLine, charge_lines, cover_lines},
        range_label,
    },
    lines::select_lines,
    money::{AmountError, percent_of_minor},
    pricing::extended_price,
    ranges::ProductRange,
    results::ApplicationResult,
};

/// Charges a percentage of a base amount, split across the covered lines.
#[derive(Debug, Clone)]
pub struct PercentageFee {
    range: Option<Arc<ProductRange>>,
    value: Decimal,
    rate: Percentage,
    base: PercentageBase,
}

impl PercentageFee {
    /// Create a new percentage fee of `value` percentage points.
    pub fn new(range: Option<Arc<ProductRange>>, value: Decimal, base: PercentageBase) -> Self {
        Self {
            range,
            value,
            rate: Percentage::from(value / Decimal::ONE_HUNDRED),
            base,
        }
    }

    /// Configured percentage points
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Base the percentage is taken of
    pub fn base(&self) -> PercentageBase {
        self.base
    }

    fn base_minor(
        &self,
        basket: &Basket<'_>,
        condition: &Condition,
        covered: &[CoveredLine<'_>],
    ) -> Result<i64, FeeError> {
        match self.base {
            PercentageBase::CoveredLines => covered.iter().try_fold(0_i64, |acc, line| -> Result<i64, FeeError> {
                let value = extended_price(&line.unit_price, line.quantity)?.to_minor_units();

                Ok(acc.checked_add(value).ok_or(AmountError::Overflow)?)
            }),
            PercentageBase::RangeLines => {
                let Some(range) = condition.range() else {
                    return Ok(0);
                };

                select_lines(basket, range)
                    .iter()
                    .try_fold(0_i64, |acc, (unit_price, index)| -> Result<i64, FeeError> {
                        let line = basket.get_line(*index)?;
                        let value = extended_price(unit_price, line.quantity_without_discount())?
                            .to_minor_units();

                        Ok(acc.checked_add(value).ok_or(AmountError::Overflow)?)
                    })
            }
            PercentageBase::BasketSubtotal => Ok(basket.subtotal()?.to_minor_units()),
        }
    }
}

impl FeeBehaviour for PercentageFee {
    fn name(&self, _currency: &Currency) -> String {
        format!(
            "{}% fee on {}",
            self.value.normalize(),
            range_label(self.range.as_deref())
        )
    }

    #[tracing::instrument(
        name = "fees.percentage.apply",
        skip(self, basket, condition, context),
        fields(value = %self.value, base = ?self.base),
        err
    )]
    fn apply<'a>(
        &self,
        basket: &mut Basket<'a>,
        condition: &Condition,
        context: &FeeContext<'a>,
    ) -> Result<ApplicationResult<'a>, FeeError> {
        let currency = basket.currency();
        let covered = cover_lines(basket, condition);

        if covered.is_empty() {
            return Ok(ApplicationResult::zero(currency));
        }

        let proposed = match context.fee_amount {
            Some(amount) => amount.to_minor_units(),
            None => percent_of_minor(
                &self.rate,
                self.base_minor(basket, condition, &covered)?,
                context.rounding,
            )?,
        };

        let amount = context.clamp(proposed);

        if amount <= 0 {
            return Ok(ApplicationResult::zero(currency));
        }

        let description = format!(
            "{}% fee on {}",
            self.value.normalize(),
            range_label(self.range.as_deref())
        );

        Ok(charge_lines(basket, &covered, amount, context)?.with_description(description))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rusty_money::{Money, iso::GBP};
    use testresult::TestResult;

    use crate::{basket::Line, conditions::CountCondition, products::ProductKey, rules::RuleKey};

    use super::*;

    fn everything() -> Arc<ProductRange> {
        Arc::new(ProductRange::all_products("Everything"))
    }

    fn basket<'a>() -> Result<Basket<'a>, crate::basket::BasketError> {
        Basket::with_lines(
            [
                Line::new(ProductKey::default(), Money::from_minor(1000, GBP), 1),
                Line::new(ProductKey::default(), Money::from_minor(333, GBP), 3),
                Line::new(ProductKey::default(), Money::from_minor(5000, GBP), 1),
            ],
            GBP,
        )
    }

    fn condition(value: i64) -> Condition {
        Condition::Count(CountCondition::new(everything(), Decimal::from(value)))
    }

    #[test]
    fn name_shows_percentage_points() -> TestResult {
        let fee = PercentageFee::new(
            Some(everything()),
            Decimal::from_str("12.50")?,
            PercentageBase::default(),
        );

        assert_eq!(fee.name(GBP), "12.5% fee on Everything");

        Ok(())
    }

    #[test]
    fn covered_lines_base() -> TestResult {
        let mut basket = basket()?;
        let fee = PercentageFee::new(None, Decimal::from(10), PercentageBase::CoveredLines);
        let context = FeeContext::new(RuleKey::default(), crate::money::RoundingPolicy::Down);

        // Covers the 3 x £3.33 line (999) then the £10.00 line: base 1999, fee 199.
        let result = fee.apply(&mut basket, &condition(4), &context)?;

        assert_eq!(result.amount, Money::from_minor(199, GBP));
        assert_eq!(result.description.as_deref(), Some("10% fee on basket"));

        let line_fees = basket
            .iter()
            .map(|line| line.fee_amount().to_minor_units())
            .sum::<i64>();

        assert_eq!(line_fees, 199);
        assert_eq!(basket.get_line(2)?.fee_amount(), &Money::from_minor(0, GBP));

        Ok(())
    }

    #[test]
    fn basket_subtotal_base() -> TestResult {
        let mut basket = basket()?;
        let fee = PercentageFee::new(None, Decimal::from(10), PercentageBase::BasketSubtotal);
        let context = FeeContext::new(RuleKey::default(), crate::money::RoundingPolicy::Down);

        let result = fee.apply(&mut basket, &condition(1), &context)?;

        // Subtotal 6999, 10% truncated.
        assert_eq!(result.amount, Money::from_minor(699, GBP));

        Ok(())
    }

    #[test]
    fn range_lines_base() -> TestResult {
        let mut basket = basket()?;
        let fee = PercentageFee::new(None, Decimal::from(50), PercentageBase::RangeLines);
        let context = FeeContext::new(RuleKey::default(), crate::money::RoundingPolicy::Down);

        let result = fee.apply(&mut basket, &condition(1), &context)?;

        assert_eq!(result.amount, Money::from_minor(3499, GBP));

        Ok(())
    }

    #[test]
    fn zero_percent_is_zero_result() -> TestResult {
        let mut basket = basket()?;
        let fee = PercentageFee::new(None, Decimal::ZERO, PercentageBase::CoveredLines);
        let context = FeeContext::new(RuleKey::default(), crate::money::RoundingPolicy::Down);

        let result = fee.apply(&mut basket, &condition(1), &context)?;

        assert!(!result.is_successful());
        assert!(basket.applied_fees().is_empty());

        Ok(())
    }
}
