//! Value Condition

use std::sync::Arc;

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};

use crate::{
    basket::Basket,
    conditions::{ConditionBehaviour, ConditionError, qualifying_lines},
    money::{AmountError, RoundingPolicy, major_to_minor, minor_to_major},
    ranges::ProductRange,
};

/// Satisfied once undiscounted units from the range are worth at least `value`
/// (major units of the basket currency).
#[derive(Debug, Clone)]
pub struct ValueCondition {
    range: Arc<ProductRange>,
    value: Decimal,
}

impl ValueCondition {
    /// Create a new value condition.
    pub fn new(range: Arc<ProductRange>, value: Decimal) -> Self {
        Self { range, value }
    }

    /// Value of the undiscounted units in range, in minor units.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] if the total cannot be represented.
    pub fn value_in_range_minor(&self, basket: &Basket<'_>) -> Result<i64, AmountError> {
        qualifying_lines(basket, &self.range).try_fold(0_i64, |acc, line| {
            line.unit_effective_price()
                .to_minor_units()
                .checked_mul(i64::from(line.quantity_without_discount()))
                .and_then(|value| acc.checked_add(value))
                .ok_or(AmountError::Overflow)
        })
    }

    fn value_in_range(&self, basket: &Basket<'_>) -> Result<Decimal, AmountError> {
        Ok(minor_to_major(
            self.value_in_range_minor(basket)?,
            basket.currency(),
        ))
    }

    fn shortfall<'a>(
        &self,
        basket: &Basket<'a>,
        currency: &'a Currency,
    ) -> Result<Money<'a, Currency>, AmountError> {
        let threshold = major_to_minor(self.value, currency, RoundingPolicy::Up)?;
        let current = self.value_in_range_minor(basket)?;

        Ok(Money::from_minor(
            threshold.saturating_sub(current).max(0),
            currency,
        ))
    }
}

impl ConditionBehaviour for ValueCondition {
    fn name(&self) -> String {
        format!("Basket includes {} from {}", self.value, self.range.name())
    }

    fn range(&self) -> Option<&ProductRange> {
        Some(&self.range)
    }

    fn value(&self) -> Decimal {
        self.value
    }

    fn is_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError> {
        Ok(self.value_in_range(basket)? >= self.value)
    }

    fn is_partially_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError> {
        let value = self.value_in_range(basket)?;

        Ok(value > Decimal::ZERO && value < self.value)
    }

    fn upsell_message(&self, basket: &Basket<'_>) -> Result<Option<String>, ConditionError> {
        let delta = self.shortfall(basket, basket.currency())?;

        if delta.to_minor_units() == 0 {
            return Ok(None);
        }

        Ok(Some(format!(
            "Spend {delta} more from {}",
            self.range.name()
        )))
    }
}
