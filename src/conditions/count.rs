//! Count Condition

use std::sync::Arc;

use num_traits::ToPrimitive;
use rust_decimal::Decimal;

use crate::{
    basket::Basket,
    conditions::{ConditionBehaviour, ConditionError, plural, qualifying_lines},
    ranges::ProductRange,
};

/// Satisfied once the basket holds at least `value` undiscounted units from the range.
#[derive(Debug, Clone)]
pub struct CountCondition {
    range: Arc<ProductRange>,
    value: Decimal,
}

impl CountCondition {
    /// Create a new count condition.
    pub fn new(range: Arc<ProductRange>, value: Decimal) -> Self {
        Self { range, value }
    }

    /// Undiscounted units in the range.
    pub fn units(&self, basket: &Basket<'_>) -> u64 {
        qualifying_lines(basket, &self.range)
            .map(|line| u64::from(line.quantity_without_discount()))
            .sum()
    }

    fn shortfall(&self, units: u64) -> u64 {
        (self.value - Decimal::from(units))
            .ceil()
            .to_u64()
            .unwrap_or_default()
    }
}

impl ConditionBehaviour for CountCondition {
    fn name(&self) -> String {
        let count = self.value.floor().to_u64().unwrap_or_default();

        format!(
            "Basket includes {count} item{} from {}",
            plural(count),
            self.range.name()
        )
    }

    fn range(&self) -> Option<&ProductRange> {
        Some(&self.range)
    }

    fn value(&self) -> Decimal {
        self.value
    }

    fn is_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError> {
        Ok(Decimal::from(self.units(basket)) >= self.value)
    }

    fn is_partially_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError> {
        let units = self.units(basket);

        Ok(units > 0 && Decimal::from(units) < self.value)
    }

    fn upsell_message(&self, basket: &Basket<'_>) -> Result<Option<String>, ConditionError> {
        let delta = self.shortfall(self.units(basket));

        if delta == 0 {
            return Ok(None);
        }

        Ok(Some(format!(
            "Buy {delta} more product{} from {}",
            plural(delta),
            self.range.name()
        )))
    }
}
