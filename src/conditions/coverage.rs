//! Coverage Condition

use std::sync::Arc;

use num_traits::ToPrimitive;
use rust_decimal::Decimal;

use crate::{
    basket::Basket,
    conditions::{ConditionBehaviour, ConditionError, plural, qualifying_lines},
    ranges::ProductRange,
};

/// Satisfied once at least `value` distinct lines from the range are present.
///
/// Fees triggered by a coverage condition charge one unit per covered line.
#[derive(Debug, Clone)]
pub struct CoverageCondition {
    range: Arc<ProductRange>,
    value: Decimal,
}

impl CoverageCondition {
    /// Create a new coverage condition.
    pub fn new(range: Arc<ProductRange>, value: Decimal) -> Self {
        Self { range, value }
    }

    /// Number of distinct qualifying lines.
    pub fn covered(&self, basket: &Basket<'_>) -> u64 {
        qualifying_lines(basket, &self.range).count() as u64
    }
}

impl ConditionBehaviour for CoverageCondition {
    fn name(&self) -> String {
        let count = self.value.floor().to_u64().unwrap_or_default();

        format!(
            "Basket includes {count} distinct item{} from {}",
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
        Ok(Decimal::from(self.covered(basket)) >= self.value)
    }

    fn is_partially_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError> {
        let covered = self.covered(basket);

        Ok(covered > 0 && Decimal::from(covered) < self.value)
    }

    fn upsell_message(&self, basket: &Basket<'_>) -> Result<Option<String>, ConditionError> {
        let delta = (self.value - Decimal::from(self.covered(basket)))
            .ceil()
            .to_u64()
            .unwrap_or_default();

        if delta == 0 {
            return Ok(None);
        }

        Ok(Some(format!(
            "Buy {delta} more product{} from {}",
            plural(delta),
            self.range.name()
        )))
    }

    fn affects_one_unit_per_line(&self) -> bool {
        true
    }
}
