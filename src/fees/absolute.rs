//! Absolute Fee

use std::sync::Arc;

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};

use crate::{
    basket::Basket,
    conditions::Condition,
    fees::{
        FeeBehaviour, FeeContext, FeeError,
        allocation::{charge_lines, cover_lines},
        range_label,
    },
    money::{RoundingPolicy, major_to_minor},
    ranges::ProductRange,
    results::ApplicationResult,
};

/// Charges a fixed amount, split across the covered lines.
#[derive(Debug, Clone)]
pub struct AbsoluteFee {
    range: Option<Arc<ProductRange>>,
    value: Decimal,
}

impl AbsoluteFee {
    /// Create a new absolute fee of `value` major units.
    pub fn new(range: Option<Arc<ProductRange>>, value: Decimal) -> Self {
        Self { range, value }
    }

    /// Configured amount in major units
    pub fn value(&self) -> Decimal {
        self.value
    }
}

impl FeeBehaviour for AbsoluteFee {
    fn name(&self, currency: &Currency) -> String {
        let amount = major_to_minor(self.value, currency, RoundingPolicy::Down)
            .map_or_else(|_err| self.value.to_string(), |minor| {
                Money::from_minor(minor, currency).to_string()
            });

        format!("{amount} fee on {}", range_label(self.range.as_deref()))
    }

    #[tracing::instrument(
        name = "fees.absolute.apply",
        skip(self, basket, condition, context),
        fields(value = %self.value),
        err
    )]
    fn apply<'a>(
        &self,
        basket: &mut Basket<'a>,
        condition: &Condition,
        context: &FeeContext<'a>,
    ) -> Result<ApplicationResult<'a>, FeeError> {
        let currency = basket.currency();

        let proposed = match context.fee_amount {
            Some(amount) => amount.to_minor_units(),
            None => major_to_minor(self.value, currency, context.rounding)?,
        };

        let amount = context.clamp(proposed);

        if amount <= 0 {
            return Ok(ApplicationResult::zero(currency));
        }

        let covered = cover_lines(basket, condition);

        if covered.is_empty() {
            return Ok(ApplicationResult::zero(currency));
        }

        let result = charge_lines(basket, &covered, amount, context)?;
        let description = format!(
            "{} fee on {}",
            result.amount,
            range_label(self.range.as_deref())
        );

        Ok(result.with_description(description))
    }
}
