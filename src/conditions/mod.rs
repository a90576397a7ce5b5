//! Conditions
//!
//! A condition is a predicate over a basket, parameterised by a product range
//! and a threshold value. The built-in kinds cover unit counts, line value and
//! distinct-line coverage; anything else is a [`ConditionBehaviour`] resolved
//! through the [`ProxyRegistry`](crate::registry::ProxyRegistry).

use std::{fmt, sync::Arc};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    basket::{Basket, Line},
    lines::is_selectable,
    money::AmountError,
    ranges::ProductRange,
};

pub mod count;
pub mod coverage;
pub mod value;

pub use count::CountCondition;
pub use coverage::CoverageCondition;
pub use value::ValueCondition;

/// Errors raised while evaluating a condition.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// Wrapped amount conversion error.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Behaviour shared by every condition, built-in or custom.
pub trait ConditionBehaviour: fmt::Debug + Send + Sync {
    /// Human-readable name, e.g. "Basket includes 3 items from Shoes".
    fn name(&self) -> String;

    /// Range of products this condition inspects.
    fn range(&self) -> Option<&ProductRange>;

    /// Threshold value.
    fn value(&self) -> Decimal;

    /// Whether the basket meets the threshold.
    ///
    /// # Errors
    ///
    /// Returns a [`ConditionError`] if the basket could not be measured.
    fn is_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError>;

    /// Whether the basket has made some, but not enough, progress toward the threshold.
    ///
    /// # Errors
    ///
    /// Returns a [`ConditionError`] if the basket could not be measured.
    fn is_partially_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError>;

    /// Message telling the customer what else is needed, if anything.
    ///
    /// # Errors
    ///
    /// Returns a [`ConditionError`] if the basket could not be measured.
    fn upsell_message(&self, basket: &Basket<'_>) -> Result<Option<String>, ConditionError>;

    /// Whether fees charge at most one unit per line (coverage semantics).
    fn affects_one_unit_per_line(&self) -> bool {
        false
    }
}

/// A resolved condition.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Unit count threshold
    Count(CountCondition),

    /// Line value threshold
    Value(ValueCondition),

    /// Distinct line threshold
    Coverage(CoverageCondition),

    /// Registry-resolved custom condition
    Custom(Arc<dyn ConditionBehaviour>),
}

impl Condition {
    fn behaviour(&self) -> &dyn ConditionBehaviour {
        match self {
            Condition::Count(count) => count,
            Condition::Value(value) => value,
            Condition::Coverage(coverage) => coverage,
            Condition::Custom(custom) => custom.as_ref(),
        }
    }

    /// Human-readable name
    pub fn name(&self) -> String {
        self.behaviour().name()
    }

    /// Range of products this condition inspects
    pub fn range(&self) -> Option<&ProductRange> {
        self.behaviour().range()
    }

    /// Threshold value
    pub fn value(&self) -> Decimal {
        self.behaviour().value()
    }

    /// See [`ConditionBehaviour::is_satisfied`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConditionError`] if the basket could not be measured.
    pub fn is_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError> {
        self.behaviour().is_satisfied(basket)
    }

    /// See [`ConditionBehaviour::is_partially_satisfied`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConditionError`] if the basket could not be measured.
    pub fn is_partially_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError> {
        self.behaviour().is_partially_satisfied(basket)
    }

    /// See [`ConditionBehaviour::upsell_message`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConditionError`] if the basket could not be measured.
    pub fn upsell_message(&self, basket: &Basket<'_>) -> Result<Option<String>, ConditionError> {
        self.behaviour().upsell_message(basket)
    }

    /// See [`ConditionBehaviour::affects_one_unit_per_line`].
    pub fn affects_one_unit_per_line(&self) -> bool {
        self.behaviour().affects_one_unit_per_line()
    }
}

/// Unresolved condition configuration.
///
/// `proxy_class` takes precedence over `kind` when both are set.
#[derive(Debug, Clone, Default)]
pub struct ConditionRecord {
    /// Built-in kind: `count`, `value` or `coverage`
    pub kind: Option<String>,

    /// Product range
    pub range: Option<Arc<ProductRange>>,

    /// Threshold value
    pub value: Option<Decimal>,

    /// Registered custom class name
    pub proxy_class: Option<String>,
}

/// Lines that count toward a condition over `range`.
pub(crate) fn qualifying_lines<'b, 'a>(
    basket: &'b Basket<'a>,
    range: &'b ProductRange,
) -> impl Iterator<Item = &'b Line<'a>> + 'b {
    basket.iter().filter(move |line| is_selectable(range, line))
}

/// "s" when `count` is anything but one.
pub(crate) fn plural(count: u64) -> &'static str {
    if count == 1 { "" } else { "s" }
}
