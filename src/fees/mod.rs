//! Fees
//!
//! A fee decides how much to charge once its rule's condition is met, and how
//! that charge is spread across basket lines.

use std::{fmt, sync::Arc};

use rust_decimal::Decimal;
use rusty_money::{Money, MoneyError, iso::Currency};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    basket::{Basket, BasketError},
    conditions::{Condition, ConditionError},
    money::{AmountError, RoundingPolicy},
    pricing::TotalPriceError,
    ranges::ProductRange,
    results::ApplicationResult,
    rules::RuleKey,
};

pub mod absolute;
pub mod allocation;
pub mod percentage;

pub use absolute::AbsoluteFee;
pub use percentage::PercentageFee;

/// Errors raised while applying a fee.
#[derive(Debug, Error)]
pub enum FeeError {
    /// Wrapped amount conversion error.
    #[error(transparent)]
    Amount(#[from] AmountError),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Wrapped line or basket total error.
    #[error(transparent)]
    TotalPrice(#[from] TotalPriceError),

    /// Wrapped basket annotation error.
    #[error(transparent)]
    Basket(#[from] BasketError),

    /// Wrapped condition evaluation error.
    #[error(transparent)]
    Condition(#[from] ConditionError),
}

/// Per-application options passed to a fee.
#[derive(Debug, Clone, Copy)]
pub struct FeeContext<'a> {
    /// Rule being applied
    pub rule: RuleKey,

    /// Rounding used for fee amounts and fragments
    pub rounding: RoundingPolicy,

    /// Explicit amount overriding the configured value
    pub fee_amount: Option<Money<'a, Currency>>,

    /// Upper bound on the amount charged by this application
    pub max_total_fee: Option<Money<'a, Currency>>,
}

impl<'a> FeeContext<'a> {
    /// Context with no overrides.
    pub const fn new(rule: RuleKey, rounding: RoundingPolicy) -> Self {
        Self {
            rule,
            rounding,
            fee_amount: None,
            max_total_fee: None,
        }
    }

    /// Clamp a proposed amount (in minor units) to `max_total_fee`.
    pub fn clamp(&self, amount: i64) -> i64 {
        self.max_total_fee
            .map_or(amount, |max| amount.min(max.to_minor_units()))
    }
}

/// Behaviour shared by every fee, built-in or custom.
pub trait FeeBehaviour: fmt::Debug + Send + Sync {
    /// Human-readable name in the given currency, e.g. "£5.00 fee on Shoes".
    fn name(&self, currency: &Currency) -> String;

    /// Longer description. Defaults to the name.
    fn description(&self, currency: &Currency) -> String {
        self.name(currency)
    }

    /// Charge the fee against the basket once.
    ///
    /// Returns an unsuccessful, non-final result when there is nothing to charge.
    ///
    /// # Errors
    ///
    /// Returns a [`FeeError`] on money arithmetic or basket annotation failures.
    fn apply<'a>(
        &self,
        basket: &mut Basket<'a>,
        condition: &Condition,
        context: &FeeContext<'a>,
    ) -> Result<ApplicationResult<'a>, FeeError>;
}

/// What a percentage fee is a percentage of.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentageBase {
    /// Unit price times affected quantity of the covered lines.
    #[default]
    CoveredLines,

    /// Undiscounted value of every selectable line in the condition range.
    RangeLines,

    /// Basket subtotal.
    BasketSubtotal,
}

/// A resolved fee.
#[derive(Debug, Clone)]
pub enum Fee {
    /// Percentage of a base amount
    Percentage(PercentageFee),

    /// Fixed amount
    Absolute(AbsoluteFee),

    /// Registry-resolved custom fee
    Custom(Arc<dyn FeeBehaviour>),
}

impl Fee {
    fn behaviour(&self) -> &dyn FeeBehaviour {
        match self {
            Fee::Percentage(percentage) => percentage,
            Fee::Absolute(absolute) => absolute,
            Fee::Custom(custom) => custom.as_ref(),
        }
    }

    /// See [`FeeBehaviour::name`].
    pub fn name(&self, currency: &Currency) -> String {
        self.behaviour().name(currency)
    }

    /// See [`FeeBehaviour::description`].
    pub fn description(&self, currency: &Currency) -> String {
        self.behaviour().description(currency)
    }

    /// See [`FeeBehaviour::apply`].
    ///
    /// # Errors
    ///
    /// Returns a [`FeeError`] on money arithmetic or basket annotation failures.
    pub fn apply<'a>(
        &self,
        basket: &mut Basket<'a>,
        condition: &Condition,
        context: &FeeContext<'a>,
    ) -> Result<ApplicationResult<'a>, FeeError> {
        self.behaviour().apply(basket, condition, context)
    }
}

/// Unresolved fee configuration.
///
/// `proxy_class` takes precedence over `kind` when both are set.
#[derive(Debug, Clone, Default)]
pub struct FeeRecord {
    /// Built-in kind: `percentage` or `absolute`
    pub kind: Option<String>,

    /// Product range named in the fee description
    pub range: Option<Arc<ProductRange>>,

    /// Percentage points or major-unit amount
    pub value: Option<Decimal>,

    /// Base for percentage fees
    pub percentage_base: PercentageBase,

    /// Registered custom class name
    pub proxy_class: Option<String>,
}

pub(crate) fn range_label(range: Option<&ProductRange>) -> &str {
    range.map_or("basket", ProductRange::name)
}
