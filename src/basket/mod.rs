//! Basket
//!
//! Baskets own their lines. Fee evaluation never adds or removes lines; it only
//! writes the transient fee annotations on lines and on the basket itself.

use rusty_money::{Money, MoneyError, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    ledger::FeeApplications,
    pricing::{TotalPriceError, extended_price, total_price},
    products::{ProductKey, normalise_tags},
    rules::RuleKey,
};

/// Errors related to basket construction or annotation.
#[derive(Debug, Error)]
pub enum BasketError {
    /// A line's currency differs from the basket currency (index, line currency, basket currency).
    #[error("Line {0} has currency {1}, but basket has currency {2}")]
    CurrencyMismatch(usize, &'static str, &'static str),

    /// A line was not found in the basket.
    #[error("Line {0} not found")]
    LineNotFound(usize),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// One basket entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Line<'a> {
    product: ProductKey,
    tags: SmallVec<[String; 5]>,
    quantity: u32,
    unit_effective_price: Money<'a, Currency>,
    discounted_quantity: u32,
    fee_amount: Money<'a, Currency>,
    fee_quantity: u32,
}

impl<'a> Line<'a> {
    /// Create a new line with no tags.
    pub fn new(product: ProductKey, unit_effective_price: Money<'a, Currency>, quantity: u32) -> Self {
        Self {
            product,
            tags: SmallVec::new(),
            quantity,
            unit_effective_price,
            discounted_quantity: 0,
            fee_amount: Money::from_minor(0, unit_effective_price.currency()),
            fee_quantity: 0,
        }
    }

    /// Set the product tags used for range matching.
    #[must_use]
    pub fn with_tags<'t>(mut self, tags: impl IntoIterator<Item = &'t str>) -> Self {
        self.tags = normalise_tags(tags);
        self
    }

    /// Mark `quantity` units as already consumed by other discounts.
    #[must_use]
    pub fn with_discounted_quantity(mut self, quantity: u32) -> Self {
        self.discounted_quantity = quantity.min(self.quantity);
        self
    }

    /// Product on this line
    pub fn product(&self) -> ProductKey {
        self.product
    }

    /// Product tags
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Number of units
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unit price after any other discounts
    pub fn unit_effective_price(&self) -> &Money<'a, Currency> {
        &self.unit_effective_price
    }

    /// Units not already consumed by other discounts.
    pub fn quantity_without_discount(&self) -> u32 {
        self.quantity.saturating_sub(self.discounted_quantity)
    }

    /// Unit price multiplied by quantity.
    ///
    /// # Errors
    ///
    /// Returns [`TotalPriceError::Overflow`] if the multiplication overflows.
    pub fn line_price(&self) -> Result<Money<'a, Currency>, TotalPriceError> {
        extended_price(&self.unit_effective_price, self.quantity)
    }

    /// Total fee charged against this line in the current evaluation pass.
    pub fn fee_amount(&self) -> &Money<'a, Currency> {
        &self.fee_amount
    }

    /// Units charged a fee in the current evaluation pass.
    pub fn fee_quantity(&self) -> u32 {
        self.fee_quantity
    }

    fn add_fee(&mut self, fragment: Money<'a, Currency>, quantity: u32) -> Result<(), MoneyError> {
        self.fee_amount = self.fee_amount.add(fragment)?;
        self.fee_quantity = self.fee_quantity.saturating_add(quantity);

        Ok(())
    }

    fn reset_fees(&mut self) {
        self.fee_amount = Money::from_minor(0, self.unit_effective_price.currency());
        self.fee_quantity = 0;
    }
}

/// One successful fee application recorded against the basket.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedFee<'a> {
    /// Rule that charged the fee
    pub rule: RuleKey,

    /// Amount charged by this application
    pub amount: Money<'a, Currency>,
}

/// Basket
#[derive(Debug)]
pub struct Basket<'a> {
    lines: Vec<Line<'a>>,
    currency: &'static Currency,
    total_fees: Money<'a, Currency>,
    applied_fees: SmallVec<[AppliedFee<'a>; 4]>,
    fee_applications: Option<FeeApplications<'a>>,
    total_applications: u32,
}

impl<'a> Basket<'a> {
    /// Create a new empty basket.
    #[must_use]
    pub fn new(currency: &'static Currency) -> Self {
        Basket {
            lines: Vec::new(),
            currency,
            total_fees: Money::from_minor(0, currency),
            applied_fees: SmallVec::new(),
            fee_applications: None,
            total_applications: 0,
        }
    }

    /// Create a new basket with the given lines.
    ///
    /// # Errors
    ///
    /// Returns a `BasketError` if there was a currency mismatch error.
    pub fn with_lines(
        lines: impl Into<Vec<Line<'a>>>,
        currency: &'static Currency,
    ) -> Result<Self, BasketError> {
        let lines = lines.into();

        lines
            .iter()
            .enumerate()
            .try_for_each(|(i, line)| check_currency(i, line, currency))?;

        Ok(Basket {
            lines,
            ..Basket::new(currency)
        })
    }

    /// Append a line to the basket.
    ///
    /// # Errors
    ///
    /// Returns a `BasketError` if the line's currency differs from the basket's.
    pub fn add_line(&mut self, line: Line<'a>) -> Result<usize, BasketError> {
        let idx = self.lines.len();

        check_currency(idx, &line, self.currency)?;

        self.lines.push(line);

        Ok(idx)
    }

    /// Calculate the subtotal of the basket, before fees.
    ///
    /// # Errors
    ///
    /// Returns a `TotalPriceError` if there was a money arithmetic or currency mismatch error.
    pub fn subtotal(&self) -> Result<Money<'a, Currency>, TotalPriceError> {
        total_price(&self.lines, self.currency)
    }

    /// Subtotal plus every fee charged in the current evaluation pass.
    ///
    /// # Errors
    ///
    /// Returns a `TotalPriceError` if there was a money arithmetic or currency mismatch error.
    pub fn total_with_fees(&self) -> Result<Money<'a, Currency>, TotalPriceError> {
        Ok(self.subtotal()?.add(self.total_fees)?)
    }

    /// Get a line from the basket.
    ///
    /// # Errors
    ///
    /// Returns a `BasketError::LineNotFound` if the line is not found.
    pub fn get_line(&self, line: usize) -> Result<&Line<'a>, BasketError> {
        self.lines.get(line).ok_or(BasketError::LineNotFound(line))
    }

    /// Iterate over the lines in the basket.
    pub fn iter(&self) -> impl Iterator<Item = &Line<'a>> {
        self.lines.iter()
    }

    /// Lines in basket order.
    pub fn lines(&self) -> &[Line<'a>] {
        &self.lines
    }

    /// Get the number of lines in the basket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the basket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get the currency of the basket.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Total of all fees charged in the current evaluation pass.
    pub fn total_fees(&self) -> &Money<'a, Currency> {
        &self.total_fees
    }

    /// Every successful fee application in the current pass, in application order.
    pub fn applied_fees(&self) -> &[AppliedFee<'a>] {
        &self.applied_fees
    }

    /// Ledger attached by the last evaluation pass, if the basket has been evaluated.
    pub fn fee_applications(&self) -> Option<&FeeApplications<'a>> {
        self.fee_applications.as_ref()
    }

    /// Number of successful applications recorded in the current pass.
    pub fn total_applications(&self) -> u32 {
        self.total_applications
    }

    /// Add a fee fragment to a line.
    ///
    /// Intended for fee implementations; annotations accumulate across a pass.
    ///
    /// # Errors
    ///
    /// - [`BasketError::LineNotFound`] if the line does not exist.
    /// - [`BasketError::Money`] if the fragment is in another currency.
    pub fn apply_fee_to_line(
        &mut self,
        line: usize,
        fragment: Money<'a, Currency>,
        quantity: u32,
    ) -> Result<(), BasketError> {
        self.lines
            .get_mut(line)
            .ok_or(BasketError::LineNotFound(line))?
            .add_fee(fragment, quantity)?;

        Ok(())
    }

    /// Record a fee charged by `rule` against the basket as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`BasketError::Money`] if the amount is in another currency.
    pub fn apply_fee_to_basket(
        &mut self,
        rule: RuleKey,
        amount: Money<'a, Currency>,
    ) -> Result<(), BasketError> {
        self.total_fees = self.total_fees.add(amount)?;
        self.applied_fees.push(AppliedFee { rule, amount });

        Ok(())
    }

    /// Clear every fee annotation ahead of a new evaluation pass.
    pub(crate) fn reset_fees(&mut self) {
        self.lines.iter_mut().for_each(Line::reset_fees);
        self.total_fees = Money::from_minor(0, self.currency);
        self.applied_fees.clear();
        self.fee_applications = None;
        self.total_applications = 0;
    }

    pub(crate) fn record_application(&mut self) {
        self.total_applications = self.total_applications.saturating_add(1);
    }

    pub(crate) fn set_fee_applications(&mut self, applications: FeeApplications<'a>) {
        self.fee_applications = Some(applications);
    }
}

fn check_currency(
    idx: usize,
    line: &Line<'_>,
    currency: &'static Currency,
) -> Result<(), BasketError> {
    let line_currency = line.unit_effective_price().currency();

    if line_currency == currency {
        Ok(())
    } else {
        Err(BasketError::CurrencyMismatch(
            idx,
            line_currency.iso_alpha_code,
            currency.iso_alpha_code,
        ))
    }
}
