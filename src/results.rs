//! Application Results

use std::fmt;

use rusty_money::{Money, iso::Currency};

/// Outcome of applying a fee to a basket once.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationResult<'a> {
    /// Amount charged by this application
    pub amount: Money<'a, Currency>,

    /// Whether the rule must not be applied again in this pass
    pub is_final: bool,

    /// Optional human-readable description of the charge
    pub description: Option<String>,
}

impl<'a> ApplicationResult<'a> {
    /// Canonical "did not apply" result: zero amount, not final.
    pub fn zero(currency: &'a Currency) -> Self {
        Self {
            amount: Money::from_minor(0, currency),
            is_final: false,
            description: None,
        }
    }

    /// A successful basket-level fee that ends repetition of its rule.
    pub fn basket_fee(amount: Money<'a, Currency>) -> Self {
        Self {
            amount,
            is_final: true,
            description: None,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether the application charged anything.
    pub fn is_successful(&self) -> bool {
        self.amount.to_minor_units() > 0
    }
}

impl fmt::Display for ApplicationResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Basket fee of {}>", self.amount)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::GBP;

    use super::*;

    #[test]
    fn zero_result_is_unsuccessful_and_not_final() {
        let result = ApplicationResult::zero(GBP);

        assert!(!result.is_successful());
        assert!(!result.is_final);
        assert!(result.description.is_none());
    }

    #[test]
    fn basket_fee_is_successful_and_final() {
        let result = ApplicationResult::basket_fee(Money::from_minor(500, GBP))
            .with_description("£5.00 fee on Shoes");

        assert!(result.is_successful());
        assert!(result.is_final);
        assert_eq!(result.description.as_deref(), Some("£5.00 fee on Shoes"));
        assert_eq!(result.to_string(), "<Basket fee of £5.00>");
    }
}
