//! Fee Application Ledger
//!
//! Aggregates every successful application in one evaluation pass, per rule, in
//! the order each rule was first applied.

use rustc_hash::FxHashMap;
use rusty_money::{Money, MoneyError, iso::Currency};

use crate::{results::ApplicationResult, rules::{ConditionalFee, RuleKey}};

/// Accumulated applications of one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeApplication<'a> {
    /// Rule that was applied
    pub rule: RuleKey,

    /// Rule name
    pub name: String,

    /// Description of the charge, from the first application
    pub description: String,

    /// Most recent result
    pub result: ApplicationResult<'a>,

    /// Number of applications
    pub frequency: u32,

    /// Total charged across all applications
    pub amount: Money<'a, Currency>,
}

/// Ledger of fee applications for one basket evaluation.
#[derive(Debug, Clone, Default)]
pub struct FeeApplications<'a> {
    applications: Vec<FeeApplication<'a>>,
    index: FxHashMap<RuleKey, usize>,
}

impl<'a> FeeApplications<'a> {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one application of `rule`.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the amount is in a different currency from
    /// earlier applications of the same rule.
    pub fn add(
        &mut self,
        rule: &ConditionalFee<'a>,
        result: ApplicationResult<'a>,
    ) -> Result<(), MoneyError> {
        if let Some(existing) = self
            .index
            .get(&rule.key())
            .and_then(|idx| self.applications.get_mut(*idx))
        {
            existing.amount = existing.amount.add(result.amount)?;
            existing.frequency = existing.frequency.saturating_add(1);
            existing.result = result;

            return Ok(());
        }

        let description = result
            .description
            .clone()
            .unwrap_or_else(|| rule.fee().description(rule.currency()));

        self.index.insert(rule.key(), self.applications.len());
        self.applications.push(FeeApplication {
            rule: rule.key(),
            name: rule.name().to_string(),
            description,
            amount: result.amount,
            result,
            frequency: 1,
        });

        Ok(())
    }

    /// Applications in first-application order.
    pub fn iter(&self) -> impl Iterator<Item = &FeeApplication<'a>> {
        self.applications.iter()
    }

    /// Applications that charged a positive amount.
    pub fn fees(&self) -> impl Iterator<Item = &FeeApplication<'a>> {
        self.applications
            .iter()
            .filter(|application| application.amount.to_minor_units() > 0)
    }

    /// Applications of the given rule.
    pub fn get(&self, rule: RuleKey) -> Option<&FeeApplication<'a>> {
        self.index
            .get(&rule)
            .and_then(|idx| self.applications.get(*idx))
    }

    /// Rules applied, in first-application order.
    pub fn rules(&self) -> impl Iterator<Item = RuleKey> + '_ {
        self.applications.iter().map(|application| application.rule)
    }

    /// Number of distinct rules applied
    pub fn len(&self) -> usize {
        self.applications.len()
    }

    /// Whether nothing was applied
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// Total charged across every rule.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if an application is in another currency.
    pub fn total(&self, currency: &'a Currency) -> Result<Money<'a, Currency>, MoneyError> {
        self.applications
            .iter()
            .try_fold(Money::from_minor(0, currency), |acc, application| {
                acc.add(application.amount)
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use rusty_money::iso::GBP;
    use slotmap::SlotMap;
    use testresult::TestResult;

    use crate::{
        conditions::{Condition, CountCondition},
        fees::{AbsoluteFee, Fee},
        ranges::ProductRange,
    };

    use super::*;

    fn rule<'a>(key: RuleKey, name: &str) -> ConditionalFee<'a> {
        let range = Arc::new(ProductRange::all_products("Everything"));

        ConditionalFee::new(
            key,
            name,
            Condition::Count(CountCondition::new(Arc::clone(&range), Decimal::ONE)),
            Fee::Absolute(AbsoluteFee::new(Some(range), Decimal::ONE)),
            GBP,
        )
    }

    #[test]
    fn aggregates_per_rule_in_first_application_order() -> TestResult {
        let mut keys = SlotMap::<RuleKey, ()>::with_key();
        let first = rule(keys.insert(()), "First");
        let second = rule(keys.insert(()), "Second");

        let mut ledger = FeeApplications::new();

        ledger.add(
            &second,
            ApplicationResult::basket_fee(Money::from_minor(100, GBP)).with_description("earliest"),
        )?;
        ledger.add(&first, ApplicationResult::basket_fee(Money::from_minor(50, GBP)))?;
        ledger.add(
            &second,
            ApplicationResult::basket_fee(Money::from_minor(25, GBP)).with_description("latest"),
        )?;

        let names: Vec<&str> = ledger.iter().map(|app| app.name.as_str()).collect();

        assert_eq!(names, vec!["Second", "First"]);
        assert_eq!(ledger.len(), 2);

        let aggregated = ledger.get(second.key()).ok_or("missing second rule")?;

        assert_eq!(aggregated.frequency, 2);
        assert_eq!(aggregated.amount, Money::from_minor(125, GBP));
        assert_eq!(aggregated.result.amount, Money::from_minor(25, GBP));
        assert_eq!(aggregated.description, "earliest");
        assert_eq!(aggregated.result.description.as_deref(), Some("latest"));
        assert_eq!(ledger.total(GBP)?, Money::from_minor(175, GBP));

        Ok(())
    }

    #[test]
    fn description_falls_back_to_fee_description() -> TestResult {
        let rule = rule(RuleKey::default(), "Fallback");
        let mut ledger = FeeApplications::new();

        ledger.add(&rule, ApplicationResult::basket_fee(Money::from_minor(100, GBP)))?;

        let application = ledger.iter().next().ok_or("missing application")?;

        assert_eq!(application.description, "£1.00 fee on Everything");
        assert_eq!(ledger.fees().count(), 1);

        Ok(())
    }

    #[test]
    fn empty_ledger_totals_zero() -> TestResult {
        let ledger = FeeApplications::new();

        assert!(ledger.is_empty());
        assert_eq!(ledger.total(GBP)?, Money::from_minor(0, GBP));

        Ok(())
    }
}
