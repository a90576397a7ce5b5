//! Fee Applicator
//!
//! Evaluates a basket against every eligible rule and attaches the resulting
//! ledger to the basket.

use jiff::Timestamp;
use rustc_hash::FxHashSet;
use rusty_money::MoneyError;
use thiserror::Error;
use tracing::{Span, debug, info};

use crate::{
    basket::Basket,
    config::FeeSettings,
    ledger::FeeApplications,
    rules::{ConditionalFee, Customer, RuleError, SessionContext, source::RuleSource},
};

/// Errors raised while evaluating a basket.
#[derive(Debug, Error)]
pub enum ApplicatorError {
    /// Wrapped rule application error.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Applies conditional fees to baskets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Applicator {
    settings: FeeSettings,
    at: Option<Timestamp>,
}

impl Applicator {
    /// Create an applicator with the given settings.
    #[must_use]
    pub fn new(settings: FeeSettings) -> Self {
        Self { settings, at: None }
    }

    /// Evaluate rule windows at a fixed instant instead of now.
    #[must_use]
    pub fn with_evaluation_time(mut self, at: Timestamp) -> Self {
        self.at = Some(at);
        self
    }

    /// Settings in use
    pub fn settings(&self) -> &FeeSettings {
        &self.settings
    }

    /// Instant rule windows are evaluated at.
    pub fn evaluation_time(&self) -> Timestamp {
        self.at.unwrap_or_else(Timestamp::now)
    }

    /// Eligible rules: session rules, then user rules, then site rules.
    ///
    /// A rule offered through more than one source is kept at its first position.
    pub fn fees<'s, 'a, S>(
        &self,
        source: &'s S,
        customer: Option<&Customer>,
        session: Option<&SessionContext>,
    ) -> Vec<&'s ConditionalFee<'a>>
    where
        S: RuleSource<'a> + ?Sized,
    {
        let at = self.evaluation_time();

        let session_rules = session
            .map(|session| source.session_rules(session, at))
            .unwrap_or_default();

        let user_rules = customer
            .map(|customer| source.user_rules(customer, at))
            .unwrap_or_default();

        let site_rules = source.site_rules(at);

        let mut seen = FxHashSet::default();

        session_rules
            .into_iter()
            .chain(user_rules)
            .chain(site_rules)
            .filter(|rule| seen.insert(rule.key()))
            .collect()
    }

    /// Apply every eligible rule to `basket` and attach the ledger.
    ///
    /// Rule usage counters are not touched; see [`crate::checkout`].
    ///
    /// # Errors
    ///
    /// Returns an [`ApplicatorError`] if a rule fails to apply.
    #[tracing::instrument(
        name = "applicator.apply",
        skip(self, source, basket, customer, session),
        fields(
            line_count = basket.len(),
            rule_count = tracing::field::Empty,
            application_count = tracing::field::Empty
        ),
        err
    )]
    pub fn apply<'a, S>(
        &self,
        source: &S,
        basket: &mut Basket<'a>,
        customer: Option<&Customer>,
        session: Option<&SessionContext>,
    ) -> Result<(), ApplicatorError>
    where
        S: RuleSource<'a> + ?Sized,
    {
        let rules = self.fees(source, customer, session);

        Span::current().record("rule_count", rules.len());

        self.apply_fees(basket, &rules, customer)?;

        Span::current().record("application_count", basket.total_applications());

        Ok(())
    }

    /// Apply the given rules, in order, to `basket` and attach the ledger.
    ///
    /// On error the basket is left with no fee annotations and no ledger.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplicatorError`] if a rule fails to apply.
    pub fn apply_fees<'a>(
        &self,
        basket: &mut Basket<'a>,
        rules: &[&ConditionalFee<'a>],
        customer: Option<&Customer>,
    ) -> Result<(), ApplicatorError> {
        basket.reset_fees();

        match self.evaluate(basket, rules, customer) {
            Ok(applications) => {
                info!(
                    rules = applications.len(),
                    applications = basket.total_applications(),
                    total_fees = %basket.total_fees(),
                    "evaluated basket fees"
                );

                basket.set_fee_applications(applications);

                Ok(())
            }
            Err(err) => {
                basket.reset_fees();

                Err(err)
            }
        }
    }

    fn evaluate<'a>(
        &self,
        basket: &mut Basket<'a>,
        rules: &[&ConditionalFee<'a>],
        customer: Option<&Customer>,
    ) -> Result<FeeApplications<'a>, ApplicatorError> {
        let mut applications = FeeApplications::new();

        if basket.is_empty() {
            return Ok(applications);
        }

        for rule in rules {
            let max_applications =
                rule.max_applications_with_ceiling(customer, self.settings.max_applications);

            if max_applications == 0 {
                debug!(rule = rule.slug(), "rule has no applications left");

                continue;
            }

            for _ in 0..max_applications {
                let result = rule.apply_fee(basket, self.settings.rounding)?;

                if !result.is_successful() {
                    break;
                }

                let is_final = result.is_final;

                debug!(rule = rule.slug(), amount = %result.amount, "applied fee");

                applications.add(rule, result)?;
                basket.record_application();

                if is_final {
                    break;
                }
            }
        }

        Ok(applications)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use rusty_money::{Money, iso::GBP};
    use testresult::TestResult;

    use crate::{
        basket::Line,
        conditions::{Condition, CountCondition},
        fees::{AbsoluteFee, Fee, FeeBehaviour, FeeContext, FeeError},
        money::AmountError,
        products::ProductKey,
        results::ApplicationResult,
        ranges::ProductRange,
        rules::{OfferScope, RuleKey, UsageLimits, source::RuleStore},
    };

    use super::*;

    fn insert_rule<'a>(
        store: &mut RuleStore<'a>,
        name: &'static str,
        scope: OfferScope,
        limits: UsageLimits<'a>,
    ) -> Result<RuleKey, crate::rules::source::StoreError> {
        store.insert(move |key| {
            let range = Arc::new(ProductRange::all_products("Everything"));

            Ok(ConditionalFee::new(
                key,
                name,
                Condition::Count(CountCondition::new(Arc::clone(&range), Decimal::ONE)),
                Fee::Absolute(AbsoluteFee::new(Some(range), Decimal::ONE)),
                GBP,
            )
            .with_scope(scope)
            .with_limits(limits))
        })
    }

    fn basket<'a>() -> Result<Basket<'a>, crate::basket::BasketError> {
        Basket::with_lines(
            [Line::new(ProductKey::default(), Money::from_minor(1000, GBP), 2)],
            GBP,
        )
    }

    fn applicator() -> Result<Applicator, jiff::Error> {
        Ok(Applicator::default().with_evaluation_time("2026-06-01T12:00:00Z".parse()?))
    }

    #[test]
    fn orders_session_then_user_then_site() -> TestResult {
        let mut store = RuleStore::new();

        let site = insert_rule(&mut store, "Site", OfferScope::Site, UsageLimits::unlimited())?;
        let user = insert_rule(&mut store, "User", OfferScope::User, UsageLimits::unlimited())?;
        let session = insert_rule(&mut store, "Session", OfferScope::Session, UsageLimits::unlimited())?;

        let customer = Customer::new("ada");
        let session_context = SessionContext::new("s1");
        let applicator = applicator()?;

        let keys: Vec<RuleKey> = applicator
            .fees(&store, Some(&customer), Some(&session_context))
            .iter()
            .map(|rule| rule.key())
            .collect();

        assert_eq!(keys, vec![session, user, site]);

        let anonymous: Vec<RuleKey> = applicator
            .fees(&store, None, None)
            .iter()
            .map(|rule| rule.key())
            .collect();

        assert_eq!(anonymous, vec![site]);

        Ok(())
    }

    #[test]
    fn final_results_apply_once_per_rule() -> TestResult {
        let mut store = RuleStore::new();

        insert_rule(&mut store, "Flat", OfferScope::Site, UsageLimits::unlimited())?;

        let mut basket = basket()?;

        applicator()?.apply(&store, &mut basket, None, None)?;

        let ledger = basket.fee_applications().ok_or("missing ledger")?;

        assert_eq!(ledger.len(), 1);
        assert_eq!(basket.total_applications(), 1);
        assert_eq!(basket.total_fees(), &Money::from_minor(100, GBP));

        Ok(())
    }

    #[test]
    fn exhausted_rules_are_skipped() -> TestResult {
        let mut store = RuleStore::new();

        insert_rule(
            &mut store,
            "Basket Limited",
            OfferScope::Site,
            UsageLimits::unlimited().with_basket_limit(0),
        )?;

        let mut basket = basket()?;

        applicator()?.apply(&store, &mut basket, None, None)?;

        assert_eq!(basket.total_applications(), 0);
        assert!(basket.fee_applications().is_some_and(FeeApplications::is_empty));

        Ok(())
    }

    #[test]
    fn empty_basket_gets_empty_ledger() -> TestResult {
        let mut store = RuleStore::new();

        insert_rule(&mut store, "Flat", OfferScope::Site, UsageLimits::unlimited())?;

        let mut basket = Basket::new(GBP);

        applicator()?.apply(&store, &mut basket, None, None)?;

        assert!(basket.fee_applications().is_some_and(FeeApplications::is_empty));

        Ok(())
    }

    #[test]
    fn repeated_evaluation_is_deterministic() -> TestResult {
        let mut store = RuleStore::new();

        insert_rule(&mut store, "First", OfferScope::Site, UsageLimits::unlimited())?;
        insert_rule(&mut store, "Second", OfferScope::Site, UsageLimits::unlimited())?;

        let mut basket = basket()?;
        let applicator = applicator()?;

        applicator.apply(&store, &mut basket, None, None)?;

        let first_fees = *basket.total_fees();
        let first_lines: Vec<i64> = basket.iter().map(|line| line.fee_amount().to_minor_units()).collect();

        applicator.apply(&store, &mut basket, None, None)?;

        let second_lines: Vec<i64> = basket.iter().map(|line| line.fee_amount().to_minor_units()).collect();

        assert_eq!(basket.total_fees(), &first_fees);
        assert_eq!(first_lines, second_lines);
        assert_eq!(basket.total_fees(), &Money::from_minor(200, GBP));

        Ok(())
    }

    #[test]
    fn user_and_session_windows_use_evaluation_time() -> TestResult {
        let mut store = RuleStore::new();
        let start: Timestamp = "2026-06-01T00:00:00Z".parse()?;
        let end: Timestamp = "2026-06-30T23:59:59Z".parse()?;

        for (name, scope) in [("June Session", OfferScope::Session), ("June Member", OfferScope::User)] {
            store.insert(move |key| {
                let range = Arc::new(ProductRange::all_products("Everything"));

                ConditionalFee::new(
                    key,
                    name,
                    Condition::Count(CountCondition::new(Arc::clone(&range), Decimal::ONE)),
                    Fee::Absolute(AbsoluteFee::new(Some(range), Decimal::TWO)),
                    GBP,
                )
                .with_scope(scope)
                .with_window(Some(start), Some(end))
            })?;
        }

        let customer = Customer::new("ada");
        let session = SessionContext::new("s1");
        let mut basket = basket()?;

        Applicator::default()
            .with_evaluation_time("2026-06-15T12:00:00Z".parse()?)
            .apply(&store, &mut basket, Some(&customer), Some(&session))?;

        assert_eq!(basket.total_fees(), &Money::from_minor(400, GBP));

        Applicator::default()
            .with_evaluation_time("2026-07-15T12:00:00Z".parse()?)
            .apply(&store, &mut basket, Some(&customer), Some(&session))?;

        assert_eq!(basket.total_fees(), &Money::from_minor(0, GBP));

        Ok(())
    }

    #[derive(Debug)]
    struct FailingFee;

    impl FeeBehaviour for FailingFee {
        fn name(&self, _currency: &rusty_money::iso::Currency) -> String {
            "Failing fee".to_string()
        }

        fn apply<'a>(
            &self,
            basket: &mut Basket<'a>,
            _condition: &Condition,
            _context: &FeeContext<'a>,
        ) -> Result<ApplicationResult<'a>, FeeError> {
            basket.apply_fee_to_line(0, Money::from_minor(50, GBP), 1)?;

            Err(FeeError::Amount(AmountError::Overflow))
        }
    }

    #[test]
    fn failed_pass_leaves_no_annotations() -> TestResult {
        let mut store = RuleStore::new();

        insert_rule(&mut store, "Flat", OfferScope::Site, UsageLimits::unlimited())?;
        store.insert(|key| {
            let range = Arc::new(ProductRange::all_products("Everything"));

            Ok(ConditionalFee::new(
                key,
                "Failing",
                Condition::Count(CountCondition::new(range, Decimal::ONE)),
                Fee::Custom(Arc::new(FailingFee)),
                GBP,
            ))
        })?;

        let mut basket = basket()?;

        let result = applicator()?.apply(&store, &mut basket, None, None);

        assert!(matches!(result, Err(ApplicatorError::Rule(_))));
        assert_eq!(basket.total_fees(), &Money::from_minor(0, GBP));
        assert!(basket.applied_fees().is_empty());
        assert!(basket.fee_applications().is_none());
        assert_eq!(basket.total_applications(), 0);
        assert!(basket.iter().all(|line| line.fee_amount().to_minor_units() == 0));

        Ok(())
    }
}
