//! Integration tests for custom condition and fee classes registered with a
//! [`ProxyRegistry`].

use std::{str::FromStr, sync::Arc};

use rust_decimal::Decimal;
use rusty_money::{Money, iso::{Currency, GBP}};
use slotmap::SlotMap;
use testresult::TestResult;

use levy::{
    applicator::Applicator,
    basket::{Basket, Line},
    conditions::{Condition, ConditionBehaviour, ConditionError, ConditionRecord},
    fees::{
        Fee, FeeBehaviour, FeeContext, FeeError, FeeRecord,
        allocation::{charge_lines, cover_lines},
    },
    money::major_to_minor,
    products::ProductKey,
    ranges::ProductRange,
    registry::{IntoCondition, IntoFee, ProxyError, ProxyRegistry},
    results::ApplicationResult,
    rules::{ConditionalFee, UsageLimits, source::RuleStore},
};

/// Met once the basket has at least `value` distinct lines in range.
#[derive(Debug)]
struct DistinctLines {
    range: Arc<ProductRange>,
    value: Decimal,
}

impl DistinctLines {
    fn lines(&self, basket: &Basket<'_>) -> Decimal {
        Decimal::from(basket.iter().filter(|line| self.range.contains_line(line)).count())
    }
}

impl ConditionBehaviour for DistinctLines {
    fn name(&self) -> String {
        format!("{} different products from {}", self.value, self.range.name())
    }

    fn range(&self) -> Option<&ProductRange> {
        Some(&self.range)
    }

    fn value(&self) -> Decimal {
        self.value
    }

    fn is_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError> {
        Ok(self.lines(basket) >= self.value)
    }

    fn is_partially_satisfied(&self, basket: &Basket<'_>) -> Result<bool, ConditionError> {
        let lines = self.lines(basket);

        Ok(lines > Decimal::ZERO && lines < self.value)
    }

    fn upsell_message(&self, basket: &Basket<'_>) -> Result<Option<String>, ConditionError> {
        let lines = self.lines(basket);

        Ok((lines < self.value).then(|| format!("Add {} more products", self.value - lines)))
    }
}

/// Charges a fixed amount per application and allows repetition.
#[derive(Debug)]
struct PerApplicationFee {
    value: Decimal,
}

impl FeeBehaviour for PerApplicationFee {
    fn name(&self, currency: &Currency) -> String {
        format!("{} {} per application", self.value, currency.iso_alpha_code)
    }

    fn apply<'a>(
        &self,
        basket: &mut Basket<'a>,
        condition: &Condition,
        context: &FeeContext<'a>,
    ) -> Result<ApplicationResult<'a>, FeeError> {
        let currency = basket.currency();
        let covered = cover_lines(basket, condition);
        let amount = context.clamp(major_to_minor(self.value, currency, context.rounding)?);

        if covered.is_empty() || amount <= 0 {
            return Ok(ApplicationResult::zero(currency));
        }

        let result = charge_lines(basket, &covered, amount, context)?;

        Ok(ApplicationResult {
            is_final: false,
            ..result
        })
    }
}

fn registry() -> ProxyRegistry {
    let mut registry = ProxyRegistry::new();

    registry
        .register_condition("distinct_lines", |record| {
            Ok(Arc::new(DistinctLines {
                range: record
                    .range
                    .clone()
                    .ok_or_else(|| ProxyError::MissingRange("distinct_lines".to_string()))?,
                value: record
                    .value
                    .ok_or_else(|| ProxyError::MissingValue("distinct_lines".to_string()))?,
            }) as Arc<dyn ConditionBehaviour>)
        })
        .register_fee("per_application", |record| {
            Ok(Arc::new(PerApplicationFee {
                value: record
                    .value
                    .ok_or_else(|| ProxyError::MissingValue("per_application".to_string()))?,
            }) as Arc<dyn FeeBehaviour>)
        });

    registry
}

fn basket<'a>() -> Result<Basket<'a>, Box<dyn std::error::Error>> {
    let mut keys = SlotMap::<ProductKey, ()>::with_key();

    Ok(Basket::with_lines(
        [(400, 1), (250, 2), (100, 1)]
            .into_iter()
            .map(|(price, quantity)| Line::new(keys.insert(()), Money::from_minor(price, GBP), quantity))
            .collect::<Vec<_>>(),
        GBP,
    )?)
}

fn resolved(registry: &ProxyRegistry) -> Result<(Condition, Fee), ProxyError> {
    let everything = Arc::new(ProductRange::all_products("Everything"));

    let condition = ConditionRecord {
        kind: Some("count".to_string()),
        range: Some(everything),
        value: Some(Decimal::from(2)),
        proxy_class: Some("distinct_lines".to_string()),
    }
    .into_condition(registry)?;

    let fee = FeeRecord {
        value: Decimal::from_str("0.50").ok(),
        proxy_class: Some("per_application".to_string()),
        ..FeeRecord::default()
    }
    .into_fee(registry)?;

    Ok((condition, fee))
}

#[test]
fn registered_classes_take_precedence_over_kinds() -> TestResult {
    let registry = registry();
    let (condition, fee) = resolved(&registry)?;

    assert!(matches!(condition, Condition::Custom(_)));
    assert!(matches!(fee, Fee::Custom(_)));
    assert_eq!(condition.name(), "2 different products from Everything");
    assert_eq!(fee.name(GBP), "0.50 GBP per application");

    Ok(())
}

#[test]
fn unregistered_class_is_reported() {
    let record = FeeRecord {
        proxy_class: Some("surge".to_string()),
        ..FeeRecord::default()
    };

    assert_eq!(
        record.into_fee(&ProxyRegistry::new()).err(),
        Some(ProxyError::UnregisteredClass("surge".to_string()))
    );
}

#[test]
fn non_final_fee_repeats_up_to_basket_limit() -> TestResult {
    let registry = registry();
    let (condition, fee) = resolved(&registry)?;
    let mut store = RuleStore::new();

    let rule = store.insert(|key| {
        Ok(ConditionalFee::new(key, "Per application", condition, fee, GBP)
            .with_limits(UsageLimits::unlimited().with_basket_limit(3)))
    })?;

    let mut basket = basket()?;
    let rules: Vec<_> = store.iter().collect();

    Applicator::default().apply_fees(&mut basket, &rules, None)?;

    let ledger = basket.fee_applications().ok_or("missing ledger")?;
    let applied = ledger.get(rule).ok_or("missing application")?;

    assert_eq!(applied.frequency, 3);
    assert_eq!(applied.amount, Money::from_minor(150, GBP));
    assert_eq!(applied.description, "0.50 GBP per application");
    assert_eq!(basket.total_applications(), 3);
    assert_eq!(basket.applied_fees().len(), 3);

    Ok(())
}

#[test]
fn repeated_fee_stops_when_budget_runs_out() -> TestResult {
    let registry = registry();
    let (condition, fee) = resolved(&registry)?;
    let mut store = RuleStore::new();

    let rule = store.insert(|key| {
        Ok(ConditionalFee::new(key, "Per application", condition, fee, GBP)
            .with_limits(UsageLimits::unlimited().with_max_fee(Money::from_minor(120, GBP))))
    })?;

    let mut basket = basket()?;
    let rules: Vec<_> = store.iter().collect();

    Applicator::default().apply_fees(&mut basket, &rules, None)?;

    let amounts: Vec<i64> = basket
        .applied_fees()
        .iter()
        .map(|applied| applied.amount.to_minor_units())
        .collect();

    assert_eq!(amounts, [50, 50, 20]);
    assert_eq!(
        basket.fee_applications().ok_or("missing ledger")?.get(rule).map(|fee| fee.frequency),
        Some(3)
    );

    Ok(())
}
