//! Integration tests for splitting fees across basket lines.

use std::sync::Arc;

use rust_decimal::Decimal;
use rusty_money::{Money, iso::GBP};
use slotmap::SlotMap;
use testresult::TestResult;

use levy::{
    applicator::Applicator,
    basket::{Basket, Line},
    conditions::{Condition, CountCondition, CoverageCondition, ValueCondition},
    config::FeeSettings,
    fees::{
        AbsoluteFee, Fee, PercentageBase, PercentageFee,
        allocation::{CoveredLine, allocate_fee},
    },
    money::RoundingPolicy,
    products::ProductKey,
    ranges::ProductRange,
    rules::{ConditionalFee, source::RuleStore},
};

fn covered(quantities: &[u32]) -> Vec<CoveredLine<'static>> {
    quantities
        .iter()
        .enumerate()
        .map(|(index, &quantity)| CoveredLine {
            index,
            unit_price: Money::from_minor(100, GBP),
            quantity,
        })
        .collect()
}

fn products<const N: usize>() -> [ProductKey; N] {
    let mut keys = SlotMap::<ProductKey, ()>::with_key();

    std::array::from_fn(|_| keys.insert(()))
}

fn evaluate<'a>(
    basket: &mut Basket<'a>,
    condition: Condition,
    fee: Fee,
    rounding: RoundingPolicy,
) -> TestResult {
    let mut store = RuleStore::new();

    store.insert(|key| Ok(ConditionalFee::new(key, "Handling", condition, fee, GBP)))?;

    let rules: Vec<_> = store.iter().collect();
    let settings = FeeSettings {
        rounding,
        ..FeeSettings::default()
    };

    Applicator::new(settings).apply_fees(basket, &rules, None)?;

    Ok(())
}

#[test]
fn last_line_absorbs_the_rounding_remainder() -> TestResult {
    let lines = covered(&[1, 1, 1]);

    assert_eq!(allocate_fee(100, &lines, RoundingPolicy::Down)?.as_slice(), [33, 33, 34]);
    assert_eq!(allocate_fee(100, &lines, RoundingPolicy::Up)?.as_slice(), [34, 34, 32]);

    Ok(())
}

#[test]
fn fragments_always_sum_to_the_fee() -> TestResult {
    let lines = covered(&[3, 7, 1, 2]);

    for amount in [1, 7, 99, 1_000, 12_345] {
        for rounding in [
            RoundingPolicy::Down,
            RoundingPolicy::HalfUp,
            RoundingPolicy::HalfEven,
            RoundingPolicy::Up,
        ] {
            let fragments = allocate_fee(amount, &lines, rounding)?;

            assert_eq!(fragments.len(), lines.len());
            assert_eq!(fragments.iter().sum::<i64>(), amount, "{amount} with {rounding:?}");
            assert!(
                fragments.iter().all(|fragment| *fragment >= 0),
                "{amount} with {rounding:?}: {fragments:?}"
            );
        }
    }

    Ok(())
}

#[test]
fn thresholds_below_one_still_charge_the_cheapest_line() -> TestResult {
    let everything = Arc::new(ProductRange::all_products("Everything"));

    let conditions = [
        Condition::Count(CountCondition::new(Arc::clone(&everything), Decimal::ZERO)),
        Condition::Value(ValueCondition::new(Arc::clone(&everything), Decimal::new(50, 2))),
    ];

    for condition in conditions {
        let mut basket = Basket::with_lines(
            [Line::new(ProductKey::default(), Money::from_minor(1000, GBP), 1)],
            GBP,
        )?;

        evaluate(
            &mut basket,
            condition,
            Fee::Absolute(AbsoluteFee::new(Some(Arc::clone(&everything)), Decimal::TWO)),
            RoundingPolicy::Down,
        )?;

        assert_eq!(basket.total_fees(), &Money::from_minor(200, GBP));
        assert_eq!(
            basket.get_line(0)?.fee_amount(),
            &Money::from_minor(200, GBP)
        );
    }

    Ok(())
}

#[test]
fn percentage_fee_follows_rounding_policy() -> TestResult {
    let everything = Arc::new(ProductRange::all_products("Everything"));

    for (rounding, expected) in [(RoundingPolicy::Down, 49), (RoundingPolicy::HalfUp, 50)] {
        let mut basket = Basket::with_lines(
            [Line::new(ProductKey::default(), Money::from_minor(333, GBP), 1)],
            GBP,
        )?;

        evaluate(
            &mut basket,
            Condition::Count(CountCondition::new(Arc::clone(&everything), Decimal::ONE)),
            Fee::Percentage(PercentageFee::new(
                Some(Arc::clone(&everything)),
                Decimal::from(15),
                PercentageBase::CoveredLines,
            )),
            rounding,
        )?;

        assert_eq!(basket.total_fees(), &Money::from_minor(expected, GBP));
    }

    Ok(())
}

#[test]
fn coverage_fee_charges_one_unit_per_distinct_line() -> TestResult {
    let keys = products::<3>();
    let everything = Arc::new(ProductRange::all_products("Everything"));

    let mut basket = Basket::with_lines(
        keys.into_iter()
            .zip([(300, 4), (100, 2), (200, 1)])
            .map(|(key, (price, quantity))| Line::new(key, Money::from_minor(price, GBP), quantity))
            .collect::<Vec<_>>(),
        GBP,
    )?;

    evaluate(
        &mut basket,
        Condition::Coverage(CoverageCondition::new(
            Arc::clone(&everything),
            Decimal::from(2),
        )),
        Fee::Absolute(AbsoluteFee::new(Some(everything), Decimal::ONE)),
        RoundingPolicy::Down,
    )?;

    let charged: Vec<(i64, u32)> = basket
        .iter()
        .map(|line| (line.fee_amount().to_minor_units(), line.fee_quantity()))
        .collect();

    // the two cheapest lines, one unit each
    assert_eq!(charged, [(0, 0), (50, 1), (50, 1)]);
    assert_eq!(basket.total_fees(), &Money::from_minor(100, GBP));

    Ok(())
}

#[test]
fn fee_ignores_fully_discounted_and_zero_priced_lines() -> TestResult {
    let [free, discounted, full] = products();
    let everything = Arc::new(ProductRange::all_products("Everything"));

    let mut basket = Basket::with_lines(
        [
            Line::new(free, Money::from_minor(0, GBP), 5),
            Line::new(discounted, Money::from_minor(50, GBP), 2).with_discounted_quantity(2),
            Line::new(full, Money::from_minor(400, GBP), 1),
        ],
        GBP,
    )?;

    evaluate(
        &mut basket,
        Condition::Count(CountCondition::new(Arc::clone(&everything), Decimal::ONE)),
        Fee::Absolute(AbsoluteFee::new(Some(everything), Decimal::from(2))),
        RoundingPolicy::Down,
    )?;

    let last = basket.get_line(2)?;

    assert_eq!(last.fee_amount(), &Money::from_minor(200, GBP));
    assert_eq!(basket.get_line(0)?.fee_quantity(), 0);
    assert_eq!(basket.get_line(1)?.fee_quantity(), 0);

    Ok(())
}
