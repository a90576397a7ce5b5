//! Fee Allocation
//!
//! Covers lines cheapest first and splits a fee across them so the fragments
//! always sum to the fee exactly: every line but the last gets its rounded
//! proportional share, and the last line takes whatever remains.

use num_traits::ToPrimitive;
use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;

use crate::{
    basket::Basket,
    conditions::Condition,
    fees::{FeeContext, FeeError},
    lines::select_lines,
    money::{AmountError, RoundingPolicy, proportion_of_minor},
    results::ApplicationResult,
};

/// A basket line picked up by a fee, with the number of units it affects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoveredLine<'a> {
    /// Index of the line in the basket
    pub index: usize,

    /// Unit price of the line
    pub unit_price: Money<'a, Currency>,

    /// Units affected by the fee
    pub quantity: u32,
}

/// Lines covered by a fee triggered by `condition`.
///
/// Walks selectable lines in the condition's range cheapest first until the
/// affected quantity reaches the whole part of the condition value. The cheapest
/// line is always covered, and the line that crosses the threshold is included in
/// full. Coverage conditions affect one unit per line.
pub fn cover_lines<'a>(basket: &Basket<'a>, condition: &Condition) -> SmallVec<[CoveredLine<'a>; 10]> {
    let mut covered = SmallVec::new();

    let Some(range) = condition.range() else {
        return covered;
    };

    let permitted = condition.value().floor().to_u64().unwrap_or_default();
    let one_unit = condition.affects_one_unit_per_line();
    let mut affected = 0_u64;

    for (unit_price, index) in select_lines(basket, range) {
        let Ok(line) = basket.get_line(index) else {
            continue;
        };

        let quantity = if one_unit { 1 } else { line.quantity() };

        affected += u64::from(quantity);

        covered.push(CoveredLine {
            index,
            unit_price,
            quantity,
        });

        if affected >= permitted {
            break;
        }
    }

    covered
}

/// Split `amount` (minor units) across `lines` in proportion to affected quantity.
///
/// Each share is rounded with `rounding` but never exceeds what is left of
/// `amount`, so no fragment is negative.
///
/// # Errors
///
/// - [`AmountError::ZeroDenominator`] if no units are affected.
/// - [`AmountError::Overflow`] if a share cannot be represented.
pub fn allocate_fee(
    amount: i64,
    lines: &[CoveredLine<'_>],
    rounding: RoundingPolicy,
) -> Result<SmallVec<[i64; 10]>, AmountError> {
    let total_affected: u64 = lines.iter().map(|line| u64::from(line.quantity)).sum();

    let Some((_last, rest)) = lines.split_last() else {
        return Ok(SmallVec::new());
    };

    let mut fragments = SmallVec::<[i64; 10]>::with_capacity(lines.len());
    let mut remaining = amount;

    for line in rest {
        let share = proportion_of_minor(amount, u64::from(line.quantity), total_affected, rounding)?
            .clamp(0, remaining.max(0));

        remaining = remaining.checked_sub(share).ok_or(AmountError::Overflow)?;
        fragments.push(share);
    }

    fragments.push(remaining);

    debug_assert_eq!(
        fragments.iter().sum::<i64>(),
        amount,
        "fee fragments must sum to the fee"
    );

    Ok(fragments)
}

/// Allocate `amount` over `lines`, annotate the basket and return the successful result.
///
/// # Errors
///
/// Returns a [`FeeError`] if allocation or annotation fails.
pub fn charge_lines<'a>(
    basket: &mut Basket<'a>,
    lines: &[CoveredLine<'a>],
    amount: i64,
    context: &FeeContext<'a>,
) -> Result<ApplicationResult<'a>, FeeError> {
    let currency = basket.currency();
    let fragments = allocate_fee(amount, lines, context.rounding)?;

    for (line, fragment) in lines.iter().zip(fragments) {
        basket.apply_fee_to_line(
            line.index,
            Money::from_minor(fragment, currency),
            line.quantity,
        )?;
    }

    let charged = Money::from_minor(amount, currency);

    basket.apply_fee_to_basket(context.rule, charged)?;

    Ok(ApplicationResult::basket_fee(charged))
}
