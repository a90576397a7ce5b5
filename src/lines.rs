//! Line Selection
//!
//! Picks the basket lines a fee may be charged against, cheapest first.

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;

use crate::{
    basket::{Basket, Line},
    ranges::ProductRange,
};

/// Selected lines as `(unit price, line index)` pairs.
pub type SelectedLines<'a> = SmallVec<[(Money<'a, Currency>, usize); 10]>;

/// Whether a line can take part in a condition or fee for `range`.
///
/// The product must be in range, the unit price nonzero and at least one unit
/// left undiscounted.
pub fn is_selectable(range: &ProductRange, line: &Line<'_>) -> bool {
    range.contains_line(line)
        && line.unit_effective_price().to_minor_units() != 0
        && line.quantity_without_discount() > 0
}

/// Select the lines in `range`, ordered by ascending unit price.
///
/// The sort is stable, so lines with equal prices keep their basket order.
pub fn select_lines<'a>(basket: &Basket<'a>, range: &ProductRange) -> SelectedLines<'a> {
    let mut selected: SelectedLines<'a> = basket
        .iter()
        .enumerate()
        .filter(|(_idx, line)| is_selectable(range, line))
        .map(|(idx, line)| (*line.unit_effective_price(), idx))
        .collect();

    selected.sort_by_key(|(price, _idx)| price.to_minor_units());

    selected
}
