//! Products

use rusty_money::{Money, iso::Currency};
use slotmap::new_key_type;
use smallvec::SmallVec;

new_key_type! {
    /// Product Key
    pub struct ProductKey;
}

/// Product
#[derive(Debug, Clone)]
pub struct Product<'a> {
    /// Product name
    pub name: String,

    /// Product tags, sorted and deduplicated
    pub tags: SmallVec<[String; 5]>,

    /// Product price
    pub price: Money<'a, Currency>,
}

impl<'a> Product<'a> {
    /// Create a new product with the given tags.
    pub fn new(name: impl Into<String>, price: Money<'a, Currency>, tags: &[&str]) -> Self {
        Self {
            name: name.into(),
            tags: normalise_tags(tags.iter().copied()),
            price,
        }
    }
}

/// Sort and deduplicate a set of tags.
pub fn normalise_tags<'t>(tags: impl IntoIterator<Item = &'t str>) -> SmallVec<[String; 5]> {
    let mut tags: SmallVec<[String; 5]> = tags.into_iter().map(str::to_string).collect();

    tags.sort();
    tags.dedup();

    tags
}
