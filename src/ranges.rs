//! Product Ranges
//!
//! A range decides which products a condition (and therefore a fee) applies to.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::{
    basket::Line,
    products::{ProductKey, normalise_tags},
};

/// A named set of products.
///
/// Membership is, in order of precedence: explicit exclusion, "all products",
/// explicit inclusion, then any shared tag.
#[derive(Debug, Clone, Default)]
pub struct ProductRange {
    name: String,
    includes_all_products: bool,
    included_products: FxHashSet<ProductKey>,
    excluded_products: FxHashSet<ProductKey>,
    included_tags: SmallVec<[String; 5]>,
}

impl ProductRange {
    /// Create an empty range that contains no products.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a range containing every product.
    pub fn all_products(name: impl Into<String>) -> Self {
        Self {
            includes_all_products: true,
            ..Self::new(name)
        }
    }

    /// Include the given products.
    #[must_use]
    pub fn with_products(mut self, products: impl IntoIterator<Item = ProductKey>) -> Self {
        self.included_products.extend(products);
        self
    }

    /// Exclude the given products, even when they would otherwise match.
    #[must_use]
    pub fn excluding(mut self, products: impl IntoIterator<Item = ProductKey>) -> Self {
        self.excluded_products.extend(products);
        self
    }

    /// Include any product carrying at least one of the given tags.
    #[must_use]
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        let merged = self
            .included_tags
            .iter()
            .map(String::as_str)
            .chain(tags.iter().copied())
            .collect::<SmallVec<[&str; 5]>>();

        self.included_tags = normalise_tags(merged);
        self
    }

    /// Range name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this range matches every product not explicitly excluded.
    pub fn includes_all_products(&self) -> bool {
        self.includes_all_products
    }

    /// Whether the product (with the given tags) is a member of this range.
    pub fn contains(&self, product: ProductKey, tags: &[String]) -> bool {
        if self.excluded_products.contains(&product) {
            return false;
        }

        if self.includes_all_products || self.included_products.contains(&product) {
            return true;
        }

        tags.iter()
            .any(|tag| self.included_tags.binary_search(tag).is_ok())
    }

    /// Whether the product on a basket line is a member of this range.
    pub fn contains_line(&self, line: &Line<'_>) -> bool {
        self.contains(line.product(), line.tags())
    }
}
