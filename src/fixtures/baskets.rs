//! Basket Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;

/// Wrapper for baskets in YAML
#[derive(Debug, Deserialize)]
pub struct BasketsFixture {
    /// Map of basket key -> basket fixture
    pub baskets: FxHashMap<String, BasketFixture>,
}

/// Basket Fixture
#[derive(Debug, Deserialize)]
pub struct BasketFixture {
    /// Lines in basket order
    pub lines: Vec<LineFixture>,
}

/// Line Fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineFixture {
    /// Product key from the products fixture
    pub product: String,

    /// Number of units
    #[serde(default = "one")]
    pub quantity: u32,

    /// Units already consumed by other discounts
    #[serde(default)]
    pub discounted: u32,

    /// Unit effective price override (e.g., "4.50 GBP"); defaults to the product price
    #[serde(default)]
    pub price: Option<String>,
}

const fn one() -> u32 {
    1
}
