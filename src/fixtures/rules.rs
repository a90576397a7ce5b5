//! Rule Fixtures

use std::collections::BTreeMap;

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{fees::PercentageBase, rules::OfferScope};

/// Wrapper for ranges and rules in YAML
///
/// Rules are inserted in key order.
#[derive(Debug, Deserialize)]
pub struct RulesFixture {
    /// Map of range key -> range fixture
    #[serde(default)]
    pub ranges: FxHashMap<String, RangeFixture>,

    /// Map of rule key -> rule fixture
    pub rules: BTreeMap<String, RuleFixture>,
}

/// Range Fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeFixture {
    /// Range name
    pub name: String,

    /// Whether every product is included
    #[serde(default)]
    pub all_products: bool,

    /// Product keys included explicitly
    #[serde(default)]
    pub products: Vec<String>,

    /// Product keys excluded explicitly
    #[serde(default)]
    pub excluded: Vec<String>,

    /// Tags whose products are included
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Rule Fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFixture {
    /// Rule name
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Who the rule is offered to
    #[serde(default)]
    pub scope: OfferScope,

    /// Condition configuration
    pub condition: ConditionFixture,

    /// Fee configuration
    pub fee: FeeFixture,

    /// Window start (inclusive)
    #[serde(default)]
    pub start: Option<Timestamp>,

    /// Window end (inclusive)
    #[serde(default)]
    pub end: Option<Timestamp>,

    /// Usage limits
    #[serde(default)]
    pub limits: LimitsFixture,

    /// Usage counters carried over from earlier orders
    #[serde(default)]
    pub usage: UsageFixture,

    /// Whether the rule starts suspended
    #[serde(default)]
    pub suspended: bool,
}

/// Condition Fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionFixture {
    /// Built-in kind (`count`, `value`, `coverage`)
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Range key
    #[serde(default)]
    pub range: Option<String>,

    /// Threshold (e.g., "3" or "20.00")
    #[serde(default)]
    pub value: Option<String>,

    /// Registered custom class
    #[serde(default)]
    pub class: Option<String>,
}

/// Fee Fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeeFixture {
    /// Built-in kind (`percentage`, `absolute`)
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Range key used in the fee description
    #[serde(default)]
    pub range: Option<String>,

    /// Amount (e.g., "2.50") or percentage (e.g., "10%")
    #[serde(default)]
    pub value: Option<String>,

    /// Base for percentage fees
    #[serde(default)]
    pub base: PercentageBase,

    /// Registered custom class
    #[serde(default)]
    pub class: Option<String>,
}

/// Limits Fixture
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsFixture {
    /// Applications across every order
    #[serde(default)]
    pub max_global_applications: Option<u32>,

    /// Applications per customer
    #[serde(default)]
    pub max_user_applications: Option<u32>,

    /// Applications per basket
    #[serde(default)]
    pub max_basket_applications: Option<u32>,

    /// Total amount ever charged (e.g., "100.00 GBP")
    #[serde(default)]
    pub max_fee: Option<String>,
}

/// Usage Fixture
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsageFixture {
    /// Total charged so far (e.g., "12.00 GBP")
    #[serde(default)]
    pub total_fee: Option<String>,

    /// Applications so far
    #[serde(default)]
    pub num_applications: u32,

    /// Orders so far
    #[serde(default)]
    pub num_orders: u32,
}
