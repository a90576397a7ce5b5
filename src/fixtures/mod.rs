//! Fixtures

use std::{fs, path::PathBuf, sync::Arc};

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use slotmap::SlotMap;
use thiserror::Error;

use crate::{
    basket::{Basket, BasketError, Line},
    conditions::ConditionRecord,
    fees::FeeRecord,
    fixtures::{
        baskets::{BasketsFixture, LineFixture},
        products::{ProductsFixture, parse_decimal, parse_price},
        rules::{ConditionFixture, FeeFixture, RangeFixture, RuleFixture, RulesFixture},
    },
    products::{Product, ProductKey},
    ranges::ProductRange,
    registry::{ProxyError, ProxyRegistry},
    rules::{
        ConditionalFee, RuleError, RuleKey, UsageCounters, UsageLimits,
        source::{RuleStore, StoreError},
    },
};

pub mod baskets;
pub mod products;
pub mod rules;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid decimal value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Product not found
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Range not found
    #[error("Range not found: {0}")]
    RangeNotFound(String),

    /// Basket not found
    #[error("Basket not found: {0}")]
    BasketNotFound(String),

    /// Rule not found
    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    /// Currency mismatch between fixtures
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// No products loaded yet
    #[error("No products loaded yet; currency unknown")]
    NoCurrency,

    /// Condition or fee could not be resolved
    #[error("Failed to resolve rule `{0}`: {1}")]
    Proxy(String, #[source] ProxyError),

    /// Rule construction error
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Rule store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Basket creation error
    #[error("Failed to create basket: {0}")]
    Basket(#[from] BasketError),
}

/// Fixture
#[derive(Debug)]
pub struct Fixture<'a> {
    /// Base path for fixture files
    base_path: PathBuf,

    /// `SlotMap` to store products with generated keys
    product_meta: SlotMap<ProductKey, Product<'a>>,

    /// String key -> `SlotMap` key mappings for lookups
    product_keys: FxHashMap<String, ProductKey>,
    rule_keys: FxHashMap<String, RuleKey>,

    /// Named product ranges
    ranges: FxHashMap<String, Arc<ProductRange>>,

    /// Basket lines by basket name
    baskets: FxHashMap<String, Vec<Line<'a>>>,

    /// Loaded rules
    rules: RuleStore<'a>,

    /// Custom condition and fee classes
    registry: ProxyRegistry,

    /// Currency for the fixture set
    currency: Option<&'static Currency>,
}

impl<'a> Fixture<'a> {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            product_meta: SlotMap::with_key(),
            product_keys: FxHashMap::default(),
            rule_keys: FxHashMap::default(),
            ranges: FxHashMap::default(),
            baskets: FxHashMap::default(),
            rules: RuleStore::new(),
            registry: ProxyRegistry::new(),
            currency: None,
        }
    }

    /// Use `registry` to resolve custom condition and fee classes in rule fixtures.
    #[must_use]
    pub fn with_registry(mut self, registry: ProxyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Load products from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or if there are currency mismatches.
    pub fn load_products(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let contents = self.read("products", name)?;
        let fixture: ProductsFixture = serde_norway::from_str(&contents)?;

        for (key, product_fixture) in fixture.products {
            let (_minor_units, currency) = parse_price(&product_fixture.price)?;

            self.check_currency(currency)?;

            let product: Product<'a> = product_fixture.try_into()?;
            let product_key = self.product_meta.insert(product);

            self.product_keys.insert(key, product_key);
        }

        Ok(self)
    }

    /// Load baskets from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or if referenced products don't exist.
    pub fn load_baskets(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let contents = self.read("baskets", name)?;
        let fixture: BasketsFixture = serde_norway::from_str(&contents)?;

        for (key, basket_fixture) in fixture.baskets {
            let lines = basket_fixture
                .lines
                .iter()
                .map(|line| self.line(line))
                .collect::<Result<Vec<_>, _>>()?;

            self.baskets.insert(key, lines);
        }

        Ok(self)
    }

    /// Load ranges and rules from a YAML fixture file
    ///
    /// Rules are inserted in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, if a referenced
    /// product or range doesn't exist, or if a rule cannot be built.
    pub fn load_rules(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let contents = self.read("rules", name)?;
        let fixture: RulesFixture = serde_norway::from_str(&contents)?;

        for (key, range_fixture) in &fixture.ranges {
            let range = self.range_from(range_fixture)?;

            self.ranges.insert(key.clone(), Arc::new(range));
        }

        for (key, rule_fixture) in fixture.rules {
            let rule_key = self.insert_rule(&key, rule_fixture)?;

            self.rule_keys.insert(key, rule_key);
        }

        Ok(self)
    }

    /// Load a complete fixture set (products, baskets and rules with the same name)
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture
            .load_products(name)?
            .load_baskets(name)?
            .load_rules(name)?;

        Ok(fixture)
    }

    /// Get a product by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found.
    pub fn product(&self, key: &str) -> Result<&Product<'a>, FixtureError> {
        self.product_meta
            .get(self.product_key(key)?)
            .ok_or_else(|| FixtureError::ProductNotFound(key.to_string()))
    }

    /// Get a product key by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found.
    pub fn product_key(&self, key: &str) -> Result<ProductKey, FixtureError> {
        self.product_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::ProductNotFound(key.to_string()))
    }

    /// Get a range by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not found.
    pub fn range(&self, key: &str) -> Result<Arc<ProductRange>, FixtureError> {
        self.ranges
            .get(key)
            .cloned()
            .ok_or_else(|| FixtureError::RangeNotFound(key.to_string()))
    }

    /// Get a rule by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the rule is not found.
    pub fn rule(&self, key: &str) -> Result<&ConditionalFee<'a>, FixtureError> {
        self.rules
            .get(self.rule_key(key)?)
            .ok_or_else(|| FixtureError::RuleNotFound(key.to_string()))
    }

    /// Get a rule key by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the rule is not found.
    pub fn rule_key(&self, key: &str) -> Result<RuleKey, FixtureError> {
        self.rule_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::RuleNotFound(key.to_string()))
    }

    /// Create a fresh basket from the named basket fixture
    ///
    /// # Errors
    ///
    /// Returns an error if the basket is not found or no products are loaded.
    pub fn basket(&self, key: &str) -> Result<Basket<'a>, FixtureError> {
        let currency = self.currency()?;

        let lines = self
            .baskets
            .get(key)
            .ok_or_else(|| FixtureError::BasketNotFound(key.to_string()))?;

        Ok(Basket::with_lines(lines.clone(), currency)?)
    }

    /// Names of the loaded baskets, sorted
    pub fn basket_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.baskets.keys().map(String::as_str).collect();

        names.sort_unstable();
        names
    }

    /// Get the loaded rules
    pub fn rules(&self) -> &RuleStore<'a> {
        &self.rules
    }

    /// Get the loaded rules mutably
    pub fn rules_mut(&mut self) -> &mut RuleStore<'a> {
        &mut self.rules
    }

    /// Get the currency
    ///
    /// # Errors
    ///
    /// Returns an error if no products have been loaded yet.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        self.currency.ok_or(FixtureError::NoCurrency)
    }

    /// Get the product metadata `SlotMap`
    pub fn product_meta_map(&self) -> &SlotMap<ProductKey, Product<'a>> {
        &self.product_meta
    }

    fn read(&self, category: &str, name: &str) -> Result<String, FixtureError> {
        let file_path = self.base_path.join(category).join(format!("{name}.yml"));

        Ok(fs::read_to_string(file_path)?)
    }

    fn check_currency(&mut self, currency: &'static Currency) -> Result<(), FixtureError> {
        match self.currency {
            Some(existing) if existing != currency => Err(FixtureError::CurrencyMismatch(
                existing.iso_alpha_code.to_string(),
                currency.iso_alpha_code.to_string(),
            )),
            Some(_) => Ok(()),
            None => {
                self.currency = Some(currency);

                Ok(())
            }
        }
    }

    fn money(&self, s: &str) -> Result<Money<'a, Currency>, FixtureError> {
        let expected = self.currency()?;
        let (minor_units, currency) = parse_price(s)?;

        if currency != expected {
            return Err(FixtureError::CurrencyMismatch(
                expected.iso_alpha_code.to_string(),
                currency.iso_alpha_code.to_string(),
            ));
        }

        Ok(Money::from_minor(minor_units, currency))
    }

    fn line(&self, fixture: &LineFixture) -> Result<Line<'a>, FixtureError> {
        let product_key = self.product_key(&fixture.product)?;
        let product = self.product(&fixture.product)?;

        let price = match &fixture.price {
            Some(price) => self.money(price)?,
            None => product.price,
        };

        Ok(Line::new(product_key, price, fixture.quantity)
            .with_tags(product.tags.iter().map(String::as_str))
            .with_discounted_quantity(fixture.discounted))
    }

    fn range_from(&self, fixture: &RangeFixture) -> Result<ProductRange, FixtureError> {
        let lookup = |keys: &[String]| {
            keys.iter()
                .map(|key| self.product_key(key))
                .collect::<Result<Vec<_>, _>>()
        };

        let range = if fixture.all_products {
            ProductRange::all_products(fixture.name.clone())
        } else {
            ProductRange::new(fixture.name.clone())
        };

        let tags: Vec<&str> = fixture.tags.iter().map(String::as_str).collect();

        Ok(range
            .with_products(lookup(&fixture.products)?)
            .excluding(lookup(&fixture.excluded)?)
            .with_tags(&tags))
    }

    fn optional_range(&self, key: Option<&String>) -> Result<Option<Arc<ProductRange>>, FixtureError> {
        key.map(|key| self.range(key)).transpose()
    }

    fn optional_decimal(value: Option<&String>) -> Result<Option<Decimal>, FixtureError> {
        value.map(|value| parse_decimal(value)).transpose()
    }

    fn condition_record(&self, fixture: &ConditionFixture) -> Result<ConditionRecord, FixtureError> {
        Ok(ConditionRecord {
            kind: fixture.kind.clone(),
            range: self.optional_range(fixture.range.as_ref())?,
            value: Self::optional_decimal(fixture.value.as_ref())?,
            proxy_class: fixture.class.clone(),
        })
    }

    fn fee_record(&self, fixture: &FeeFixture) -> Result<FeeRecord, FixtureError> {
        Ok(FeeRecord {
            kind: fixture.kind.clone(),
            range: self.optional_range(fixture.range.as_ref())?,
            value: Self::optional_decimal(fixture.value.as_ref())?,
            percentage_base: fixture.base,
            proxy_class: fixture.class.clone(),
        })
    }

    fn insert_rule(&mut self, key: &str, fixture: RuleFixture) -> Result<RuleKey, FixtureError> {
        let currency = self.currency()?;

        let condition = self
            .registry
            .resolve_condition(&self.condition_record(&fixture.condition)?)
            .map_err(|err| FixtureError::Proxy(key.to_string(), err))?;

        let fee = self
            .registry
            .resolve_fee(&self.fee_record(&fixture.fee)?)
            .map_err(|err| FixtureError::Proxy(key.to_string(), err))?;

        let limits = UsageLimits {
            max_global_applications: fixture.limits.max_global_applications,
            max_user_applications: fixture.limits.max_user_applications,
            max_basket_applications: fixture.limits.max_basket_applications,
            max_fee: fixture
                .limits
                .max_fee
                .as_deref()
                .map(|max_fee| self.money(max_fee))
                .transpose()?,
        };

        let usage = UsageCounters {
            total_fee: match fixture.usage.total_fee.as_deref() {
                Some(total_fee) => self.money(total_fee)?,
                None => Money::from_minor(0, currency),
            },
            num_applications: fixture.usage.num_applications,
            num_orders: fixture.usage.num_orders,
        };

        let RuleFixture {
            name,
            description,
            scope,
            start,
            end,
            suspended,
            ..
        } = fixture;

        let rule_key = self.rules.insert(move |rule_key| {
            let rule = ConditionalFee::new(rule_key, name, condition, fee, currency)
                .with_description(description)
                .with_scope(scope)
                .with_window(start, end)?
                .with_limits(limits)
                .with_usage(usage);

            Ok(if suspended { rule.suspended() } else { rule })
        })?;

        Ok(rule_key)
    }
}

impl Default for Fixture<'_> {
    fn default() -> Self {
        Self::new()
    }
}
