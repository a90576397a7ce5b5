//! Product Fixtures

use std::str::FromStr;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, JPY, USD},
};
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    money::{RoundingPolicy, major_to_minor},
    products::Product,
};

/// Wrapper for products in YAML
#[derive(Debug, Deserialize)]
pub struct ProductsFixture {
    /// Map of product key -> product fixture
    pub products: FxHashMap<String, ProductFixture>,
}

/// Product Fixture
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product name
    pub name: String,

    /// Product tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Product price (e.g., "2.99 GBP")
    pub price: String,
}

impl TryFrom<ProductFixture> for Product<'_> {
    type Error = FixtureError;

    fn try_from(fixture: ProductFixture) -> Result<Self, Self::Error> {
        let (minor_units, currency) = parse_price(&fixture.price)?;
        let tags: Vec<&str> = fixture.tags.iter().map(String::as_str).collect();

        Ok(Product::new(
            fixture.name,
            Money::from_minor(minor_units, currency),
            &tags,
        ))
    }
}

/// Look up a supported currency by ISO code.
///
/// # Errors
///
/// Returns [`FixtureError::UnknownCurrency`] for unsupported codes.
pub fn parse_currency(code: &str) -> Result<&'static Currency, FixtureError> {
    match code {
        "GBP" => Ok(GBP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        "JPY" => Ok(JPY),
        other => Err(FixtureError::UnknownCurrency(other.to_string())),
    }
}

/// Parse price string (e.g., "2.99 GBP") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount is not a decimal, or if the currency code is not recognised.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount =
        Decimal::from_str(amount).map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    let currency = parse_currency(code)?;

    let minor_units = major_to_minor(amount, currency, RoundingPolicy::HalfUp)
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, currency))
}

/// Parse a decimal value, accepting an optional trailing `%` (e.g. "12.5%").
///
/// # Errors
///
/// Returns [`FixtureError::InvalidValue`] if the string is not a decimal.
pub fn parse_decimal(s: &str) -> Result<Decimal, FixtureError> {
    let trimmed = s.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();

    Decimal::from_str(number).map_err(|_err| FixtureError::InvalidValue(s.to_string()))
}
