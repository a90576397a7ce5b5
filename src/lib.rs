//! Levy
//!
//! Levy is a conditional fee engine: rules pair a basket condition with a fee,
//! and the applicator charges every eligible rule's fee against a basket,
//! allocating each charge across the lines that triggered it.

pub mod applicator;
pub mod basket;
pub mod checkout;
pub mod conditions;
pub mod config;
pub mod fees;
pub mod fixtures;
pub mod ledger;
pub mod lines;
pub mod money;
pub mod prelude;
pub mod pricing;
pub mod products;
pub mod ranges;
pub mod receipt;
pub mod registry;
pub mod results;
pub mod rules;
pub mod utils;
