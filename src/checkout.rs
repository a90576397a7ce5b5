//! Checkout
//!
//! Turns an evaluated basket into historical order fee records and writes rule
//! usage back through a [`UsageStore`].

use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::info;

use crate::{
    basket::Basket,
    pricing::TotalPriceError,
    rules::{
        RuleKey,
        source::{StoreError, UsageIncrement, UsageStore},
    },
};

/// Errors raised at checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The basket was never evaluated, so there is no fee ledger to record.
    #[error("basket has no fee applications; evaluate it with an Applicator before checkout")]
    FeesNotFound,

    /// Wrapped usage store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Wrapped basket total error.
    #[error(transparent)]
    TotalPrice(#[from] TotalPriceError),
}

/// Historical record of one fee charged on an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFee<'a> {
    /// Order reference
    pub order: String,

    /// Rule that charged the fee
    pub rule: RuleKey,

    /// Rule name at the time of the order
    pub rule_name: String,

    /// Amount charged
    pub amount: Money<'a, Currency>,

    /// Description shown to the customer
    pub message: String,
}

/// Order total for an evaluated basket: subtotal raised by every fee.
///
/// # Errors
///
/// - [`CheckoutError::FeesNotFound`] if the basket was never evaluated.
/// - [`CheckoutError::TotalPrice`] if the total cannot be calculated.
pub fn order_total<'a>(basket: &Basket<'a>) -> Result<Money<'a, Currency>, CheckoutError> {
    if basket.fee_applications().is_none() {
        return Err(CheckoutError::FeesNotFound);
    }

    Ok(basket.total_with_fees()?)
}

/// Build order fee records for `order` and record rule usage in `store`.
///
/// One record is built per application. Each applied rule's counters are
/// incremented once, by its application count and total amount.
///
/// # Errors
///
/// - [`CheckoutError::FeesNotFound`] if the basket was never evaluated.
/// - [`CheckoutError::Store`] if usage could not be recorded.
#[tracing::instrument(
    name = "checkout.record_order_fees",
    skip(store, order, basket),
    fields(order_ref = %order),
    err
)]
pub fn record_order_fees<'a, S>(
    store: &mut S,
    order: &str,
    basket: &Basket<'a>,
) -> Result<Vec<OrderFee<'a>>, CheckoutError>
where
    S: UsageStore<'a> + ?Sized,
{
    let ledger = basket
        .fee_applications()
        .ok_or(CheckoutError::FeesNotFound)?;

    let order_fees: Vec<OrderFee<'a>> = basket
        .applied_fees()
        .iter()
        .map(|applied| {
            let entry = ledger.get(applied.rule);

            OrderFee {
                order: order.to_string(),
                rule: applied.rule,
                rule_name: entry.map(|entry| entry.name.clone()).unwrap_or_default(),
                amount: applied.amount,
                message: entry
                    .map(|entry| entry.description.clone())
                    .unwrap_or_default(),
            }
        })
        .collect();

    for application in ledger.iter() {
        store.record_usage(
            application.rule,
            UsageIncrement {
                frequency: application.frequency,
                amount: application.amount,
            },
        )?;
    }

    info!(
        fee_count = order_fees.len(),
        rule_count = ledger.len(),
        "recorded order fees"
    );

    Ok(order_fees)
}
