//! Conditional Fee Rules
//!
//! A rule binds one condition and one fee to an availability window and a set
//! of usage limits. Rules are read-only during basket evaluation; their usage
//! counters only move through [`ConditionalFee::record_usage`].

use std::fmt;

use jiff::{Timestamp, tz::TimeZone};
use rustc_hash::FxHashMap;
use rusty_money::{Money, MoneyError, iso::Currency};
use serde::Deserialize;
use slotmap::new_key_type;
use thiserror::Error;

use crate::{
    basket::Basket,
    conditions::{Condition, ConditionError},
    fees::{Fee, FeeContext, FeeError},
    money::RoundingPolicy,
    results::ApplicationResult,
};

pub mod source;

/// Upper bound on applications per basket when no other limit applies.
pub const DEFAULT_MAX_APPLICATIONS: u32 = 10_000;

new_key_type! {
    /// Rule Key
    pub struct RuleKey;
}

/// Errors raised by rule configuration or application.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The availability window ends before it starts.
    #[error("availability window ends ({end}) before it starts ({start})")]
    InvalidWindow {
        /// Window start
        start: Timestamp,

        /// Window end
        end: Timestamp,
    },

    /// Wrapped condition evaluation error.
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// Wrapped fee application error.
    #[error(transparent)]
    Fee(#[from] FeeError),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Who a rule is offered to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferScope {
    /// Every basket on the site
    #[default]
    Site,

    /// Specific customers
    User,

    /// Specific browsing sessions
    Session,
}

/// Rule status, derived from usage unless explicitly suspended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Available for use
    #[default]
    Open,

    /// Switched off by hand
    Suspended,

    /// Usage limits exhausted
    Consumed,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleStatus::Open => "Open",
            RuleStatus::Suspended => "Suspended",
            RuleStatus::Consumed => "Consumed",
        })
    }
}

/// Usage limits for a rule
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageLimits<'a> {
    /// Applications across every order
    pub max_global_applications: Option<u32>,

    /// Applications per customer
    pub max_user_applications: Option<u32>,

    /// Applications per basket
    pub max_basket_applications: Option<u32>,

    /// Total amount the rule may ever charge
    pub max_fee: Option<Money<'a, Currency>>,
}

impl<'a> UsageLimits<'a> {
    /// No limits
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_global_applications: None,
            max_user_applications: None,
            max_basket_applications: None,
            max_fee: None,
        }
    }

    /// Limit applications per basket.
    #[must_use]
    pub const fn with_basket_limit(mut self, limit: u32) -> Self {
        self.max_basket_applications = Some(limit);
        self
    }

    /// Limit applications per customer.
    #[must_use]
    pub const fn with_user_limit(mut self, limit: u32) -> Self {
        self.max_user_applications = Some(limit);
        self
    }

    /// Limit applications across every order.
    #[must_use]
    pub const fn with_global_limit(mut self, limit: u32) -> Self {
        self.max_global_applications = Some(limit);
        self
    }

    /// Cap the total amount ever charged.
    #[must_use]
    pub const fn with_max_fee(mut self, limit: Money<'a, Currency>) -> Self {
        self.max_fee = Some(limit);
        self
    }
}

/// Persistent usage counters. Never decrease.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageCounters<'a> {
    /// Total amount charged so far
    pub total_fee: Money<'a, Currency>,

    /// Applications so far
    pub num_applications: u32,

    /// Orders the rule was applied to
    pub num_orders: u32,
}

impl<'a> UsageCounters<'a> {
    /// Fresh counters in `currency`.
    pub fn zero(currency: &'a Currency) -> Self {
        Self {
            total_fee: Money::from_minor(0, currency),
            num_applications: 0,
            num_orders: 0,
        }
    }
}

/// A customer, with the number of times each rule (by slug) has been applied to
/// their past orders.
#[derive(Debug, Clone, Default)]
pub struct Customer {
    /// Customer identifier
    pub id: String,

    applications: FxHashMap<String, u32>,
}

impl Customer {
    /// Create a customer with no previous applications.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            applications: FxHashMap::default(),
        }
    }

    /// Record `count` previous applications of the rule with `slug`.
    #[must_use]
    pub fn with_applications(mut self, slug: impl Into<String>, count: u32) -> Self {
        self.applications.insert(slug.into(), count);
        self
    }

    /// Previous applications of the rule with `slug`.
    pub fn applications_of(&self, slug: &str) -> u32 {
        self.applications.get(slug).copied().unwrap_or_default()
    }
}

/// Browsing session identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SessionContext {
    /// Session identifier
    pub id: String,
}

impl SessionContext {
    /// Create a session context.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// One human-readable restriction on a rule's availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restriction {
    /// Restriction text
    pub description: String,

    /// Whether the restriction currently allows the rule
    pub is_satisfied: bool,
}

/// A conditional fee rule.
#[derive(Debug, Clone)]
pub struct ConditionalFee<'a> {
    key: RuleKey,
    name: String,
    slug: String,
    description: String,
    scope: OfferScope,
    status: RuleStatus,
    condition: Condition,
    fee: Fee,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    limits: UsageLimits<'a>,
    usage: UsageCounters<'a>,
    currency: &'a Currency,
}

impl<'a> ConditionalFee<'a> {
    /// Create an open, site-wide rule with no window or limits.
    pub fn new(
        key: RuleKey,
        name: impl Into<String>,
        condition: Condition,
        fee: Fee,
        currency: &'a Currency,
    ) -> Self {
        let name = name.into();

        Self {
            key,
            slug: slugify(&name),
            name,
            description: String::new(),
            scope: OfferScope::Site,
            status: RuleStatus::Open,
            condition,
            fee,
            start: None,
            end: None,
            limits: UsageLimits::unlimited(),
            usage: UsageCounters::zero(currency),
            currency,
        }
    }

    /// Set the free-text description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set who the rule is offered to.
    #[must_use]
    pub fn with_scope(mut self, scope: OfferScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the availability window. Both bounds are inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidWindow`] if `end` is before `start`.
    pub fn with_window(
        mut self,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Self, RuleError> {
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(RuleError::InvalidWindow { start, end });
            }
        }

        self.start = start;
        self.end = end;

        Ok(self)
    }

    /// Set the usage limits and recompute the status.
    #[must_use]
    pub fn with_limits(mut self, limits: UsageLimits<'a>) -> Self {
        self.limits = limits;
        self.refresh_status();
        self
    }

    /// Set the usage counters and recompute the status.
    #[must_use]
    pub fn with_usage(mut self, usage: UsageCounters<'a>) -> Self {
        self.usage = usage;
        self.refresh_status();
        self
    }

    /// Start the rule suspended.
    #[must_use]
    pub fn suspended(mut self) -> Self {
        self.suspend();
        self
    }

    /// Rule key
    pub fn key(&self) -> RuleKey {
        self.key
    }

    /// Rule name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL-safe identifier derived from the name
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Free-text description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Offer scope
    pub fn scope(&self) -> OfferScope {
        self.scope
    }

    /// Current status
    pub fn status(&self) -> RuleStatus {
        self.status
    }

    /// Condition
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Fee
    pub fn fee(&self) -> &Fee {
        &self.fee
    }

    /// Window start
    pub fn start(&self) -> Option<Timestamp> {
        self.start
    }

    /// Window end
    pub fn end(&self) -> Option<Timestamp> {
        self.end
    }

    /// Usage limits
    pub fn limits(&self) -> &UsageLimits<'a> {
        &self.limits
    }

    /// Usage counters
    pub fn usage(&self) -> &UsageCounters<'a> {
        &self.usage
    }

    /// Currency fees are charged in
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Whether the rule has been switched off by hand.
    pub fn is_suspended(&self) -> bool {
        self.status == RuleStatus::Suspended
    }

    /// Suspend the rule.
    pub fn suspend(&mut self) {
        self.status = RuleStatus::Suspended;
    }

    /// Lift a suspension. The status is then derived from usage again.
    pub fn unsuspend(&mut self) {
        self.status = RuleStatus::Open;
        self.refresh_status();
    }

    /// Recompute the status from usage. Suspended rules stay suspended.
    pub fn refresh_status(&mut self) {
        if self.is_suspended() {
            return;
        }

        self.status = if self.max_applications(None) == 0 {
            RuleStatus::Consumed
        } else {
            RuleStatus::Open
        };
    }

    /// Whether `at` falls inside the (inclusive) availability window.
    pub fn is_in_window(&self, at: Timestamp) -> bool {
        self.start.is_none_or(|start| start <= at) && self.end.is_none_or(|end| at <= end)
    }

    /// Whether the rule can be used by `customer` at `at`.
    pub fn is_available(&self, customer: Option<&Customer>, at: Timestamp) -> bool {
        !self.is_suspended() && self.is_in_window(at) && self.max_applications(customer) > 0
    }

    /// Times the rule may be applied to one basket, capped at
    /// [`DEFAULT_MAX_APPLICATIONS`].
    pub fn max_applications(&self, customer: Option<&Customer>) -> u32 {
        self.max_applications_with_ceiling(customer, DEFAULT_MAX_APPLICATIONS)
    }

    /// Times the rule may be applied to one basket, capped at `ceiling`.
    pub fn max_applications_with_ceiling(&self, customer: Option<&Customer>, ceiling: u32) -> u32 {
        let fee_cap_reached = self.limits.max_fee.is_some_and(|max_fee| {
            self.usage.total_fee.to_minor_units() >= max_fee.to_minor_units()
        });

        if fee_cap_reached {
            return 0;
        }

        let per_user = self
            .limits
            .max_user_applications
            .zip(customer)
            .map(|(limit, customer)| limit.saturating_sub(customer.applications_of(&self.slug)));

        let global = self
            .limits
            .max_global_applications
            .map(|limit| limit.saturating_sub(self.usage.num_applications));

        [per_user, self.limits.max_basket_applications, global]
            .into_iter()
            .flatten()
            .fold(ceiling, u32::min)
    }

    /// Whether the condition is met by `basket`.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] if the condition could not be evaluated.
    pub fn is_condition_satisfied(&self, basket: &Basket<'_>) -> Result<bool, RuleError> {
        Ok(self.condition.is_satisfied(basket)?)
    }

    /// Whether the basket is part of the way to meeting the condition.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] if the condition could not be evaluated.
    pub fn is_condition_partially_satisfied(&self, basket: &Basket<'_>) -> Result<bool, RuleError> {
        Ok(self.condition.is_partially_satisfied(basket)?)
    }

    /// What else the basket needs to meet the condition.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] if the condition could not be evaluated.
    pub fn upsell_message(&self, basket: &Basket<'_>) -> Result<Option<String>, RuleError> {
        Ok(self.condition.upsell_message(basket)?)
    }

    /// Apply the fee to `basket` once, if the condition is met.
    ///
    /// When the rule has a monetary cap, the fee is limited to the budget left
    /// after persistent usage and earlier applications in this pass.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] if evaluation or allocation fails.
    pub fn apply_fee(
        &self,
        basket: &mut Basket<'a>,
        rounding: RoundingPolicy,
    ) -> Result<ApplicationResult<'a>, RuleError> {
        if !self.is_condition_satisfied(basket)? {
            return Ok(ApplicationResult::zero(basket.currency()));
        }

        let context = FeeContext {
            max_total_fee: self.remaining_budget(basket),
            ..FeeContext::new(self.key, rounding)
        };

        Ok(self.fee.apply(basket, &self.condition, &context)?)
    }

    fn remaining_budget(&self, basket: &Basket<'a>) -> Option<Money<'a, Currency>> {
        let max_fee = self.limits.max_fee?;

        let charged_this_pass = basket
            .applied_fees()
            .iter()
            .filter(|applied| applied.rule == self.key)
            .map(|applied| applied.amount.to_minor_units())
            .sum::<i64>();

        let remaining = max_fee
            .to_minor_units()
            .saturating_sub(self.usage.total_fee.to_minor_units())
            .saturating_sub(charged_this_pass)
            .max(0);

        Some(Money::from_minor(remaining, max_fee.currency()))
    }

    /// Add one order's usage to the counters and recompute the status.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::Money`] if `amount` is in another currency.
    pub fn record_usage(
        &mut self,
        frequency: u32,
        amount: Money<'a, Currency>,
    ) -> Result<(), RuleError> {
        self.usage.total_fee = self.usage.total_fee.add(amount)?;
        self.usage.num_applications = self.usage.num_applications.saturating_add(frequency);
        self.usage.num_orders = self.usage.num_orders.saturating_add(1);

        self.refresh_status();

        Ok(())
    }

    /// Human-readable restrictions on this rule, evaluated at `at`.
    pub fn availability_restrictions(&self, at: Timestamp) -> Vec<Restriction> {
        let mut restrictions = Vec::new();

        if self.is_suspended() {
            restrictions.push(Restriction {
                description: "Offer is suspended".to_string(),
                is_satisfied: false,
            });
        }

        if let Some(total) = self.limits.max_global_applications {
            let remaining = total.saturating_sub(self.usage.num_applications);

            restrictions.push(Restriction {
                description: format!("Limited to {total} uses ({remaining} remaining)"),
                is_satisfied: remaining > 0,
            });
        }

        if let Some(total) = self.limits.max_user_applications {
            restrictions.push(Restriction {
                description: uses_per(total, "user"),
                is_satisfied: true,
            });
        }

        if let Some(total) = self.limits.max_basket_applications {
            restrictions.push(Restriction {
                description: uses_per(total, "basket"),
                is_satisfied: true,
            });
        }

        let window = match (self.start, self.end) {
            (Some(start), Some(end)) => Some(format!(
                "Available between {} and {}",
                display_instant(start),
                display_instant(end)
            )),
            (Some(start), None) => Some(format!("Available from {}", display_instant(start))),
            (None, Some(end)) => Some(format!("Available until {}", display_instant(end))),
            (None, None) => None,
        };

        if let Some(description) = window {
            restrictions.push(Restriction {
                description,
                is_satisfied: self.is_in_window(at),
            });
        }

        if let Some(max_fee) = self.limits.max_fee {
            restrictions.push(Restriction {
                description: format!("Limited to a cost of {max_fee}"),
                is_satisfied: self.usage.total_fee.to_minor_units() < max_fee.to_minor_units(),
            });
        }

        restrictions
    }
}

fn uses_per(total: u32, per: &str) -> String {
    if total == 1 {
        format!("Limited to 1 use per {per}")
    } else {
        format!("Limited to {total} uses per {per}")
    }
}

/// Dates at midnight UTC are shown without a time.
fn display_instant(at: Timestamp) -> String {
    let zoned = at.to_zoned(TimeZone::UTC);

    if zoned.hour() == 0 && zoned.minute() == 0 {
        zoned.strftime("%Y-%m-%d").to_string()
    } else {
        zoned.strftime("%Y-%m-%d %H:%M").to_string()
    }
}

/// Lowercase, hyphen-separated form of `name`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());

    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}
