//! Rule Sources
//!
//! Where the applicator gets its rules from, and where checkout writes usage
//! back to. [`RuleStore`] is an in-memory implementation of both.

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use slotmap::SlotMap;
use thiserror::Error;

use crate::rules::{ConditionalFee, Customer, OfferScope, RuleError, RuleKey, RuleStatus, SessionContext};

/// Errors raised by rule stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No rule with the given key exists.
    #[error("rule {0:?} not found")]
    RuleNotFound(RuleKey),

    /// A rule with the same slug already exists.
    #[error("a rule with slug {0} already exists")]
    DuplicateSlug(String),

    /// Wrapped rule error.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Supplies candidate rules for a basket.
pub trait RuleSource<'a> {
    /// Open site-wide rules whose window contains `at`.
    fn site_rules(&self, at: Timestamp) -> Vec<&ConditionalFee<'a>>;

    /// Rules offered to a specific customer whose window contains `at`.
    fn user_rules(&self, _customer: &Customer, _at: Timestamp) -> Vec<&ConditionalFee<'a>> {
        Vec::new()
    }

    /// Rules offered to a specific session whose window contains `at`.
    fn session_rules(&self, _session: &SessionContext, _at: Timestamp) -> Vec<&ConditionalFee<'a>> {
        Vec::new()
    }
}

/// Usage to add to a rule after an order is placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageIncrement<'a> {
    /// Applications in the order
    pub frequency: u32,

    /// Amount charged in the order
    pub amount: Money<'a, Currency>,
}

/// Persists rule usage.
///
/// Implementations must apply each increment atomically: concurrent checkouts
/// must never lose an update.
pub trait UsageStore<'a> {
    /// Add `increment` to the counters of `rule`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the rule is unknown or the update fails.
    fn record_usage(&mut self, rule: RuleKey, increment: UsageIncrement<'a>) -> Result<(), StoreError>;
}

/// In-memory rule store.
///
/// Site rules are returned in insertion order. User and session rules are the
/// open, in-window rules with the matching scope, made available to every
/// customer or session that asks.
#[derive(Debug, Default)]
pub struct RuleStore<'a> {
    rules: SlotMap<RuleKey, ConditionalFee<'a>>,
    order: Vec<RuleKey>,
    slugs: FxHashMap<String, RuleKey>,
}

impl<'a> RuleStore<'a> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule built from its freshly allocated key.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Rule`] if `build` fails.
    /// - [`StoreError::DuplicateSlug`] if another rule has the same slug.
    pub fn insert<F>(&mut self, build: F) -> Result<RuleKey, StoreError>
    where
        F: FnOnce(RuleKey) -> Result<ConditionalFee<'a>, RuleError>,
    {
        let key = self.rules.try_insert_with_key(build)?;

        let slug = self
            .rules
            .get(key)
            .map(|rule| rule.slug().to_string())
            .ok_or(StoreError::RuleNotFound(key))?;

        if self.slugs.contains_key(&slug) {
            self.rules.remove(key);

            return Err(StoreError::DuplicateSlug(slug));
        }

        self.slugs.insert(slug, key);
        self.order.push(key);

        Ok(key)
    }

    /// Look up a rule by key.
    pub fn get(&self, key: RuleKey) -> Option<&ConditionalFee<'a>> {
        self.rules.get(key)
    }

    /// Look up a rule by key, mutably.
    pub fn get_mut(&mut self, key: RuleKey) -> Option<&mut ConditionalFee<'a>> {
        self.rules.get_mut(key)
    }

    /// Look up a rule by slug.
    pub fn get_by_slug(&self, slug: &str) -> Option<&ConditionalFee<'a>> {
        self.slugs.get(slug).and_then(|key| self.rules.get(*key))
    }

    /// Every rule in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ConditionalFee<'a>> {
        self.order.iter().filter_map(|key| self.rules.get(*key))
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the store holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn open_rules(&self, scope: OfferScope, at: Timestamp) -> Vec<&ConditionalFee<'a>> {
        self.iter()
            .filter(|rule| {
                rule.scope() == scope && rule.status() == RuleStatus::Open && rule.is_in_window(at)
            })
            .collect()
    }
}

impl<'a> RuleSource<'a> for RuleStore<'a> {
    fn site_rules(&self, at: Timestamp) -> Vec<&ConditionalFee<'a>> {
        self.open_rules(OfferScope::Site, at)
    }

    fn user_rules(&self, _customer: &Customer, at: Timestamp) -> Vec<&ConditionalFee<'a>> {
        self.open_rules(OfferScope::User, at)
    }

    fn session_rules(&self, _session: &SessionContext, at: Timestamp) -> Vec<&ConditionalFee<'a>> {
        self.open_rules(OfferScope::Session, at)
    }
}

impl<'a> UsageStore<'a> for RuleStore<'a> {
    fn record_usage(&mut self, rule: RuleKey, increment: UsageIncrement<'a>) -> Result<(), StoreError> {
        self.rules
            .get_mut(rule)
            .ok_or(StoreError::RuleNotFound(rule))?
            .record_usage(increment.frequency, increment.amount)?;

        Ok(())
    }
}
