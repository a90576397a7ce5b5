//! Proxy Registry
//!
//! Maps configured class names to factories for custom conditions and fees.
//! Populate it once at startup; resolution never loads code dynamically.

use std::{fmt, sync::Arc};

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{
    conditions::{
        Condition, ConditionBehaviour, ConditionRecord, CountCondition, CoverageCondition,
        ValueCondition,
    },
    fees::{AbsoluteFee, Fee, FeeBehaviour, FeeRecord, PercentageFee},
};

/// Errors raised while resolving condition or fee configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ProxyError {
    /// The condition type tag is not a built-in kind and no class was given.
    #[error("unrecognised condition type: {0}")]
    UnknownConditionType(String),

    /// The fee type tag is not a built-in kind and no class was given.
    #[error("unrecognised fee type: {0}")]
    UnknownFeeType(String),

    /// The configured class name has no registered factory.
    #[error("no factory registered for class {0}")]
    UnregisteredClass(String),

    /// A built-in kind needs a range.
    #[error("{0} requires a range")]
    MissingRange(String),

    /// A built-in kind needs a value.
    #[error("{0} requires a value")]
    MissingValue(String),

    /// The configured value is out of bounds.
    #[error("invalid value {value} for {kind}")]
    InvalidValue {
        /// Kind being resolved
        kind: String,

        /// Offending value
        value: Decimal,
    },
}

type ConditionFactory =
    Arc<dyn Fn(&ConditionRecord) -> Result<Arc<dyn ConditionBehaviour>, ProxyError> + Send + Sync>;

type FeeFactory = Arc<dyn Fn(&FeeRecord) -> Result<Arc<dyn FeeBehaviour>, ProxyError> + Send + Sync>;

/// Registration table for custom condition and fee classes.
#[derive(Clone, Default)]
pub struct ProxyRegistry {
    conditions: FxHashMap<String, ConditionFactory>,
    fees: FxHashMap<String, FeeFactory>,
}

impl fmt::Debug for ProxyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut conditions: Vec<&str> = self.conditions.keys().map(String::as_str).collect();
        let mut fees: Vec<&str> = self.fees.keys().map(String::as_str).collect();

        conditions.sort_unstable();
        fees.sort_unstable();

        f.debug_struct("ProxyRegistry")
            .field("conditions", &conditions)
            .field("fees", &fees)
            .finish()
    }
}

impl ProxyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom condition factory under `class`, replacing any previous one.
    pub fn register_condition<F>(&mut self, class: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ConditionRecord) -> Result<Arc<dyn ConditionBehaviour>, ProxyError>
            + Send
            + Sync
            + 'static,
    {
        self.conditions.insert(class.into(), Arc::new(factory));
        self
    }

    /// Register a custom fee factory under `class`, replacing any previous one.
    pub fn register_fee<F>(&mut self, class: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&FeeRecord) -> Result<Arc<dyn FeeBehaviour>, ProxyError> + Send + Sync + 'static,
    {
        self.fees.insert(class.into(), Arc::new(factory));
        self
    }

    /// Resolve a condition record into a concrete condition.
    ///
    /// # Errors
    ///
    /// Returns a [`ProxyError`] if the record names an unknown kind or class, or
    /// lacks the range or value a built-in kind needs.
    pub fn resolve_condition(&self, record: &ConditionRecord) -> Result<Condition, ProxyError> {
        if let Some(class) = &record.proxy_class {
            let factory = self
                .conditions
                .get(class)
                .ok_or_else(|| ProxyError::UnregisteredClass(class.clone()))?;

            return Ok(Condition::Custom(factory(record)?));
        }

        let kind = record.kind.as_deref().unwrap_or_default();

        let build = match kind {
            "count" | "coverage" | "value" => kind,
            other => return Err(ProxyError::UnknownConditionType(other.to_string())),
        };

        let range = record
            .range
            .clone()
            .ok_or_else(|| ProxyError::MissingRange(build.to_string()))?;

        let value = non_negative(build, record.value)?;

        Ok(match build {
            "count" => Condition::Count(CountCondition::new(range, value)),
            "coverage" => Condition::Coverage(CoverageCondition::new(range, value)),
            _ => Condition::Value(ValueCondition::new(range, value)),
        })
    }

    /// Resolve a fee record into a concrete fee.
    ///
    /// # Errors
    ///
    /// Returns a [`ProxyError`] if the record names an unknown kind or class, or
    /// lacks a value.
    pub fn resolve_fee(&self, record: &FeeRecord) -> Result<Fee, ProxyError> {
        if let Some(class) = &record.proxy_class {
            let factory = self
                .fees
                .get(class)
                .ok_or_else(|| ProxyError::UnregisteredClass(class.clone()))?;

            return Ok(Fee::Custom(factory(record)?));
        }

        match record.kind.as_deref().unwrap_or_default() {
            "percentage" => Ok(Fee::Percentage(PercentageFee::new(
                record.range.clone(),
                non_negative("percentage", record.value)?,
                record.percentage_base,
            ))),
            "absolute" => Ok(Fee::Absolute(AbsoluteFee::new(
                record.range.clone(),
                non_negative("absolute", record.value)?,
            ))),
            other => Err(ProxyError::UnknownFeeType(other.to_string())),
        }
    }
}

fn non_negative(kind: &str, value: Option<Decimal>) -> Result<Decimal, ProxyError> {
    let value = value.ok_or_else(|| ProxyError::MissingValue(kind.to_string()))?;

    if value.is_sign_negative() {
        return Err(ProxyError::InvalidValue {
            kind: kind.to_string(),
            value,
        });
    }

    Ok(value)
}

/// Anything that can be turned into a [`Condition`].
///
/// Resolving an already resolved condition returns it unchanged.
pub trait IntoCondition {
    /// Resolve against `registry`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProxyError`] if resolution fails.
    fn into_condition(self, registry: &ProxyRegistry) -> Result<Condition, ProxyError>;
}

impl IntoCondition for Condition {
    fn into_condition(self, _registry: &ProxyRegistry) -> Result<Condition, ProxyError> {
        Ok(self)
    }
}

impl IntoCondition for ConditionRecord {
    fn into_condition(self, registry: &ProxyRegistry) -> Result<Condition, ProxyError> {
        registry.resolve_condition(&self)
    }
}

impl IntoCondition for &ConditionRecord {
    fn into_condition(self, registry: &ProxyRegistry) -> Result<Condition, ProxyError> {
        registry.resolve_condition(self)
    }
}

/// Anything that can be turned into a [`Fee`].
///
/// Resolving an already resolved fee returns it unchanged.
pub trait IntoFee {
    /// Resolve against `registry`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProxyError`] if resolution fails.
    fn into_fee(self, registry: &ProxyRegistry) -> Result<Fee, ProxyError>;
}

impl IntoFee for Fee {
    fn into_fee(self, _registry: &ProxyRegistry) -> Result<Fee, ProxyError> {
        Ok(self)
    }
}

impl IntoFee for FeeRecord {
    fn into_fee(self, registry: &ProxyRegistry) -> Result<Fee, ProxyError> {
        registry.resolve_fee(&self)
    }
}

impl IntoFee for &FeeRecord {
    fn into_fee(self, registry: &ProxyRegistry) -> Result<Fee, ProxyError> {
        registry.resolve_fee(self)
    }
}
