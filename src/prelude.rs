//! Levy prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    applicator::{Applicator, ApplicatorError},
    basket::{AppliedFee, Basket, BasketError, Line},
    checkout::{CheckoutError, OrderFee, order_total, record_order_fees},
    conditions::{
        Condition, ConditionBehaviour, ConditionError, ConditionRecord, CountCondition,
        CoverageCondition, ValueCondition,
    },
    config::{ConfigError, FeeSettings},
    fees::{
        AbsoluteFee, Fee, FeeBehaviour, FeeContext, FeeError, FeeRecord, PercentageBase,
        PercentageFee,
    },
    ledger::{FeeApplication, FeeApplications},
    money::{AmountError, RoundingPolicy},
    products::{Product, ProductKey},
    ranges::ProductRange,
    receipt::{Receipt, ReceiptError},
    registry::{IntoCondition, IntoFee, ProxyError, ProxyRegistry},
    results::ApplicationResult,
    rules::{
        ConditionalFee, Customer, OfferScope, RuleError, RuleKey, RuleStatus, SessionContext,
        UsageCounters, UsageLimits,
        source::{RuleSource, RuleStore, StoreError, UsageIncrement, UsageStore},
    },
};
