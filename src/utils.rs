//! Utils

use std::path::PathBuf;

use clap::Parser;
use jiff::Timestamp;

use crate::{
    applicator::Applicator,
    config::{ConfigError, FeeSettings},
    rules::{Customer, SessionContext},
};

/// Arguments for evaluating fixture baskets
#[derive(Debug, Parser)]
#[command(name = "levy", about = "Evaluate conditional fees for fixture baskets", long_about = None)]
pub struct EvaluateArgs {
    /// Fixture set to load products, baskets and rules from
    #[arg(short, long, env = "LEVY_FIXTURE", default_value = "standard")]
    pub fixture: String,

    /// Basket to evaluate; every basket in the set when omitted
    #[arg(short, long)]
    pub basket: Option<String>,

    /// Settings file (YAML)
    #[arg(short, long, env = "LEVY_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Instant to evaluate rule windows at (e.g. 2026-01-15T12:00:00Z); defaults to now
    #[arg(long, env = "LEVY_AT")]
    pub at: Option<Timestamp>,

    /// Customer identifier, enabling user-scoped rules
    #[arg(long)]
    pub customer: Option<String>,

    /// Session identifier, enabling session-scoped rules
    #[arg(long)]
    pub session: Option<String>,

    /// Record usage against the rules as if each basket were placed as this order
    #[arg(short, long)]
    pub order: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,
}

impl EvaluateArgs {
    /// Build an applicator from the settings file and evaluation instant.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the settings file cannot be loaded.
    pub fn applicator(&self) -> Result<Applicator, ConfigError> {
        let settings = match &self.settings {
            Some(path) => FeeSettings::load(path)?,
            None => FeeSettings::default(),
        };

        let applicator = Applicator::new(settings);

        Ok(match self.at {
            Some(at) => applicator.with_evaluation_time(at),
            None => applicator,
        })
    }

    /// Customer for the evaluation, if one was given.
    pub fn customer(&self) -> Option<Customer> {
        self.customer.as_deref().map(Customer::new)
    }

    /// Session for the evaluation, if one was given.
    pub fn session(&self) -> Option<SessionContext> {
        self.session.as_deref().map(SessionContext::new)
    }
}
