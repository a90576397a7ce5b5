//! Engine Settings

use std::{fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::{money::RoundingPolicy, rules::DEFAULT_MAX_APPLICATIONS};

/// Settings errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the settings file
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// The application ceiling must allow at least one application.
    #[error("max_applications must be at least 1")]
    ZeroMaxApplications,
}

/// Settings shared by every evaluation.
///
/// ```yaml
/// rounding: down
/// max_applications: 10000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeeSettings {
    /// Rounding applied to fee amounts and line fragments
    pub rounding: RoundingPolicy,

    /// Upper bound on applications of one rule to one basket
    pub max_applications: u32,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            rounding: RoundingPolicy::default(),
            max_applications: DEFAULT_MAX_APPLICATIONS,
        }
    }
}

impl FeeSettings {
    /// Parse settings from YAML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the YAML is invalid or the values are out of range.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let settings: FeeSettings = serde_norway::from_str(contents)?;

        settings.validate()
    }

    /// Load settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.max_applications == 0 {
            return Err(ConfigError::ZeroMaxApplications);
        }

        Ok(self)
    }
}
