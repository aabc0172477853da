//! Configuration for reentrant locks.
//!
//! A [`LockConfig`] can be built in code, or loaded from TOML or JSON:
//!
//! ```toml
//! name = "session-table"
//! owner_check = "strict"
//! ```

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How [`ReentrantLock::exit`](crate::sync::ReentrantLock::exit) treats a
/// caller that does not own the lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerCheck {
    /// Decrement without checking the caller, like a bare monitor does.
    #[default]
    Relaxed,

    /// Panic when a non-owner calls `exit`.
    Strict,
}

/// Lock configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Name shown in diagnostics and log lines
    #[serde(default)]
    pub name: Option<String>,

    /// Ownership policy for `exit`
    #[serde(default)]
    pub owner_check: OwnerCheck,
}

impl LockConfig {
    /// A configuration carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. Files ending in `.json` are parsed as JSON,
    /// everything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading lock configuration from {}", path.display());

        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "Lock name cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
