//! Error types for monitor locks and their configuration.

use std::time::Duration;

use thiserror::Error;

use crate::thread::ThreadIdentity;

/// Error raised by lock operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The calling thread does not own the lock
    #[error("current thread not owner ({current}, owner: {})", display_owner(.owner))]
    NotOwner {
        /// The thread that attempted the operation
        current: ThreadIdentity,
        /// The thread that actually owns the lock, if any
        owner: Option<ThreadIdentity>,
    },

    /// A reconstruction was given some, but not all, of its parts
    #[error("wrong number of lock parts (given {given}, expected 0 or 3)")]
    InvalidParts {
        /// Number of parts supplied
        given: usize,
    },

    /// A reconstruction describes a state the lock can never be in
    #[error("inconsistent lock state: {0}")]
    InconsistentState(String),

    /// The lock could not be acquired within the specified timeout
    #[error("lock acquisition timed out after {0:?}")]
    Timeout(Duration),
}

fn display_owner(owner: &Option<ThreadIdentity>) -> String {
    owner.map_or_else(|| "none".to_string(), |id| id.to_string())
}

/// Error raised while loading or validating a [`LockConfig`](crate::config::LockConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to load configuration: {0}")]
    Load(#[from] std::io::Error),

    /// The configuration text could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration parsed but is not usable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result alias for lock operations.
pub type Result<T, E = LockError> = std::result::Result<T, E>;
