#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Monitor Core
//!
//! Reentrant mutual exclusion for threads.
//!
//! The central type is [`ReentrantLock`]: a lock the holding thread may
//! enter again without deadlocking itself. Besides the usual
//! enter/try-enter/exit it exposes its owner, recursion depth and inner
//! mutex, so that a condition-variable wait can give up every level of the
//! lock at once and restore exactly that many afterwards.
//!
//! On top of the lock this crate provides:
//!
//! - [`Monitor`]: a cloneable handle with checked exit and `synchronize`
//! - [`ConditionVariable`]: wait/signal/broadcast against a monitor
//! - [`LockConfig`]: naming and ownership policy, loadable from TOML or JSON

/// Lock configuration
pub mod config;

/// Error types
pub mod error;

/// Reentrant lock, monitor and condition variable
pub mod sync;

/// Thread identities used for ownership
pub mod thread;

pub use config::{LockConfig, OwnerCheck};
pub use error::{ConfigError, LockError};
pub use sync::{ConditionVariable, Monitor, ReentrantLock, ReentrantLockGuard};
pub use thread::ThreadIdentity;
