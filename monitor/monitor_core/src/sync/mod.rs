//! Reentrant locking and the condition-variable protocol built on it.
//!
//! - [`ReentrantLock`]: the lock itself, with the save/restore pair that
//!   condition variables need
//! - [`Monitor`]: a shareable handle with checked exit and scoped sections
//! - [`ConditionVariable`]: waits that release the full recursion depth

pub mod cond;
pub mod monitor;
pub mod reentrant;

pub use cond::ConditionVariable;
pub use monitor::Monitor;
pub use reentrant::{InnerLock, ReentrantLock, ReentrantLockBuilder, ReentrantLockGuard};
