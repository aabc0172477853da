//! Shareable monitor handle.

use std::fmt;
use std::sync::Arc;

use crate::config::LockConfig;
use crate::error::Result;
use crate::sync::cond::ConditionVariable;
use crate::sync::reentrant::{ReentrantLock, ReentrantLockGuard};
use crate::thread::ThreadIdentity;

/// A cloneable handle to a [`ReentrantLock`], with checked exit, scoped
/// synchronization and condition variables.
///
/// ```
/// use monitor_core::Monitor;
///
/// let monitor = Monitor::new();
/// let total = monitor.synchronize(|| {
///     // Nested sections on the same thread do not deadlock.
///     monitor.synchronize(|| 40) + 2
/// });
/// assert_eq!(total, 42);
/// assert!(!monitor.is_locked());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Monitor {
    lock: Arc<ReentrantLock>,
}

impl Monitor {
    /// Create a monitor around a fresh lock.
    pub fn new() -> Self {
        Self::from_lock(ReentrantLock::new())
    }

    /// Create a monitor whose lock is configured by `config`.
    pub fn with_config(config: LockConfig) -> Self {
        Self::from_lock(ReentrantLock::with_config(config))
    }

    /// Wrap an existing lock.
    pub fn from_lock(lock: ReentrantLock) -> Self {
        Self {
            lock: Arc::new(lock),
        }
    }

    /// The underlying lock.
    pub fn core(&self) -> &ReentrantLock {
        &self.lock
    }

    /// Enter the monitor, blocking until it is available.
    pub fn enter(&self) {
        self.lock.enter();
    }

    /// Enter the monitor if no other thread holds it.
    pub fn try_enter(&self) -> bool {
        self.lock.try_enter()
    }

    /// Leave the monitor once. Fails if the calling thread does not own it.
    pub fn exit(&self) -> Result<()> {
        self.lock.try_exit()
    }

    /// Whether any thread holds the monitor.
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Whether the calling thread holds the monitor.
    pub fn is_owned(&self) -> bool {
        self.lock.is_owned()
    }

    /// Fail unless the calling thread holds the monitor.
    pub fn check_owner(&self) -> Result<()> {
        self.lock.check_owner()
    }

    /// Run `f` inside the monitor. The monitor is left even if `f` panics.
    pub fn synchronize<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.lock.lock();
        f()
    }

    /// Enter the monitor and leave it when the returned guard drops.
    pub fn guard(&self) -> ReentrantLockGuard<'_> {
        self.lock.lock()
    }

    /// Create a condition variable bound to this monitor.
    pub fn new_cond(&self) -> ConditionVariable {
        ConditionVariable::new(self.clone())
    }

    /// Give up the whole recursion depth of the calling thread, keeping the
    /// inner mutex locked. See [`ReentrantLock::exit_for_cond`].
    pub fn exit_for_cond(&self) -> Result<usize> {
        self.lock.exit_for_cond()
    }

    /// Restore the calling thread as owner at depth `count`.
    ///
    /// # Safety
    ///
    /// Same contract as [`ReentrantLock::enter_for_cond`] for the calling
    /// thread.
    pub unsafe fn enter_for_cond(&self, count: usize) {
        self.lock.enter_for_cond(ThreadIdentity::current(), count);
    }
}

impl fmt::Display for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.lock, f)
    }
}
