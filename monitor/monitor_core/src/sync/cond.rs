//! Condition variables for monitors.
//!
//! A wait gives up the monitor's whole recursion depth, sleeps on a
//! [`parking_lot::Condvar`] against the monitor's inner mutex, and restores
//! the same depth once the mutex has been reacquired.

use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::time::Duration;

use log::trace;
use parking_lot::{Condvar, MutexGuard};

use crate::error::Result;
use crate::sync::monitor::Monitor;
use crate::sync::reentrant::ReentrantLock;
use crate::thread::ThreadIdentity;

/// A condition variable bound to a [`Monitor`].
///
/// Every method must be called by the thread that owns the monitor.
#[derive(Clone, Debug)]
pub struct ConditionVariable {
    monitor: Monitor,
    cond: Arc<Condvar>,
}

impl ConditionVariable {
    pub(crate) fn new(monitor: Monitor) -> Self {
        Self {
            monitor,
            cond: Arc::new(Condvar::new()),
        }
    }

    /// The monitor this condition variable waits on.
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Release the monitor and block until signalled, then reacquire it at
    /// the same recursion depth.
    pub fn wait(&self) -> Result<()> {
        self.wait_inner(None).map(|_| ())
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`. Returns
    /// `false` if the timeout elapsed before a signal arrived. The monitor is
    /// reacquired either way.
    pub fn wait_for(&self, timeout: Duration) -> Result<bool> {
        self.wait_inner(Some(timeout))
    }

    /// Wait as long as `condition` holds.
    pub fn wait_while<F>(&self, mut condition: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        while condition() {
            self.wait()?;
        }
        Ok(())
    }

    /// Wait until `condition` holds.
    pub fn wait_until<F>(&self, mut condition: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        self.wait_while(|| !condition())
    }

    /// Wake one waiting thread.
    pub fn signal(&self) -> Result<()> {
        self.monitor.check_owner()?;
        self.cond.notify_one();
        Ok(())
    }

    /// Wake every waiting thread.
    pub fn broadcast(&self) -> Result<()> {
        self.monitor.check_owner()?;
        self.cond.notify_all();
        Ok(())
    }

    fn wait_inner(&self, timeout: Option<Duration>) -> Result<bool> {
        self.wait_with(|guard| match timeout {
            Some(timeout) => !self.cond.wait_for(guard, timeout).timed_out(),
            None => {
                self.cond.wait(guard);
                true
            }
        })
    }

    /// Give up the monitor, run `park` against the inner mutex, and restore
    /// the monitor even if `park` unwinds.
    fn wait_with<F>(&self, park: F) -> Result<bool>
    where
        F: FnOnce(&mut MutexGuard<'_, ()>) -> bool,
    {
        let lock = self.monitor.core();
        let me = ThreadIdentity::current();
        let count = lock.exit_for_cond()?;
        let _restore = Restore {
            lock,
            thread: me,
            count,
        };

        trace!("Waiting on condition: {} (depth: {})", lock, count);

        // SAFETY: exit_for_cond succeeded, so this thread held the inner mutex
        // with its guard forgotten, and it still does. The guard is never
        // dropped, so the mutex stays locked after the wait for `_restore`.
        let mut guard = ManuallyDrop::new(unsafe { lock.mutex_for_cond().make_guard_unchecked() });
        Ok(park(&mut *guard))
    }
}

/// Restores a waiter's ownership, including when the wait unwinds.
struct Restore<'a> {
    lock: &'a ReentrantLock,
    thread: ThreadIdentity,
    count: usize,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        // SAFETY: the waiter's guard over the inner mutex is held in a
        // ManuallyDrop, so the mutex is locked on its behalf here.
        unsafe { self.lock.enter_for_cond(self.thread, self.count) };
    }
}
