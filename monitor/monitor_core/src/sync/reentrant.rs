//! Reentrant lock with condition-variable save/restore support.
//!
//! [`ReentrantLock`] wraps a plain, non-reentrant [`parking_lot::Mutex`] and
//! records which thread holds it and how many times that thread has entered.
//! The inner mutex protects its own bookkeeping: `owner` and `depth` are only
//! written right after the mutex is acquired, right before it is released,
//! or by the `*_for_cond` pair on behalf of a waiting condition variable.
//!
//! Guards of the inner mutex are forgotten on acquisition and the mutex is
//! released with `force_unlock` when the outermost `exit` runs, so that a lock
//! can be entered and exited from separate calls.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{trace, warn};
use parking_lot::Mutex;

use crate::config::{LockConfig, OwnerCheck};
use crate::error::{LockError, Result};
use crate::thread::ThreadIdentity;

/// The non-reentrant mutex underneath a [`ReentrantLock`].
pub type InnerLock = Mutex<()>;

/// A mutual-exclusion lock that its holder may re-enter.
///
/// Every successful [`enter`](Self::enter) or [`try_enter`](Self::try_enter)
/// must be paired with one [`exit`](Self::exit); the inner mutex is released
/// when the outermost pair completes. [`lock`](Self::lock) does the pairing
/// with an RAII guard.
///
/// ```
/// use monitor_core::sync::ReentrantLock;
///
/// let lock = ReentrantLock::new();
/// lock.enter();
/// lock.enter();
/// assert!(lock.is_owned());
/// lock.exit();
/// lock.exit();
/// assert!(!lock.is_locked());
/// ```
pub struct ReentrantLock {
    /// The underlying mutex
    inner: Arc<InnerLock>,

    /// Raw identity of the owning thread, `0` when unheld
    owner: AtomicU64,

    /// Number of unmatched enters by the owner
    depth: AtomicUsize,

    /// Name of this lock for debugging
    name: Option<String>,

    /// What `exit` does when called by a non-owner
    owner_check: OwnerCheck,
}

impl ReentrantLock {
    /// Create an unheld lock with a fresh inner mutex.
    pub fn new() -> Self {
        Self::with_config(LockConfig::default())
    }

    /// Create an unheld lock with a name for debugging
    pub fn with_name(name: impl Into<String>) -> Self {
        Self::with_config(LockConfig::named(name))
    }

    /// Create an unheld lock from a configuration.
    pub fn with_config(config: LockConfig) -> Self {
        Self {
            inner: Arc::new(InnerLock::new(())),
            owner: AtomicU64::new(0),
            depth: AtomicUsize::new(0),
            name: config.name,
            owner_check: config.owner_check,
        }
    }

    /// Start building a lock, optionally from existing parts.
    pub fn builder() -> ReentrantLockBuilder {
        ReentrantLockBuilder::default()
    }

    /// Reassemble a lock from an inner mutex, an owner and a depth, exactly
    /// as given.
    ///
    /// # Safety
    ///
    /// If `depth` is non-zero, `inner` must be locked and its guard must have
    /// been forgotten, so that the final `exit` may release it.
    /// [`ReentrantLock::builder`] checks the parts against each other.
    pub unsafe fn from_parts(
        inner: Arc<InnerLock>,
        owner: Option<ThreadIdentity>,
        depth: usize,
    ) -> Self {
        Self::from_parts_with_config(inner, owner, depth, LockConfig::default())
    }

    unsafe fn from_parts_with_config(
        inner: Arc<InnerLock>,
        owner: Option<ThreadIdentity>,
        depth: usize,
        config: LockConfig,
    ) -> Self {
        Self {
            inner,
            owner: AtomicU64::new(ThreadIdentity::into_raw(owner)),
            depth: AtomicUsize::new(depth),
            name: config.name,
            owner_check: config.owner_check,
        }
    }

    /// Acquire the lock, blocking until it is available. Returns immediately
    /// if the calling thread already owns it.
    pub fn enter(&self) {
        let me = ThreadIdentity::current();
        if self.is_owner(me) {
            self.reenter(me);
            return;
        }

        let start = Instant::now();
        mem::forget(self.inner.lock());
        self.acquired(me);

        trace!(
            "Lock acquired: {} by {} (wait time: {:.2}ms)",
            self.label(),
            me,
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    /// Acquire the lock without blocking. Returns `false`, leaving the lock
    /// untouched, if another thread holds it.
    pub fn try_enter(&self) -> bool {
        let me = ThreadIdentity::current();
        if self.is_owner(me) {
            self.reenter(me);
            return true;
        }

        match self.inner.try_lock() {
            Some(guard) => {
                mem::forget(guard);
                self.acquired(me);
                trace!("Lock acquired (try_enter): {} by {}", self.label(), me);
                true
            }
            None => false,
        }
    }

    /// Acquire the lock, giving up after `timeout`.
    pub fn try_enter_for(&self, timeout: Duration) -> Result<()> {
        let me = ThreadIdentity::current();
        if self.is_owner(me) {
            self.reenter(me);
            return Ok(());
        }

        let start = Instant::now();
        let guard = self.inner.try_lock_for(timeout).ok_or_else(|| {
            warn!(
                "Lock timeout: {} for {} (waited: {:.2}ms, timeout: {:.2}ms)",
                self.label(),
                me,
                start.elapsed().as_secs_f64() * 1000.0,
                timeout.as_secs_f64() * 1000.0
            );
            LockError::Timeout(timeout)
        })?;
        mem::forget(guard);
        self.acquired(me);

        trace!(
            "Lock acquired (with timeout): {} by {} (wait time: {:.2}ms)",
            self.label(),
            me,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// Leave one level of the lock, releasing the inner mutex when the
    /// outermost level is left.
    ///
    /// The caller is not checked unless the lock was configured with
    /// [`OwnerCheck::Strict`], in which case a non-owner call panics. Use
    /// [`try_exit`](Self::try_exit) for a checked exit that reports misuse
    /// as an error. Exiting a lock nobody holds does nothing.
    pub fn exit(&self) {
        let me = ThreadIdentity::current();
        if !self.is_owner(me) {
            match self.owner_check {
                OwnerCheck::Strict => panic!("{}", self.not_owner(me)),
                OwnerCheck::Relaxed => {
                    warn!("Lock exit by non-owner: {} from {}", self.label(), me)
                }
            }
        }
        self.leave();
    }

    /// Leave one level of the lock, failing if the caller is not the owner.
    pub fn try_exit(&self) -> Result<()> {
        self.check_owner()?;
        self.leave();
        Ok(())
    }

    /// Whether any thread holds the inner mutex. Advisory only.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Whether the calling thread holds the lock. Advisory only.
    pub fn is_owned(&self) -> bool {
        self.inner.is_locked() && self.is_owner(ThreadIdentity::current())
    }

    /// The thread holding the lock, if any.
    pub fn owner(&self) -> Option<ThreadIdentity> {
        ThreadIdentity::from_raw(self.owner.load(Ordering::Relaxed))
    }

    /// Current recursion depth; `0` when unheld.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Get the name of this lock
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Fail with [`LockError::NotOwner`] unless the calling thread owns the lock.
    pub fn check_owner(&self) -> Result<()> {
        let me = ThreadIdentity::current();
        if self.is_owner(me) {
            Ok(())
        } else {
            Err(self.not_owner(me))
        }
    }

    /// Restore ownership after a condition-variable wait.
    ///
    /// Sets the owner to `thread` and the depth to `count` without touching
    /// the inner mutex.
    ///
    /// # Safety
    ///
    /// The inner mutex (see [`mutex_for_cond`](Self::mutex_for_cond)) must be
    /// locked on behalf of `thread`, with its guard forgotten, and no other
    /// thread may be using this lock's bookkeeping. A condition-variable wait
    /// satisfies both once it has reacquired the mutex.
    pub unsafe fn enter_for_cond(&self, thread: ThreadIdentity, count: usize) {
        self.owner.store(thread.as_u64(), Ordering::Relaxed);
        self.depth.store(count, Ordering::Relaxed);
        trace!(
            "Lock restored after wait: {} by {} (depth: {})",
            self.label(),
            thread,
            count
        );
    }

    /// Save and clear ownership before a condition-variable wait, returning
    /// the recursion depth that [`enter_for_cond`](Self::enter_for_cond)
    /// must later restore.
    ///
    /// The inner mutex stays locked; the caller releases it as part of the
    /// wait itself.
    pub fn exit_for_cond(&self) -> Result<usize> {
        self.check_owner()?;
        self.owner.store(0, Ordering::Relaxed);
        let depth = self.depth.swap(0, Ordering::Relaxed);
        trace!("Lock saved for wait: {} (depth: {})", self.label(), depth);
        Ok(depth)
    }

    /// The inner mutex, for a condition variable to wait on.
    pub fn mutex_for_cond(&self) -> &Arc<InnerLock> {
        &self.inner
    }

    /// Enter the lock and return a guard that exits it when dropped.
    pub fn lock(&self) -> ReentrantLockGuard<'_> {
        self.enter();
        ReentrantLockGuard::new(self)
    }

    /// Like [`lock`](Self::lock), but without blocking.
    pub fn try_lock(&self) -> Option<ReentrantLockGuard<'_>> {
        self.try_enter().then(|| ReentrantLockGuard::new(self))
    }

    fn is_owner(&self, me: ThreadIdentity) -> bool {
        // Normally only `me` stores `me`. `enter_for_cond` and a held
        // reassembly may store another thread's identity; both are unsafe and
        // their callers guarantee that thread holds the mutex.
        self.owner.load(Ordering::Relaxed) == me.as_u64()
    }

    fn reenter(&self, me: ThreadIdentity) {
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("Lock reentered: {} by {} (depth: {})", self.label(), me, depth);
    }

    fn acquired(&self, me: ThreadIdentity) {
        self.owner.store(me.as_u64(), Ordering::Relaxed);
        self.depth.store(1, Ordering::Relaxed);
    }

    fn leave(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |depth| {
                depth.checked_sub(1)
            });

        match previous {
            Err(_) => warn!("Lock exit while unheld: {}", self.label()),
            Ok(1) => {
                self.owner.store(0, Ordering::Relaxed);
                // SAFETY: depth only becomes 1 after the inner mutex is acquired
                // and its guard forgotten, and only this call moved it to 0.
                unsafe { self.inner.force_unlock() };
                trace!("Lock released: {}", self.label());
            }
            Ok(_) => {}
        }
    }

    fn not_owner(&self, me: ThreadIdentity) -> LockError {
        LockError::NotOwner {
            current: me,
            owner: self.owner(),
        }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<ReentrantLock")?;
        if let Some(name) = &self.name {
            write!(f, ":{}", name)?;
        }
        write!(f, " mutex:{:p} owner:", Arc::as_ptr(&self.inner))?;
        match self.owner() {
            Some(owner) => write!(f, "{}", owner)?,
            None => write!(f, "none")?,
        }
        write!(f, " depth:{}>", self.depth())
    }
}

impl fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLock")
            .field("name", &self.name)
            .field("mutex", &Arc::as_ptr(&self.inner))
            .field("owner", &self.owner())
            .field("depth", &self.depth())
            .field("owner_check", &self.owner_check)
            .finish()
    }
}

/// Exits a [`ReentrantLock`] once when dropped, including during unwinding.
#[must_use = "if unused the lock will immediately exit"]
pub struct ReentrantLockGuard<'a> {
    lock: &'a ReentrantLock,

    /// Exiting must happen on the entering thread
    _not_send: PhantomData<*const ()>,
}

impl<'a> ReentrantLockGuard<'a> {
    fn new(lock: &'a ReentrantLock) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// The lock this guard holds.
    pub fn lock(&self) -> &'a ReentrantLock {
        self.lock
    }
}

impl Drop for ReentrantLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.exit();
    }
}

/// Builds a [`ReentrantLock`], either fresh or from existing parts.
///
/// Supplying none of [`mutex`](Self::mutex), [`owner`](Self::owner) and
/// [`depth`](Self::depth) builds a fresh lock; supplying all three
/// reassembles one. The parts are checked against each other.
///
/// [`build`](Self::build) only reassembles unheld locks. A held lock needs
/// [`build_unchecked`](Self::build_unchecked), because whether the mutex's
/// guard was forgotten cannot be observed.
#[derive(Debug, Default)]
pub struct ReentrantLockBuilder {
    config: LockConfig,
    mutex: Option<Arc<InnerLock>>,
    owner: Option<Option<ThreadIdentity>>,
    depth: Option<usize>,
}

impl ReentrantLockBuilder {
    /// Use `config` for the lock's name and ownership policy.
    pub fn config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    /// Name the lock for debugging.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Set the ownership policy for `exit`.
    pub fn owner_check(mut self, owner_check: OwnerCheck) -> Self {
        self.config.owner_check = owner_check;
        self
    }

    /// Reuse an existing inner mutex.
    pub fn mutex(mut self, mutex: Arc<InnerLock>) -> Self {
        self.mutex = Some(mutex);
        self
    }

    /// Record `owner` as holding the lock.
    pub fn owner(mut self, owner: Option<ThreadIdentity>) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Record the recursion depth.
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Build the lock. Reassembling a held lock (an owner is given) fails
    /// with [`LockError::InconsistentState`].
    pub fn build(self) -> Result<ReentrantLock> {
        let (config, parts) = self.into_parts()?;
        match parts {
            None => Ok(ReentrantLock::with_config(config)),
            Some((_, Some(owner), _)) => Err(LockError::InconsistentState(format!(
                "owner {} recorded; a held lock needs build_unchecked",
                owner
            ))),
            Some((mutex, None, depth)) => {
                // SAFETY: into_parts checked that no owner means depth 0, and a
                // lock at depth 0 never releases its mutex.
                Ok(unsafe { ReentrantLock::from_parts_with_config(mutex, None, depth, config) })
            }
        }
    }

    /// Build the lock, allowing a held reassembly.
    ///
    /// The part count and the owner/depth pairing are still checked.
    ///
    /// # Safety
    ///
    /// Same contract as [`ReentrantLock::from_parts`]: if an owner is given,
    /// the mutex must be locked with its guard forgotten, so that the final
    /// `exit` may release it.
    pub unsafe fn build_unchecked(self) -> Result<ReentrantLock> {
        let (config, parts) = self.into_parts()?;
        match parts {
            None => Ok(ReentrantLock::with_config(config)),
            Some((mutex, owner, depth)) => Ok(ReentrantLock::from_parts_with_config(
                mutex, owner, depth, config,
            )),
        }
    }

    fn into_parts(self) -> Result<(LockConfig, Option<Parts>)> {
        let given = usize::from(self.mutex.is_some())
            + usize::from(self.owner.is_some())
            + usize::from(self.depth.is_some());

        match (self.mutex, self.owner, self.depth) {
            (None, None, None) => Ok((self.config, None)),
            (Some(mutex), Some(owner), Some(depth)) => {
                check_parts(&mutex, owner, depth)?;
                Ok((self.config, Some((mutex, owner, depth))))
            }
            _ => Err(LockError::InvalidParts { given }),
        }
    }
}

type Parts = (Arc<InnerLock>, Option<ThreadIdentity>, usize);

fn check_parts(mutex: &InnerLock, owner: Option<ThreadIdentity>, depth: usize) -> Result<()> {
    match owner {
        Some(owner) if depth == 0 => Err(LockError::InconsistentState(format!(
            "owner {} recorded with depth 0",
            owner
        ))),
        Some(owner) if !mutex.is_locked() => Err(LockError::InconsistentState(format!(
            "owner {} recorded but the mutex is unlocked",
            owner
        ))),
        None if depth != 0 => Err(LockError::InconsistentState(format!(
            "depth {} recorded without an owner",
            depth
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_fresh_lock_is_unheld() {
        let lock = ReentrantLock::new();
        assert!(!lock.is_locked());
        assert!(!lock.is_owned());
        assert_eq!(lock.owner(), None);
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    fn test_reentrancy() {
        let lock = ReentrantLock::new();

        for n in 1..=5 {
            lock.enter();
            assert!(lock.is_owned());
            assert_eq!(lock.depth(), n);
        }

        for n in (0..5).rev() {
            lock.exit();
            assert_eq!(lock.depth(), n);
        }

        assert!(!lock.is_locked());
        assert_eq!(lock.owner(), None);
    }

    #[test]
    fn test_exit_releases_only_at_outermost_level() {
        let lock = ReentrantLock::new();
        lock.enter();
        lock.enter();
        lock.enter();
        assert!(lock.is_owned());

        lock.exit();
        lock.exit();
        assert!(lock.is_owned());
        assert!(lock.is_locked());

        lock.exit();
        assert!(!lock.is_locked());
        assert_eq!(lock.owner(), None);
    }

    #[test]
    fn test_try_enter_from_other_thread_fails() {
        let lock = Arc::new(ReentrantLock::new());
        lock.enter();
        lock.enter();
        let me = ThreadIdentity::current();

        let lock_clone = Arc::clone(&lock);
        let acquired = thread::spawn(move || lock_clone.try_enter())
            .join()
            .unwrap();

        assert!(!acquired);
        assert_eq!(lock.owner(), Some(me));
        assert_eq!(lock.depth(), 2);

        lock.exit();
        lock.exit();
    }

    #[test]
    fn test_try_enter_is_reentrant() {
        let lock = ReentrantLock::new();
        assert!(lock.try_enter());
        assert!(lock.try_enter());
        assert_eq!(lock.depth(), 2);
        lock.exit();
        lock.exit();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_enter_blocks_until_fully_released() {
        let lock = Arc::new(ReentrantLock::new());
        lock.enter();
        lock.enter();

        let entered = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();

        let lock_clone = Arc::clone(&lock);
        let entered_clone = Arc::clone(&entered);
        let handle = thread::spawn(move || {
            started_tx.send(()).unwrap();
            lock_clone.enter();
            entered_clone.store(true, Ordering::SeqCst);
            lock_clone.exit();
        });

        started_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));

        lock.exit();
        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));

        lock.exit();
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_try_enter_for_timeout() {
        let lock = Arc::new(ReentrantLock::with_name("timeout_lock"));
        lock.enter();

        let lock_clone = Arc::clone(&lock);
        let result = thread::spawn(move || lock_clone.try_enter_for(Duration::from_millis(10)))
            .join()
            .unwrap();
        assert!(matches!(result, Err(LockError::Timeout(_))));

        // The owner never waits.
        assert!(lock.try_enter_for(Duration::from_millis(10)).is_ok());
        assert_eq!(lock.depth(), 2);
        lock.exit();
        lock.exit();
    }

    #[test]
    fn test_try_enter_for_acquires_when_released() {
        let lock = Arc::new(ReentrantLock::new());
        lock.enter();

        let lock_clone = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            let result = lock_clone.try_enter_for(Duration::from_secs(5));
            let owned = lock_clone.is_owned();
            lock_clone.exit();
            (result, owned)
        });

        thread::sleep(Duration::from_millis(20));
        lock.exit();

        let (result, owned) = handle.join().unwrap();
        assert!(result.is_ok());
        assert!(owned);
    }

    #[test]
    fn test_save_and_restore_for_cond() {
        let lock = ReentrantLock::new();
        let me = ThreadIdentity::current();
        lock.enter();
        lock.enter();

        let depth = lock.exit_for_cond().unwrap();
        assert_eq!(depth, 2);
        assert_eq!(lock.owner(), None);
        assert_eq!(lock.depth(), 0);
        // Releasing the mutex is left to the condition variable.
        assert!(lock.is_locked());

        unsafe { lock.enter_for_cond(me, depth) };
        assert!(lock.is_owned());

        lock.exit();
        assert!(lock.is_owned());
        assert_eq!(lock.depth(), 1);

        lock.exit();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_ownership_enforcement() {
        let lock = Arc::new(ReentrantLock::new());

        // Unheld: nobody owns it.
        assert!(matches!(
            lock.check_owner(),
            Err(LockError::NotOwner { owner: None, .. })
        ));
        assert!(lock.exit_for_cond().is_err());

        lock.enter();
        let me = ThreadIdentity::current();
        assert!(lock.check_owner().is_ok());

        let lock_clone = Arc::clone(&lock);
        let (check, save) = thread::spawn(move || (lock_clone.check_owner(), lock_clone.exit_for_cond()))
            .join()
            .unwrap();

        match check {
            Err(LockError::NotOwner { current, owner }) => {
                assert_ne!(current, me);
                assert_eq!(owner, Some(me));
            }
            other => panic!("Expected NotOwner, got {:?}", other),
        }
        assert!(save.is_err());
        assert_eq!(lock.depth(), 1);

        lock.exit();
    }

    #[test]
    fn test_try_exit_checks_owner() {
        let lock = ReentrantLock::new();
        assert!(lock.try_exit().is_err());

        lock.enter();
        assert!(lock.try_exit().is_ok());
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_relaxed_exit_on_unheld_lock_is_ignored() {
        let lock = ReentrantLock::new();
        lock.exit();
        assert_eq!(lock.depth(), 0);
        assert!(!lock.is_locked());

        lock.enter();
        assert_eq!(lock.depth(), 1);
        lock.exit();
    }

    #[test]
    fn test_strict_exit_by_non_owner_panics() {
        let lock = Arc::new(
            ReentrantLock::builder()
                .owner_check(OwnerCheck::Strict)
                .build()
                .unwrap(),
        );
        lock.enter();

        let lock_clone = Arc::clone(&lock);
        let result = thread::spawn(move || lock_clone.exit()).join();
        assert!(result.is_err());
        assert!(lock.is_owned());
        assert_eq!(lock.depth(), 1);

        lock.exit();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_guard_exits_on_drop() {
        let lock = ReentrantLock::new();
        {
            let _outer = lock.lock();
            {
                let inner = lock.try_lock();
                assert!(inner.is_some());
                assert_eq!(lock.depth(), 2);
            }
            assert_eq!(lock.depth(), 1);
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_queries_do_not_mutate() {
        let lock = ReentrantLock::new();
        for _ in 0..3 {
            assert!(!lock.is_locked());
            assert!(!lock.is_owned());
            assert_eq!(lock.owner(), None);
        }
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    fn test_builder_fresh() {
        let lock = ReentrantLock::builder().name("fresh").build().unwrap();
        assert_eq!(lock.name(), Some("fresh"));
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_builder_rejects_partial_parts() {
        let result = ReentrantLock::builder()
            .mutex(Arc::new(InnerLock::new(())))
            .depth(1)
            .build();
        assert_eq!(result.unwrap_err(), LockError::InvalidParts { given: 2 });

        let result = ReentrantLock::builder().owner(None).build();
        assert_eq!(result.unwrap_err(), LockError::InvalidParts { given: 1 });
    }

    #[test]
    fn test_builder_rejects_inconsistent_parts() {
        let me = ThreadIdentity::current();

        let unlocked = Arc::new(InnerLock::new(()));
        let result = ReentrantLock::builder()
            .mutex(Arc::clone(&unlocked))
            .owner(Some(me))
            .depth(1)
            .build();
        assert!(matches!(result, Err(LockError::InconsistentState(_))));

        let result = ReentrantLock::builder()
            .mutex(Arc::clone(&unlocked))
            .owner(None)
            .depth(3)
            .build();
        assert!(matches!(result, Err(LockError::InconsistentState(_))));
    }

    #[test]
    fn test_builder_reassembles_held_lock() {
        let original = ReentrantLock::new();
        original.enter();
        original.enter();
        let me = ThreadIdentity::current();
        let depth = original.exit_for_cond().unwrap();
        let mutex = Arc::clone(original.mutex_for_cond());

        let held = ReentrantLock::builder()
            .mutex(Arc::clone(&mutex))
            .owner(Some(me))
            .depth(depth)
            .build();
        assert!(matches!(held, Err(LockError::InconsistentState(_))));

        // SAFETY: exit_for_cond left the mutex locked with its guard forgotten.
        let lock = unsafe {
            ReentrantLock::builder()
                .mutex(mutex)
                .owner(Some(me))
                .depth(depth)
                .build_unchecked()
                .unwrap()
        };

        assert!(lock.is_owned());
        lock.exit();
        lock.exit();
        assert!(!lock.is_locked());
        assert!(!original.is_locked());
    }

    #[test]
    fn test_builder_never_unlocks_a_live_guard() {
        let mutex = Arc::new(InnerLock::new(()));
        let guard = mutex.lock();

        let result = ReentrantLock::builder()
            .mutex(Arc::clone(&mutex))
            .owner(Some(ThreadIdentity::current()))
            .depth(1)
            .build();
        assert!(matches!(result, Err(LockError::InconsistentState(_))));
        assert!(mutex.try_lock().is_none());

        drop(guard);
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_builder_reassembles_unheld_parts() {
        let mutex = Arc::new(InnerLock::new(()));
        let lock = ReentrantLock::builder()
            .mutex(Arc::clone(&mutex))
            .owner(None)
            .depth(0)
            .build()
            .unwrap();
        assert!(!lock.is_locked());

        lock.exit();
        assert!(!mutex.is_locked());

        lock.enter();
        assert!(mutex.is_locked());
        lock.exit();
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_from_parts_unheld() {
        let lock = unsafe { ReentrantLock::from_parts(Arc::new(InnerLock::new(())), None, 0) };
        assert!(!lock.is_locked());
        lock.enter();
        assert!(lock.is_owned());
        lock.exit();
    }

    #[test]
    fn test_display() {
        let lock = ReentrantLock::with_name("diag");
        let text = lock.to_string();
        assert!(text.starts_with("#<ReentrantLock:diag mutex:0x"));
        assert!(text.ends_with("owner:none depth:0>"));

        lock.enter();
        let text = lock.to_string();
        assert!(text.contains(&format!("owner:{}", ThreadIdentity::current())));
        assert!(text.ends_with("depth:1>"));
        lock.exit();
    }

    #[test]
    fn test_contention() {
        let lock = Arc::new(ReentrantLock::with_name("contended"));
        let counter = Arc::new(AtomicUsize::new(0));
        let threads = 8;
        let iterations = 100;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..iterations {
                        let _outer = lock.lock();
                        let _inner = lock.lock();
                        // Non-atomic read-modify-write; only safe under the lock.
                        let value = counter.load(Ordering::Relaxed);
                        thread::yield_now();
                        counter.store(value + 1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::Relaxed), threads * iterations);
        assert!(!lock.is_locked());
    }
}
