//! Thread identities used to track lock ownership.
//!
//! `std::thread::ThreadId` cannot be stored in an atomic, so every thread is
//! lazily assigned a process-unique, non-zero `u64` the first time it asks
//! for its identity. Identities are never reused.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: NonZeroU64 = ThreadIdentity::allocate();
}

/// Identity of an OS thread.
///
/// Two identities compare equal only if they were obtained on the same thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadIdentity(NonZeroU64);

impl ThreadIdentity {
    /// Identity of the calling thread.
    pub fn current() -> Self {
        CURRENT.with(|id| Self(*id))
    }

    /// The raw value; never zero.
    pub fn as_u64(self) -> u64 {
        self.0.get()
    }

    /// Reconstruct an identity from its raw value. Zero means "no thread".
    pub(crate) fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw encoding of an optional identity, with `0` standing for none.
    pub(crate) fn into_raw(id: Option<Self>) -> u64 {
        id.map_or(0, Self::as_u64)
    }

    fn allocate() -> NonZeroU64 {
        let raw = NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed);
        // 2^64 allocations would be needed to wrap back to zero.
        NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN)
    }
}

impl fmt::Display for ThreadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_current_is_stable() {
        assert_eq!(ThreadIdentity::current(), ThreadIdentity::current());
    }

    #[test]
    fn test_distinct_threads_have_distinct_identities() {
        let here = ThreadIdentity::current();
        let there = thread::spawn(ThreadIdentity::current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_raw_encoding() {
        let id = ThreadIdentity::current();
        assert_eq!(ThreadIdentity::from_raw(id.as_u64()), Some(id));
        assert_eq!(ThreadIdentity::from_raw(0), None);
        assert_eq!(ThreadIdentity::into_raw(None), 0);
        assert_eq!(ThreadIdentity::into_raw(Some(id)), id.as_u64());
    }

    #[test]
    fn test_display() {
        let id = ThreadIdentity::current();
        assert_eq!(id.to_string(), format!("thread#{}", id.as_u64()));
    }
}
