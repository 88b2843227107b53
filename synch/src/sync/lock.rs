//! # Lock.
//!
//! A [`Lock`] allows **only one thread at a time** into a critical section.
//! Unlike the spinlock, a thread that finds the lock taken is parked until
//! the owner releases it.
//!
//! The lock remembers which thread owns it. Only that thread may release
//! it, and [`Lock::held_by_caller`] lets code assert that it runs inside the
//! critical section. Locks are not re-entrant: an owner that acquires its own
//! lock again sleeps forever.
//!
//! ```
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! use kthread::thread::ThreadBuilder;
//! use synch::sync::Lock;
//!
//! let lock = Arc::new(Lock::new("counter").unwrap());
//! let counter = Arc::new(AtomicUsize::new(0));
//! let handles = (0..4)
//!     .map(|_| {
//!         let (lock, counter) = (lock.clone(), counter.clone());
//!         ThreadBuilder::new("work")
//!             .spawn(move || {
//!                 lock.acquire();
//!                 let v = counter.load(Ordering::Relaxed);
//!                 counter.store(v + 1, Ordering::Relaxed);
//!                 lock.release();
//!             })
//!             .unwrap()
//!     })
//!     .collect::<Vec<_>>();
//! for handle in handles {
//!     assert_eq!(handle.join(), 0);
//! }
//! assert_eq!(counter.load(Ordering::Relaxed), 4);
//! ```

use kthread::{
    KernelError,
    sync::{SpinLock, WouldBlock},
    thread::Current,
    util::kstrdup,
    wchan::WaitQueue,
};

/// A sleeping mutual exclusion lock.
pub struct Lock {
    name: String,
    owner: SpinLock<Option<u64>>,
    wchan: WaitQueue,
}

impl Lock {
    /// Creates an unowned lock named `name`.
    ///
    /// # Errors
    /// Returns [`KernelError::NoMemory`] if the lock cannot be allocated.
    pub fn new(name: &str) -> Result<Self, KernelError> {
        Ok(Self {
            name: kstrdup(name)?,
            owner: SpinLock::new(None),
            wchan: WaitQueue::new(name)?,
        })
    }

    /// Name of this lock.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires the lock, sleeping until it is free.
    ///
    /// # Panics
    /// Panics if the current thread must not block.
    #[track_caller]
    pub fn acquire(&self) {
        super::assert_may_block("Lock::acquire");

        let me = Current::get_tid();
        let mut owner = self.owner.lock();
        while owner.is_some() {
            self.wchan.sleep(owner);
            owner = self.owner.lock();
        }
        *owner = Some(me);
        owner.unlock();
    }

    /// Acquires the lock only if it is free right now.
    ///
    /// # Errors
    /// Returns [`WouldBlock`] if another thread (or the caller) owns the
    /// lock.
    pub fn try_acquire(&self) -> Result<(), WouldBlock> {
        let me = Current::get_tid();
        let mut owner = self.owner.lock();
        let result = if owner.is_none() {
            *owner = Some(me);
            Ok(())
        } else {
            Err(WouldBlock)
        };
        owner.unlock();
        result
    }

    /// Releases the lock and wakes up one thread waiting for it.
    ///
    /// # Panics
    /// Panics if the caller does not own the lock.
    #[track_caller]
    pub fn release(&self) {
        let me = Current::get_tid();
        let mut owner = self.owner.lock();
        assert!(
            *owner == Some(me),
            "Lock `{}` released by thread {me}, which does not hold it.",
            self.name
        );
        *owner = None;
        self.wchan.wake_one();
        owner.unlock();
    }

    /// Returns `true` if the current thread owns the lock.
    pub fn held_by_caller(&self) -> bool {
        let me = Current::get_tid();
        let owner = self.owner.lock();
        let held = *owner == Some(me);
        owner.unlock();
        held
    }

    /// Destroys this lock.
    ///
    /// # Panics
    /// Panics if the lock is held.
    pub fn destroy(self) {
        drop(self)
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        if let Some(tid) = *self.owner.get_mut() {
            panic!("Lock `{}` destroyed while held by thread {tid}.", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kthread::thread::ThreadBuilder;
    use std::sync::Arc;

    #[test]
    fn owner_round_trip() {
        let lock = Lock::new("lock").unwrap();
        assert!(!lock.held_by_caller());
        lock.acquire();
        assert!(lock.held_by_caller());
        assert_eq!(lock.try_acquire(), Err(WouldBlock));
        lock.release();
        assert!(!lock.held_by_caller());
        assert_eq!(lock.try_acquire(), Ok(()));
        lock.release();
        lock.destroy();
    }

    #[test]
    fn not_held_by_other_threads() {
        let lock = Arc::new(Lock::new("other").unwrap());
        lock.acquire();
        let handle = {
            let lock = lock.clone();
            ThreadBuilder::new("observer")
                .spawn(move || {
                    assert!(!lock.held_by_caller());
                    assert_eq!(lock.try_acquire(), Err(WouldBlock));
                })
                .unwrap()
        };
        assert_eq!(handle.join(), 0);
        lock.release();
    }

    #[test]
    #[should_panic(expected = "which does not hold it")]
    fn release_unowned() {
        let lock = Lock::new("unowned").unwrap();
        lock.release();
    }

    #[test]
    fn release_by_non_owner() {
        let lock = Arc::new(Lock::new("foreign").unwrap());
        lock.acquire();
        let handle = {
            let lock = lock.clone();
            ThreadBuilder::new("thief")
                .spawn(move || lock.release())
                .unwrap()
        };
        assert_eq!(handle.join(), -1);
        assert!(lock.held_by_caller());
        lock.release();
    }

    #[test]
    #[should_panic(expected = "must not block")]
    fn acquire_while_pinned() {
        let lock = Lock::new("pinned").unwrap();
        let _pin = Current::pin();
        lock.acquire();
    }

    #[test]
    #[should_panic(expected = "destroyed while held")]
    fn destroy_held() {
        let lock = Lock::new("held").unwrap();
        lock.acquire();
        lock.destroy();
    }
}
