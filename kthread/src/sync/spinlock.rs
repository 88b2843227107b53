//! SMP-supported spinlock.
//!
//! A spinlock polls a flag that tells whether the protected value is locked,
//! sets it when a thread takes the lock, and clears it on `unlock`. The
//! poll-and-set step is a single atomic read-modify-write.
//!
//! Holding a spinlock also disables interrupts of the holding thread (see
//! [`InterruptGuard`]), so a thread cannot fall asleep while other threads
//! spin on a lock it holds.

use crate::interrupt::InterruptGuard;
use core::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};
use crossbeam_utils::Backoff;

/// The lock could not be acquired at this time because the operation would
/// otherwise block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation would block")]
pub struct WouldBlock;

/// A mutual exclusion primitive useful for protecting shared data
///
/// This spinlock will block threads waiting for the lock to become available.
/// The spinlock can be created via a [`new`] constructor. Each spinlock has a
/// type parameter which represents the data that it is protecting. The data can
/// only be accessed through the guards returned from [`lock`] and
/// [`try_lock`], which guarantees that the data is only ever accessed when the
/// spinlock is locked.
///
/// [`new`]: Self::new
/// [`lock`]: Self::lock
/// [`try_lock`]: Self::try_lock
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use kthread::sync::SpinLock;
/// use kthread::thread::ThreadBuilder;
///
/// let data = Arc::new(SpinLock::new(0));
///
/// let handles = (0..10)
///     .map(|_| {
///         let data = Arc::clone(&data);
///         ThreadBuilder::new("work")
///             .spawn(move || {
///                 let mut guard = data.lock();
///                 *guard += 1;
///                 // the lock must be "explicitly" unlocked.
///                 guard.unlock();
///             })
///             .unwrap()
///     })
///     .collect::<Vec<_>>();
/// for handle in handles {
///     assert_eq!(handle.join(), 0);
/// }
/// let guard = data.lock();
/// assert_eq!(*guard, 10);
/// guard.unlock();
/// ```
pub struct SpinLock<T: ?Sized> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a new spinlock in an unlocked state ready for use.
    #[inline]
    pub const fn new(t: T) -> SpinLock<T> {
        SpinLock {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(t),
        }
    }

    /// Consumes this spinlock, returning the underlying data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Acquires a spinlock, spinning until it is able to do so.
    ///
    /// Upon returning, the thread is the only thread with the lock held and
    /// its interrupts are disabled. When the guard goes out of scope without
    /// [`SpinLockGuard::unlock`], panic occurs.
    ///
    /// Locking a spinlock in the thread which already holds it never returns.
    #[track_caller]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let backoff = Backoff::new();
        let guard = loop {
            let guard = InterruptGuard::new();
            if !self.locked.swap(true, Ordering::Acquire) {
                break guard;
            }
            drop(guard);
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        };

        SpinLockGuard {
            caller: core::panic::Location::caller(),
            lock: self,
            guard: Some(guard),
        }
    }

    /// Attempts to acquire this lock.
    ///
    /// This function does not spin.
    ///
    /// # Errors
    ///
    /// If the spinlock could not be acquired because it is already locked, then
    /// this call will return the [`WouldBlock`] error.
    #[track_caller]
    pub fn try_lock(&self) -> Result<SpinLockGuard<'_, T>, WouldBlock> {
        let guard = InterruptGuard::new();
        if !self.locked.swap(true, Ordering::Acquire) {
            Ok(SpinLockGuard {
                caller: core::panic::Location::caller(),
                lock: self,
                guard: Some(guard),
            })
        } else {
            Err(WouldBlock)
        }
    }

    /// Returns a mutable reference to the underlying data.
    ///
    /// No locking is needed as the `&mut self` guarantees exclusive access.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: Default> Default for SpinLock<T> {
    /// Creates a `SpinLock<T>`, with the `Default` value for T.
    fn default() -> SpinLock<T> {
        SpinLock::new(Default::default())
    }
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

/// An implementation of a "scoped lock" of a spinlock. When this structure
/// is dropped (falls out of scope) without unlock, panic occurs.
///
/// The lock must be explicitly unlocked by [`unlock`] method.
///
/// This structure is created by the [`lock`] and [`try_lock`] methods on
/// [`SpinLock`].
///
/// [`lock`]: SpinLock::lock
/// [`try_lock`]: SpinLock::try_lock
/// [`unlock`]: Self::unlock
pub struct SpinLockGuard<'a, T: ?Sized + 'a> {
    caller: &'static core::panic::Location<'static>,
    lock: &'a SpinLock<T>,
    guard: Option<InterruptGuard>,
}

unsafe impl<T: ?Sized + Sync> Sync for SpinLockGuard<'_, T> {}

impl<T: ?Sized> SpinLockGuard<'_, T> {
    /// Releases the underlying [`SpinLock`].
    ///
    /// As the guard does **not** automatically release the lock on drop,
    /// the caller must explicitly invoke [`unlock`] to mark the lock
    /// as available again.
    ///
    /// [`unlock`]: SpinLockGuard::unlock
    pub fn unlock(mut self) {
        self.lock.locked.store(false, Ordering::Release);
        self.guard.take();
        core::mem::forget(self);
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // Unwinding through a critical section: release the lock so the
        // panic is reported instead of turning into an abort.
        if std::thread::panicking() {
            self.lock.locked.store(false, Ordering::Release);
            return;
        }
        panic!(
            "`.unlock()` must be explicitly called before dropping SpinLockGuard.
The lock is held at {:?}.",
            self.caller
        );
    }
}
