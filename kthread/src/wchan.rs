//! Wait channels.
//!
//! A [`WaitQueue`] is the place where a sleeping primitive parks its blocked
//! threads. The queue itself does not protect the condition a thread sleeps
//! on. Instead, callers follow one protocol:
//!
//! 1. take the spinlock that protects the primitive's state;
//! 2. check the condition;
//! 3. call [`WaitQueue::sleep`] with the spinlock guard. The thread is queued
//!    *before* the spinlock is released, so a waker that takes the same
//!    spinlock and calls [`WaitQueue::wake_one`] cannot miss it.
//!
//! Nothing is re-acquired on wake; the sleeper takes the spinlock again and
//! re-checks its condition. The order in which sleepers are woken is not part
//! of the contract.

use crate::{
    KernelError,
    sync::SpinLockGuard,
    thread::{Current, ParkHandle},
    util::kstrdup,
};
use crossbeam_queue::SegQueue;

/// A named queue of parked threads.
pub struct WaitQueue {
    name: String,
    sleepers: SegQueue<ParkHandle>,
}

impl WaitQueue {
    /// Creates an empty wait queue named `name`.
    ///
    /// # Errors
    /// Returns [`KernelError::NoMemory`] if the name cannot be allocated.
    pub fn new(name: &str) -> Result<Self, KernelError> {
        Ok(Self {
            name: kstrdup(name)?,
            sleepers: SegQueue::new(),
        })
    }

    /// Name of this wait queue.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Puts the current thread to sleep on this queue, releasing `guard`
    /// once the thread is queued.
    ///
    /// # Panics
    /// Panics if the current thread holds another spinlock.
    pub fn sleep<T: ?Sized>(&self, guard: SpinLockGuard<'_, T>) {
        Current::park_with(|handle| {
            self.sleepers.push(handle);
            guard.unlock();
        });
    }

    /// Queues an already parked thread.
    ///
    /// The thread stays parked until it is woken through this queue.
    pub fn enqueue(&self, handle: ParkHandle) {
        self.sleepers.push(handle);
    }

    /// Wakes up one sleeper, if any. Returns whether a thread was woken.
    pub fn wake_one(&self) -> bool {
        match self.sleepers.pop() {
            Some(handle) => {
                handle.unpark();
                true
            }
            None => false,
        }
    }

    /// Wakes up every thread that is sleeping at the time of the call.
    /// Returns the number of woken threads.
    pub fn wake_all(&self) -> usize {
        let mut woken = 0;
        for _ in 0..self.sleepers.len() {
            match self.sleepers.pop() {
                Some(handle) => handle.unpark(),
                None => break,
            }
            woken += 1;
        }
        woken
    }

    /// Returns `true` if no thread sleeps on this queue.
    pub fn is_empty(&self) -> bool {
        self.sleepers.is_empty()
    }

    /// Number of threads sleeping on this queue.
    pub fn len(&self) -> usize {
        self.sleepers.len()
    }
}

impl Drop for WaitQueue {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        assert!(
            self.sleepers.is_empty(),
            "Wait queue `{}` destroyed while {} thread(s) sleep on it.",
            self.name,
            self.sleepers.len()
        );
    }
}
