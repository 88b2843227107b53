//! # Semaphore.
//!
//! A **semaphore** is a counter that never goes below zero, together with the
//! threads waiting for it to become positive. [`Semaphore::wait`] (Dijkstra's
//! *P*) takes one unit of the count, sleeping while there is none.
//! [`Semaphore::signal`] (*V*) gives one unit back and wakes up one sleeper.
//!
//! Semaphores are used to count instances of a resource, and, initialized to
//! zero, to signal an event from one thread to another:
//!
//! ```
//! use std::sync::Arc;
//! use kthread::thread::ThreadBuilder;
//! use synch::sync::Semaphore;
//!
//! let done = Arc::new(Semaphore::new("done", 0).unwrap());
//! let worker = {
//!     let done = done.clone();
//!     ThreadBuilder::new("worker")
//!         .spawn(move || done.signal())
//!         .unwrap()
//! };
//! done.wait();
//! assert_eq!(worker.join(), 0);
//! ```
//!
//! The count is protected by a [`SpinLock`]. A thread that finds the count at
//! zero goes to sleep on the semaphore's [`WaitQueue`] while still holding
//! the spinlock, so the signal that would wake it cannot slip in between the
//! check and the sleep. On wake-up it takes the spinlock again and re-checks
//! the count: another thread may have arrived and taken the unit first.
//!
//! [`SpinLock`]: kthread::sync::SpinLock
//! [`WaitQueue`]: kthread::wchan::WaitQueue

use kthread::{KernelError, sync::SpinLock, util::kstrdup, wchan::WaitQueue};

/// Counting semaphore.
pub struct Semaphore {
    name: String,
    count: SpinLock<u32>,
    wchan: WaitQueue,
}

impl Semaphore {
    /// Creates a semaphore named `name` with a count of `initial`.
    ///
    /// # Errors
    /// Returns [`KernelError::NoMemory`] if the semaphore cannot be allocated.
    pub fn new(name: &str, initial: u32) -> Result<Self, KernelError> {
        Ok(Self {
            name: kstrdup(name)?,
            count: SpinLock::new(initial),
            wchan: WaitQueue::new(name)?,
        })
    }

    /// Name of this semaphore.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decrements the count, blocking while it is zero.
    ///
    /// # Panics
    /// Panics if the current thread must not block.
    #[track_caller]
    pub fn wait(&self) {
        super::assert_may_block("Semaphore::wait");

        let mut count = self.count.lock();
        while *count == 0 {
            self.wchan.sleep(count);
            count = self.count.lock();
        }
        *count -= 1;
        count.unlock();
    }

    /// Increments the count and wakes up one thread sleeping in
    /// [`Semaphore::wait`], if any.
    ///
    /// This never blocks.
    ///
    /// # Panics
    /// Panics if the count would overflow.
    pub fn signal(&self) {
        let mut count = self.count.lock();
        match count.checked_add(1) {
            Some(next) => *count = next,
            None => {
                count.unlock();
                panic!("Semaphore `{}` overflowed.", self.name);
            }
        }
        self.wchan.wake_one();
        count.unlock();
    }

    /// Current count.
    ///
    /// The value may be stale by the time the caller looks at it.
    pub fn count(&self) -> u32 {
        let count = self.count.lock();
        let value = *count;
        count.unlock();
        value
    }

    /// Destroys this semaphore.
    ///
    /// # Panics
    /// Panics if a thread is sleeping on the semaphore.
    pub fn destroy(self) {
        drop(self)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        assert!(
            self.wchan.is_empty(),
            "Semaphore `{}` destroyed while {} thread(s) wait on it.",
            self.name,
            self.wchan.len()
        );
    }
}
