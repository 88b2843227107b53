//! # Condition Variable.
//!
//! A **condition variable** lets a thread wait, without consuming CPU
//! cycles, until some state guarded by a [`Lock`] changes. The caller holds
//! the lock, checks its predicate, and calls [`ConditionVariable::wait`] if
//! the predicate does not hold yet. `wait` releases the lock and puts the
//! thread to sleep as one step, so a [`signal`] issued by a thread that
//! takes the lock right after cannot be missed. Before `wait` returns, the
//! lock is acquired again.
//!
//! A woken thread is not told that its predicate holds, only that it may. It
//! has to check the predicate again. [`ConditionVariable::wait_while`] runs
//! that loop for the caller:
//!
//! ```rust,ignore
//! lock.acquire();
//! cv.wait_while(&lock, || queue.is_empty());
//! let item = queue.pop();
//! lock.release();
//! ```
//!
//! Every operation must be called while the caller holds the lock the
//! condition variable is used with. This is checked, but only in so far as
//! the caller holds the [`Lock`] it passes in.
//!
//! [`signal`]: ConditionVariable::signal

use super::lock::Lock;
use kthread::{KernelError, sync::SpinLock, util::kstrdup, wchan::WaitQueue};

/// A condition variable.
pub struct ConditionVariable {
    name: String,
    guard: SpinLock<()>,
    wchan: WaitQueue,
}

impl ConditionVariable {
    /// Creates a condition variable named `name`.
    ///
    /// # Errors
    /// Returns [`KernelError::NoMemory`] if the condition variable cannot be
    /// allocated.
    pub fn new(name: &str) -> Result<Self, KernelError> {
        Ok(Self {
            name: kstrdup(name)?,
            guard: SpinLock::new(()),
            wchan: WaitQueue::new(name)?,
        })
    }

    /// Name of this condition variable.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[track_caller]
    fn assert_held(&self, lock: &Lock, op: &str) {
        assert!(
            lock.held_by_caller(),
            "ConditionVariable::{op} on `{}` without holding lock `{}`.",
            self.name,
            lock.name()
        );
    }

    /// Releases `lock`, sleeps until signaled, and acquires `lock` again.
    ///
    /// # Panics
    /// Panics if the caller does not hold `lock`, or may not block.
    #[track_caller]
    pub fn wait(&self, lock: &Lock) {
        super::assert_may_block("ConditionVariable::wait");
        self.assert_held(lock, "wait");

        let guard = self.guard.lock();
        lock.release();
        self.wchan.sleep(guard);
        lock.acquire();
    }

    /// Waits on this condition variable as long as `predicate` returns
    /// `true`.
    ///
    /// The predicate is evaluated with `lock` held, before the first wait and
    /// after every wake-up.
    ///
    /// # Panics
    /// Panics if the caller does not hold `lock`.
    #[track_caller]
    pub fn wait_while(&self, lock: &Lock, mut predicate: impl FnMut() -> bool) {
        self.assert_held(lock, "wait_while");
        while predicate() {
            self.wait(lock);
        }
    }

    /// Wakes up at most one thread waiting on this condition variable.
    ///
    /// # Panics
    /// Panics if the caller does not hold `lock`.
    #[track_caller]
    pub fn signal(&self, lock: &Lock) {
        self.assert_held(lock, "signal");

        let guard = self.guard.lock();
        self.wchan.wake_one();
        guard.unlock();
    }

    /// Wakes up every thread waiting on this condition variable.
    ///
    /// # Panics
    /// Panics if the caller does not hold `lock`.
    #[track_caller]
    pub fn broadcast(&self, lock: &Lock) {
        self.assert_held(lock, "broadcast");

        let guard = self.guard.lock();
        self.wchan.wake_all();
        guard.unlock();
    }

    /// Destroys this condition variable.
    ///
    /// # Panics
    /// Panics if a thread is waiting on it.
    pub fn destroy(self) {
        drop(self)
    }
}

impl Drop for ConditionVariable {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        assert!(
            self.wchan.is_empty(),
            "Condition variable `{}` destroyed while {} thread(s) wait on it.",
            self.name,
            self.wchan.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kthread::{
        test_utils::wait_until,
        thread::{Current, ThreadBuilder, ThreadState, get_state_by_tid},
    };
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    #[test]
    fn signal_wakes_waiter() {
        let lock = Arc::new(Lock::new("cv lock").unwrap());
        let cv = Arc::new(ConditionVariable::new("cv").unwrap());
        let ready = Arc::new(AtomicBool::new(false));

        let waiter = {
            let (lock, cv, ready) = (lock.clone(), cv.clone(), ready.clone());
            ThreadBuilder::new("waiter")
                .spawn(move || {
                    lock.acquire();
                    cv.wait_while(&lock, || !ready.load(Ordering::SeqCst));
                    assert!(lock.held_by_caller());
                    lock.release();
                })
                .unwrap()
        };
        wait_until("waiter to sleep", || {
            get_state_by_tid(waiter.tid) == Ok(ThreadState::Parked) && !cv.wchan.is_empty()
        });

        lock.acquire();
        ready.store(true, Ordering::SeqCst);
        cv.signal(&lock);
        lock.release();
        assert_eq!(waiter.join(), 0);
        Arc::try_unwrap(cv).ok().unwrap().destroy();
    }

    #[test]
    fn signal_without_waiters_is_not_remembered() {
        let lock = Lock::new("cv lock").unwrap();
        let cv = ConditionVariable::new("cv").unwrap();
        lock.acquire();
        cv.signal(&lock);
        cv.broadcast(&lock);
        lock.release();
        assert!(cv.wchan.is_empty());
    }

    #[test]
    #[should_panic(expected = "without holding lock")]
    fn wait_without_lock() {
        let lock = Lock::new("cv lock").unwrap();
        let cv = ConditionVariable::new("cv").unwrap();
        cv.wait(&lock);
    }

    #[test]
    #[should_panic(expected = "without holding lock")]
    fn signal_without_lock() {
        let lock = Lock::new("cv lock").unwrap();
        let cv = ConditionVariable::new("cv").unwrap();
        cv.signal(&lock);
    }

    #[test]
    #[should_panic(expected = "without holding lock")]
    fn broadcast_without_lock() {
        let lock = Lock::new("cv lock").unwrap();
        let cv = ConditionVariable::new("cv").unwrap();
        cv.broadcast(&lock);
    }

    #[test]
    #[should_panic(expected = "must not block")]
    fn wait_while_pinned() {
        let lock = Lock::new("cv lock").unwrap();
        let cv = ConditionVariable::new("cv").unwrap();
        lock.acquire();
        let _pin = Current::pin();
        cv.wait(&lock);
    }

    #[test]
    #[should_panic(expected = "destroyed while 1 thread(s) wait on it")]
    fn destroy_with_waiter() {
        let cv = ConditionVariable::new("busy").unwrap();
        cv.wchan
            .enqueue(ThreadBuilder::new("never").spawn_as_parked(|| {}));
        cv.destroy();
    }
}
