//! Non-suspendable contexts.
//!
//! A kernel thread that has disabled interrupts (or holds a spinlock, which
//! disables them for it) must not go to sleep: nobody could preempt it to run
//! the thread that would wake it up. This module models that state per thread
//! so the sleeping primitives can check their precondition.

use core::{cell::Cell, marker::PhantomData};

thread_local! {
    static NESTING: Cell<usize> = const { Cell::new(0) };
}

/// Enumeration representing the interrupt state.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum InterruptState {
    /// Interrupts are enabled. The thread may block.
    On,
    /// Interrupts are disabled. The thread must not block.
    Off,
}

impl InterruptState {
    /// Reads the interrupt state of the current thread.
    ///
    /// # Returns
    /// - [`InterruptState::On`] if no [`InterruptGuard`] is alive.
    /// - [`InterruptState::Off`] otherwise.
    pub fn current() -> Self {
        if NESTING.with(Cell::get) == 0 {
            Self::On
        } else {
            Self::Off
        }
    }
}

/// An RAII-based guard for managing interrupt disabling.
///
/// When an `InterruptGuard` is created, interrupts of the current thread are
/// disabled. When it is dropped, the interrupt state is restored to what it
/// was before the guard was created. Guards nest.
///
/// The guard is bound to the thread that created it and cannot be sent to
/// another thread.
pub struct InterruptGuard {
    _not_send: PhantomData<*const ()>,
}

impl InterruptGuard {
    /// Creates a new `InterruptGuard`, disabling interrupts.
    ///
    /// # Example
    /// ```rust
    /// use kthread::interrupt::{InterruptGuard, InterruptState};
    ///
    /// let guard = InterruptGuard::new();
    /// assert_eq!(InterruptState::current(), InterruptState::Off);
    /// drop(guard);
    /// assert_eq!(InterruptState::current(), InterruptState::On);
    /// ```
    pub fn new() -> Self {
        NESTING.with(|n| n.set(n.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Default for InterruptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        NESTING.with(|n| {
            let prev = n.get();
            assert!(prev > 0, "Mismatched InterruptGuard drop calls: {prev}");
            n.set(prev - 1);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_nest() {
        assert_eq!(InterruptState::current(), InterruptState::On);
        let outer = InterruptGuard::new();
        let inner = InterruptGuard::new();
        drop(inner);
        assert_eq!(InterruptState::current(), InterruptState::Off);
        drop(outer);
        assert_eq!(InterruptState::current(), InterruptState::On);
    }

    #[test]
    fn state_is_per_thread() {
        let _guard = InterruptGuard::new();
        let other = std::thread::spawn(InterruptState::current).join().unwrap();
        assert_eq!(other, InterruptState::On);
        assert_eq!(InterruptState::current(), InterruptState::Off);
    }
}
