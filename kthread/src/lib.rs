//! # kthread: kernel threads on a hosted machine
//!
//! This crate provides the low-level services that the synchronization
//! primitives of the `synch` crate are built on. In a kernel these are the
//! pieces that sit below every sleeping lock:
//!
//! - [`SpinLock`]: the short-hold mutual exclusion primitive. It is usable
//!   where blocking is disallowed, and holding one makes the thread
//!   non-suspendable until it is released.
//! - [`InterruptGuard`]: pins the current thread. While any guard (or spinlock)
//!   is held, [`InterruptState::current`] reports [`InterruptState::Off`] and
//!   any attempt to park the thread panics.
//! - [`thread`]: thread creation ([`ThreadBuilder`]), identity
//!   ([`Current::get_tid`]), parking ([`Current::park_with`] and
//!   [`ParkHandle`]) and the per-thread [`ThreadState`] table.
//! - [`WaitQueue`]: the wait channel. A named queue of parked threads that
//!   supports "sleep, releasing this spinlock first", "wake one" and
//!   "wake all".
//!
//! Threads are backed by the host's threads, so everything here runs under a
//! normal `cargo test`.
//!
//! ## Logging
//!
//! The [`info!`], [`warning!`] and [`debug!`] macros forward to [`tracing`].
//! Output is suppressed while [`QUIET`] is set. [`print!`] and [`println!`]
//! write straight to standard output and are used by the test driver.
//!
//! [`SpinLock`]: sync::SpinLock
//! [`InterruptGuard`]: interrupt::InterruptGuard
//! [`InterruptState::current`]: interrupt::InterruptState::current
//! [`InterruptState::Off`]: interrupt::InterruptState::Off
//! [`ThreadBuilder`]: thread::ThreadBuilder
//! [`Current::get_tid`]: thread::Current::get_tid
//! [`Current::park_with`]: thread::Current::park_with
//! [`ParkHandle`]: thread::ParkHandle
//! [`ThreadState`]: thread::ThreadState
//! [`WaitQueue`]: wchan::WaitQueue

#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

#[macro_use]
pub mod kprint;

pub mod interrupt;
pub mod sync;
pub mod test_utils;
pub mod thread;
pub mod util;
pub mod wchan;

#[doc(hidden)]
pub use tracing as __tracing;

use std::sync::atomic::AtomicBool;

/// Suppresses the output of [`info!`], [`warning!`] and [`debug!`] when set.
pub static QUIET: AtomicBool = AtomicBool::new(false);

/// Enum representing errors that can occur during a kernel operation.
///
/// Only resource exhaustion and bad arguments are reported through this type.
/// Misuse of a synchronization primitive (releasing a lock you do not own,
/// destroying a primitive somebody still waits on, ...) is a bug in the caller
/// and panics instead.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum KernelError {
    /// Out of memory. (ENOMEM)
    #[error("out of memory")]
    NoMemory,
    /// Device or resource busy. (EBUSY)
    #[error("device or resource busy")]
    Busy,
    /// Invalid argument. (EINVAL)
    #[error("invalid argument")]
    InvalidArgument,
}

// Test utilities
#[doc(hidden)]
pub trait TestCase
where
    Self: Sync + Send,
{
    fn name(&'static self) -> &'static str;
    fn run(&'static self) -> bool;
}

impl<T> TestCase for T
where
    T: Fn() + Send + Sync + 'static,
{
    fn name(&'static self) -> &'static str {
        core::any::type_name::<T>()
    }

    fn run(&'static self) -> bool {
        print!("test {} ... ", self.name());
        let passed = match thread::ThreadBuilder::new(self.name()).spawn(self) {
            Ok(handle) => handle.join() == 0,
            Err(e) => {
                warning!("Failed to spawn {}: {e}", self.name());
                false
            }
        };
        println!("{}", if passed { "ok" } else { "FAILED" });
        passed
    }
}

/// A driver for running tests.
pub struct TestDriver {
    _p: (),
}

impl TestDriver {
    /// Run the given tests.
    ///
    /// When `filter` is not empty, only the tests whose name (without the
    /// leading crate name) appears in it are run. Returns the number of
    /// tests that ran and the number of tests that passed.
    pub fn start(tests: &[&'static dyn TestCase], filter: &[String]) -> (usize, usize) {
        let tests = tests
            .iter()
            .filter(|test| {
                if filter.is_empty() {
                    return true;
                }
                let name = test.name();
                let r = name.split("::").next().map(|n| n.len() + 2).unwrap_or(0);
                filter.iter().any(|f| f == &name[r.min(name.len())..])
            })
            .collect::<Vec<_>>();
        let (total, mut succ) = (tests.len(), 0);
        println!(
            "Running {} test{}",
            total,
            if total == 1 { "" } else { "s" }
        );

        for test in tests {
            if test.run() {
                succ += 1;
            }
        }
        println!(
            "test result: {}. {} passed; {} failed",
            if total == succ { "ok" } else { "FAILED" },
            succ,
            total - succ
        );
        (total, succ)
    }
}
