//! # synch: sleeping synchronization primitives
//!
//! The [`SpinLock`] of `kthread` provides correct mutual exclusion, but a
//! thread that cannot take it burns its CPU polling the lock. This crate
//! builds the sleeping primitives on top of it, so that a thread that has to
//! wait is parked on a [`WaitQueue`] instead:
//!
//! - [`sync`]: [`Semaphore`], [`Lock`], [`ConditionVariable`] and
//!   [`ReaderWriterLock`].
//! - [`synchprobs`]: the whalemating problem, a three-role rendezvous built
//!   only from semaphores and a lock, together with its driver.
//! - [`synchtests`]: the kernel-menu test suites (`semtest`, `locktest`,
//!   `cvtest`, `cvtest2`, `rwtest` and `whalemating`). The `synchtest` binary
//!   runs them.
//!
//! All primitives are explicitly created and explicitly destroyed. Creation
//! fails only when memory runs out. Using a primitive against its contract
//! (releasing a lock you do not hold, destroying a semaphore somebody sleeps
//! on, blocking while holding a spinlock, ...) is a bug in the caller and
//! panics.
//!
//! [`SpinLock`]: kthread::sync::SpinLock
//! [`WaitQueue`]: kthread::wchan::WaitQueue
//! [`Semaphore`]: sync::Semaphore
//! [`Lock`]: sync::Lock
//! [`ConditionVariable`]: sync::ConditionVariable
//! [`ReaderWriterLock`]: sync::ReaderWriterLock

#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod sync;
pub mod synchprobs;
pub mod synchtests;
