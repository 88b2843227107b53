//! Short-hold synchronization.
//!
//! The only primitive here is the [`SpinLock`]. Sleeping primitives live in
//! the `synch` crate and use a spinlock to protect their own state.

pub mod spinlock;

pub use spinlock::{SpinLock, SpinLockGuard, WouldBlock};
