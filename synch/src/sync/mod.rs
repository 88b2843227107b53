//! # Synchronization Primitives.
//!
//! A kernel must coordinate access to shared resources among multiple threads
//! of execution. The [`SpinLock`] gives correct mutual exclusion by polling
//! the lock, which wastes CPU cycles whenever the lock is contended for more
//! than a few instructions. The primitives in this module put a waiting
//! thread to sleep on a [`WaitQueue`] instead, and wake it up when the thing
//! it waits for may have happened.
//!
//! - [`Semaphore`]: a counter that never goes negative. [`Semaphore::wait`]
//!   (P) blocks while the count is zero, [`Semaphore::signal`] (V) increments
//!   it and never blocks.
//! - [`Lock`]: a sleeping mutual exclusion lock with an owner. Only the owner
//!   may release it, and the owner must not acquire it again.
//! - [`ConditionVariable`]: lets a thread holding a [`Lock`] atomically
//!   release it and sleep until another thread signals that the state it
//!   waits for may have changed.
//! - [`ReaderWriterLock`]: any number of readers or a single writer. Once a
//!   writer queues up, newly arriving readers wait behind it.
//!
//! | Primitive               | Blocks Thread? | Fair? | Typical Use Case                               |
//! |-------------------------|----------------|-------|------------------------------------------------|
//! | [`SpinLock`]            | No (busy wait) | No    | Short critical sections, the primitives' state |
//! | [`Semaphore`]           | Yes            | No    | Counting resources, one-shot events            |
//! | [`Lock`]                | Yes            | No    | Exclusive access to shared data                |
//! | [`ConditionVariable`]   | Yes            | No    | Waiting for a predicate on lock-guarded state  |
//! | [`ReaderWriterLock`]    | Yes            | No    | Read-mostly shared data                        |
//!
//! None of the sleeping primitives wake their sleepers in FIFO order. A newly
//! arriving thread may take a resource before a thread that was woken for it
//! gets to run, so callers always re-check their condition after waking.
//!
//! No operation that may block can be called while the current thread holds
//! a spinlock or is otherwise pinned. Doing so panics.
//!
//! [`SpinLock`]: kthread::sync::SpinLock
//! [`WaitQueue`]: kthread::wchan::WaitQueue

pub mod condition_variable;
pub mod lock;
pub mod rwlock;
pub mod semaphore;

pub use condition_variable::ConditionVariable;
pub use lock::Lock;
pub use rwlock::ReaderWriterLock;
pub use semaphore::Semaphore;

use kthread::interrupt::InterruptState;

#[track_caller]
fn assert_may_block(what: &str) {
    assert!(
        InterruptState::current() == InterruptState::On,
        "{what} called from a context that must not block."
    );
}
