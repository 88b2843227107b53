//! Thread abstration.
//!
//! ## The threading model
//!
//! An executing kernel consists of a collection of threads, each with their
//! own stack and local state. Threads can be named, and provide some built-in
//! support for low-level synchronization: a thread can park itself with
//! [`Current::park_with`], handing out a [`ParkHandle`] that another thread
//! later consumes to make it runnable again.
//!
//! Every thread has a thread id (tid). Threads created through
//! [`ThreadBuilder`] are also registered in a state table that can be queried
//! with [`get_state_by_tid`] until they exit.

use crate::{
    KernelError,
    interrupt::{InterruptGuard, InterruptState},
    sync::SpinLock,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::{
    cell::OnceCell,
    collections::BTreeMap,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicU64, Ordering},
    },
};

/// A possible state of the thread.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ThreadState {
    /// Thread is runnable.
    Runnable,
    /// Thread is running.
    Running,
    /// Thread is exited with exitcode.
    Exited(i32),
    /// Thread is parked.
    Parked,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
enum StateTag {
    Runnable = 0,
    Running = 1,
    Parked = 2,
    Exited = 3,
}

static THREAD_STATE_TABLE: SpinLock<BTreeMap<u64, Arc<Thread>>> = SpinLock::new(BTreeMap::new());

thread_local! {
    static CURRENT: OnceCell<Arc<Thread>> = const { OnceCell::new() };
}

/// Get specified thread's [`ThreadState`] by TID (Thread ID).
///
/// Only threads spawned by [`ThreadBuilder`] that have not exited yet are
/// tracked.
pub fn get_state_by_tid(tid: u64) -> Result<ThreadState, KernelError> {
    let tst = THREAD_STATE_TABLE.lock();
    let result = tst.get(&tid).map(|th| th.state());
    tst.unlock();
    result.ok_or(KernelError::InvalidArgument)
}

/// An thread abstraction.
pub struct Thread {
    /// Thread id
    pub tid: u64,
    /// Thread name
    pub name: String,
    state: AtomicU8,
    exit_code: AtomicI32,
}

impl Thread {
    fn new(name: String) -> Arc<Self> {
        static TID: AtomicU64 = AtomicU64::new(0);
        Arc::new(Self {
            tid: TID.fetch_add(1, Ordering::SeqCst),
            name,
            state: AtomicU8::new(StateTag::Runnable.into()),
            exit_code: AtomicI32::new(0),
        })
    }

    /// Get the state of this thread.
    pub fn state(&self) -> ThreadState {
        match StateTag::try_from(self.state.load(Ordering::SeqCst)) {
            Ok(StateTag::Runnable) => ThreadState::Runnable,
            Ok(StateTag::Running) => ThreadState::Running,
            Ok(StateTag::Parked) => ThreadState::Parked,
            Ok(StateTag::Exited) => ThreadState::Exited(self.exit_code.load(Ordering::SeqCst)),
            Err(e) => unreachable!("Thread {} is in unexpected state: {e:?}", self.tid),
        }
    }

    fn set_state(&self, state: ThreadState) {
        let tag = match state {
            ThreadState::Runnable => StateTag::Runnable,
            ThreadState::Running => StateTag::Running,
            ThreadState::Parked => StateTag::Parked,
            ThreadState::Exited(code) => {
                self.exit_code.store(code, Ordering::SeqCst);
                StateTag::Exited
            }
        };
        self.state.store(tag.into(), Ordering::SeqCst);
    }

    fn register(self: &Arc<Self>) {
        let mut tst = THREAD_STATE_TABLE.lock();
        tst.insert(self.tid, self.clone());
        tst.unlock();
    }

    fn unregister(&self) {
        let mut tst = THREAD_STATE_TABLE.lock();
        tst.remove(&self.tid);
        tst.unlock();
    }
}

/// A RAII implementation of the thread pinning.
pub type ThreadPinGuard = InterruptGuard;

/// Run a function `f` with current thread as an argument.
///
/// Threads that were not created by [`ThreadBuilder`] (e.g. the main thread)
/// get an identity the first time they ask for it.
#[inline]
pub fn with_current<R>(f: impl FnOnce(&Arc<Thread>) -> R) -> R {
    CURRENT.with(|current| {
        f(current.get_or_init(|| {
            let name = std::thread::current()
                .name()
                .unwrap_or("<unnamed>")
                .to_string();
            let th = Thread::new(name);
            th.set_state(ThreadState::Running);
            th
        }))
    })
}

fn thread_start<F: FnOnce()>(th: Arc<Thread>, thread_fn: F) -> i32 {
    CURRENT.with(|current| {
        let _ = current.set(th.clone());
    });
    th.set_state(ThreadState::Running);
    let exit_code = match std::panic::catch_unwind(AssertUnwindSafe(thread_fn)) {
        Ok(()) => 0,
        Err(_) => -1,
    };
    th.unregister();
    th.set_state(ThreadState::Exited(exit_code));
    exit_code
}

/// A handle to join thread.
pub struct JoinHandle {
    /// Thread id of this handle.
    pub tid: u64,
    inner: std::thread::JoinHandle<i32>,
}

impl JoinHandle {
    /// Join this handle and returns exit code.
    ///
    /// The exit code is 0 when the thread function returned and -1 when it
    /// panicked.
    pub fn join(self) -> i32 {
        self.inner.join().unwrap_or(-1)
    }
}

enum Wakeup {
    Parked {
        thread: std::thread::Thread,
        token: Arc<AtomicBool>,
    },
    Unstarted(Box<dyn FnOnce() + Send>),
}

/// A handle that represent the parked thread.
pub struct ParkHandle {
    th: Arc<Thread>,
    wakeup: Wakeup,
}

impl ParkHandle {
    /// Thread id of the parked thread.
    pub fn tid(&self) -> u64 {
        self.th.tid
    }

    /// Consume the handle and unpark the underlying thread.
    pub fn unpark(self) {
        let Self { th, wakeup } = self;
        match wakeup {
            Wakeup::Parked { thread, token } => {
                th.set_state(ThreadState::Runnable);
                token.store(true, Ordering::Release);
                thread.unpark();
            }
            Wakeup::Unstarted(start) => start(),
        }
    }
}

/// The opaque structure indicating the running thread on the current cpu.
pub struct Current {
    _p: (),
}

impl Current {
    /// Run a function `f` with [`ParkHandle`] for current thread, and then park
    /// the current thread.
    ///
    /// `f` typically stores the handle in a wait queue and releases the
    /// spinlock protecting that queue. The thread sleeps until somebody calls
    /// [`ParkHandle::unpark`]; a wake-up that races ahead of the sleep is not
    /// lost.
    ///
    /// # Panics
    /// Panics if the current thread still holds a spinlock (or any other
    /// [`ThreadPinGuard`]) after `f` returns.
    pub fn park_with(f: impl FnOnce(ParkHandle)) {
        let token = Arc::new(AtomicBool::new(false));
        let handle = with_current(|th| {
            th.set_state(ThreadState::Parked);
            ParkHandle {
                th: th.clone(),
                wakeup: Wakeup::Parked {
                    thread: std::thread::current(),
                    token: token.clone(),
                },
            }
        });
        f(handle);
        assert!(
            InterruptState::current() == InterruptState::On,
            "Try to park a thread while holding a lock."
        );
        while !token.load(Ordering::Acquire) {
            std::thread::park();
        }
        with_current(|th| th.set_state(ThreadState::Running));
    }

    /// Get the current thread's id.
    pub fn get_tid() -> u64 {
        with_current(|th| th.tid)
    }

    /// Pin current thread not to be scheduled by blocking interrupt.
    ///
    /// When [`ThreadPinGuard`] is dropped, the current thread is unpinned.
    /// A pinned thread must not block.
    pub fn pin() -> ThreadPinGuard {
        ThreadPinGuard::new()
    }
}

/// A struct to build a new thread.
pub struct ThreadBuilder {
    th: Arc<Thread>,
}

impl ThreadBuilder {
    /// Create a new thread builder for thread `name`.
    pub fn new<I>(name: I) -> Self
    where
        String: From<I>,
    {
        Self {
            th: Thread::new(String::from(name)),
        }
    }

    /// Get the thread id of this thread.
    pub fn get_tid(&self) -> u64 {
        self.th.tid
    }

    /// Spawn the thread.
    ///
    /// # Errors
    /// Returns [`KernelError::NoMemory`] if the host refuses to create another
    /// thread.
    pub fn spawn<F: FnOnce() + Send + 'static>(self, thread_fn: F) -> Result<JoinHandle, KernelError> {
        let Self { th } = self;
        th.register();
        let inner = std::thread::Builder::new()
            .name(th.name.clone())
            .spawn({
                let th = th.clone();
                move || thread_start(th, thread_fn)
            })
            .map_err(|e| {
                warning!("Failed to spawn thread `{}`: {e}", th.name);
                th.unregister();
                KernelError::NoMemory
            })?;
        Ok(JoinHandle { tid: th.tid, inner })
    }

    /// Spawn the thread as a parked state.
    ///
    /// The thread starts running its function the first time the returned
    /// handle is unparked.
    pub fn spawn_as_parked<F: FnOnce() + Send + 'static>(self, thread_fn: F) -> ParkHandle {
        let Self { th } = self;
        th.set_state(ThreadState::Parked);
        th.register();
        let start = {
            let th = th.clone();
            move || {
                th.set_state(ThreadState::Runnable);
                let name = th.name.clone();
                let spawned = std::thread::Builder::new().name(name).spawn({
                    let th = th.clone();
                    move || thread_start(th, thread_fn)
                });
                if let Err(e) = spawned {
                    warning!("Failed to start parked thread `{}`: {e}", th.name);
                    th.unregister();
                    th.set_state(ThreadState::Exited(-1));
                }
            }
        };
        ParkHandle {
            th,
            wakeup: Wakeup::Unstarted(Box::new(start)),
        }
    }
}
