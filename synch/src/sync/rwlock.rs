//! # Reader-writer lock.
//!
//! A [`ReaderWriterLock`] admits any number of readers at a time, or a single
//! writer. It is composed from the other primitives: a [`Lock`] guards the
//! bookkeeping, readers wait on one [`ConditionVariable`] and writers on
//! another.
//!
//! Writers take priority. As soon as a writer has to wait, newly arriving
//! readers queue up behind it instead of joining the readers that are
//! already inside, so a steady stream of readers cannot starve a writer.
//! When a writer leaves, waiting readers and one waiting writer are both
//! woken; if a writer is still queued the readers go back to sleep.

use super::{condition_variable::ConditionVariable, lock::Lock};
use core::cell::UnsafeCell;
use kthread::{KernelError, thread::Current, util::kstrdup};

#[derive(Default)]
struct RwState {
    readers: usize,
    writer: Option<u64>,
    writers_waiting: usize,
    reader_waiting: bool,
}

/// A reader-writer lock with writer priority.
pub struct ReaderWriterLock {
    name: String,
    lock: Lock,
    reader_cv: ConditionVariable,
    writer_cv: ConditionVariable,
    state: UnsafeCell<RwState>,
}

// SAFETY: `state` is only accessed while `lock` is held.
unsafe impl Sync for ReaderWriterLock {}

impl ReaderWriterLock {
    /// Creates an unlocked reader-writer lock named `name`.
    ///
    /// # Errors
    /// Returns [`KernelError::NoMemory`] if any part of the lock cannot be
    /// allocated. The parts created so far are destroyed.
    pub fn new(name: &str) -> Result<Self, KernelError> {
        Ok(Self {
            name: kstrdup(name)?,
            reader_cv: ConditionVariable::new(name)?,
            writer_cv: ConditionVariable::new(name)?,
            lock: Lock::new(name)?,
            state: UnsafeCell::new(RwState::default()),
        })
    }

    /// Name of this lock.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::mut_from_ref)]
    fn state(&self) -> &mut RwState {
        debug_assert!(self.lock.held_by_caller());
        // SAFETY: the caller holds `self.lock`, and does not keep the
        // reference across a wait.
        unsafe { &mut *self.state.get() }
    }

    /// Acquires the lock for reading.
    ///
    /// Blocks while a writer holds the lock or waits for it.
    pub fn acquire_read(&self) {
        self.lock.acquire();
        loop {
            let state = self.state();
            if state.writer.is_none() && state.writers_waiting == 0 {
                state.readers += 1;
                state.reader_waiting = false;
                break;
            }
            state.reader_waiting = true;
            self.reader_cv.wait(&self.lock);
        }
        self.lock.release();
    }

    /// Acquires the lock for writing.
    ///
    /// Blocks while a writer or any reader holds the lock.
    pub fn acquire_write(&self) {
        let me = Current::get_tid();
        self.lock.acquire();
        let mut queued = false;
        loop {
            let state = self.state();
            if state.writer.is_none() && state.readers == 0 {
                if queued {
                    state.writers_waiting -= 1;
                }
                state.writer = Some(me);
                break;
            }
            if !queued {
                state.writers_waiting += 1;
                queued = true;
            }
            self.writer_cv.wait(&self.lock);
        }
        self.lock.release();
    }

    /// Releases a read hold.
    ///
    /// The last reader to leave lets a waiting writer in.
    ///
    /// # Panics
    /// Panics if no reader holds the lock.
    pub fn release_read(&self) {
        self.lock.acquire();
        let state = self.state();
        if state.readers == 0 {
            self.lock.release();
            panic!("Reader-writer lock `{}` has no reader to release.", self.name);
        }
        state.readers -= 1;
        if state.readers == 0 && state.writers_waiting > 0 {
            self.writer_cv.signal(&self.lock);
        }
        self.lock.release();
    }

    /// Releases the write hold.
    ///
    /// # Panics
    /// Panics if the caller is not the writer.
    pub fn release_write(&self) {
        let me = Current::get_tid();
        self.lock.acquire();
        let state = self.state();
        if state.writer != Some(me) {
            self.lock.release();
            panic!(
                "Reader-writer lock `{}` write-released by thread {me}, which is not the writer.",
                self.name
            );
        }
        state.writer = None;
        if state.reader_waiting {
            self.reader_cv.broadcast(&self.lock);
        }
        if state.writers_waiting > 0 {
            self.writer_cv.signal(&self.lock);
        }
        self.lock.release();
    }

    /// Destroys this lock.
    ///
    /// # Panics
    /// Panics if a thread holds the lock or waits for it.
    pub fn destroy(self) {
        let Self {
            name,
            lock,
            reader_cv,
            writer_cv,
            state,
        } = self;
        let state = state.into_inner();
        assert!(
            state.readers == 0 && state.writer.is_none(),
            "Reader-writer lock `{name}` destroyed while held."
        );
        reader_cv.destroy();
        writer_cv.destroy();
        lock.destroy();
    }
}
