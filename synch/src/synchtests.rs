//! Kernel-menu synchronization tests.
//!
//! Each function runs one classic suite against the primitives of
//! [`crate::sync`] with a crowd of threads, and panics on the first broken
//! invariant. They are run by the `synchtest` binary through
//! [`kthread::TestDriver`], and by the integration tests.

use crate::{
    sync::{ConditionVariable, Lock, ReaderWriterLock, Semaphore},
    synchprobs::{DriverConfig, run_whalemating},
};
use kthread::thread::{JoinHandle, ThreadBuilder};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

const NTHREADS: usize = 32;
const NLOOPS: usize = 120;
const NCVLOOPS: usize = 5;

fn spawn_all(name: &str, n: usize, f: impl Fn(usize) + Send + Sync + 'static) -> Vec<JoinHandle> {
    let f = Arc::new(f);
    (0..n)
        .map(|i| {
            let f = f.clone();
            ThreadBuilder::new(format!("{name}{i}"))
                .spawn(move || f(i))
                .unwrap_or_else(|e| panic!("{name}: thread_fork failed: {e}"))
        })
        .collect()
}

fn join_all(name: &str, handles: Vec<JoinHandle>) {
    let failed = handles
        .into_iter()
        .map(JoinHandle::join)
        .filter(|&code| code != 0)
        .count();
    assert_eq!(failed, 0, "{name}: {failed} thread(s) failed");
}

/// Threads pass through a semaphore one at a time, in any order, and are
/// all accounted for.
pub fn semtest() {
    kthread::info!("Starting semaphore test...");
    let gate = Arc::new(Semaphore::new("testsem", 0).unwrap());
    let done = Arc::new(Semaphore::new("donesem", 0).unwrap());
    let inside = Arc::new(AtomicUsize::new(0));

    let handles = {
        let (gate, done, inside) = (gate.clone(), done.clone(), inside.clone());
        spawn_all("semtest", NTHREADS, move |_| {
            gate.wait();
            assert_eq!(
                inside.fetch_add(1, Ordering::SeqCst),
                0,
                "semtest: two threads passed the gate"
            );
            inside.fetch_sub(1, Ordering::SeqCst);
            done.signal();
        })
    };
    for _ in 0..NTHREADS {
        gate.signal();
        done.wait();
    }
    join_all("semtest", handles);
    assert_eq!(gate.count(), 0);
    assert_eq!(done.count(), 0);
    kthread::info!("Semaphore test done.");
}

/// Threads repeatedly update three related values under a lock and check
/// that nobody else changed them in between.
pub fn locktest() {
    kthread::info!("Starting lock test...");
    let lock = Arc::new(Lock::new("testlock").unwrap());
    let values = Arc::new([
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
    ]);

    let handles = {
        let (lock, values) = (lock.clone(), values.clone());
        spawn_all("locktest", NTHREADS, move |i| {
            for _ in 0..NLOOPS {
                lock.acquire();
                assert!(lock.held_by_caller());
                values[0].store(i, Ordering::Relaxed);
                values[1].store(i * i, Ordering::Relaxed);
                std::thread::yield_now();
                values[2].store(i % 3, Ordering::Relaxed);
                std::thread::yield_now();
                let v = values[0].load(Ordering::Relaxed);
                assert_eq!(v, i, "locktest: value 1 changed under the lock");
                assert_eq!(values[1].load(Ordering::Relaxed), v * v);
                assert_eq!(values[2].load(Ordering::Relaxed), v % 3);
                lock.release();
            }
        })
    };
    join_all("locktest", handles);
    assert!(!lock.held_by_caller());
    kthread::info!("Lock test done.");
}

/// Threads take turns in descending order of their index, waiting on a
/// condition variable until it is their turn.
pub fn cvtest() {
    kthread::info!("Starting CV test...");
    let lock = Arc::new(Lock::new("testlock").unwrap());
    let cv = Arc::new(ConditionVariable::new("testcv").unwrap());
    let turn = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(kthread::sync::SpinLock::new(Vec::new()));

    for _ in 0..NCVLOOPS {
        turn.store(NTHREADS, Ordering::SeqCst);
        let handles = {
            let (lock, cv, turn, order) = (lock.clone(), cv.clone(), turn.clone(), order.clone());
            spawn_all("cvtest", NTHREADS, move |i| {
                lock.acquire();
                cv.wait_while(&lock, || turn.load(Ordering::SeqCst) != i + 1);
                let mut guard = order.lock();
                guard.push(i);
                guard.unlock();
                turn.fetch_sub(1, Ordering::SeqCst);
                cv.broadcast(&lock);
                lock.release();
            })
        };
        join_all("cvtest", handles);

        let mut guard = order.lock();
        let seen = core::mem::take(&mut *guard);
        guard.unlock();
        assert_eq!(
            seen,
            (0..NTHREADS).rev().collect::<Vec<_>>(),
            "cvtest: threads ran out of turn"
        );
    }
    kthread::info!("CV test done.");
}

/// Two threads play ping-pong through a pair of condition variables.
pub fn cvtest2() {
    kthread::info!("Starting CV test 2...");
    const ROUNDS: usize = 200;
    let lock = Arc::new(Lock::new("testlock").unwrap());
    let cvs = Arc::new([
        ConditionVariable::new("ping").unwrap(),
        ConditionVariable::new("pong").unwrap(),
    ]);
    let ball = Arc::new(AtomicUsize::new(0));

    let handles = {
        let (lock, cvs, ball) = (lock.clone(), cvs.clone(), ball.clone());
        spawn_all("cvtest2-", 2, move |me| {
            for _ in 0..ROUNDS {
                lock.acquire();
                cvs[me].wait_while(&lock, || ball.load(Ordering::SeqCst) % 2 != me);
                ball.fetch_add(1, Ordering::SeqCst);
                cvs[1 - me].signal(&lock);
                lock.release();
            }
        })
    };
    join_all("cvtest2", handles);
    assert_eq!(ball.load(Ordering::SeqCst), 2 * ROUNDS);
    kthread::info!("CV test 2 done.");
}

/// Readers and writers hammer a reader-writer lock while checking that a
/// writer is always alone.
pub fn rwtest() {
    kthread::info!("Starting RW lock test...");
    let rw = Arc::new(ReaderWriterLock::new("testrw").unwrap());
    let readers = Arc::new(AtomicUsize::new(0));
    let writing = Arc::new(AtomicBool::new(false));
    let max_readers = Arc::new(AtomicUsize::new(0));

    let handles = {
        let (rw, readers, writing, max_readers) =
            (rw.clone(), readers.clone(), writing.clone(), max_readers.clone());
        spawn_all("rwtest", NTHREADS, move |i| {
            for _ in 0..NLOOPS / 4 {
                if i % 4 == 0 {
                    rw.acquire_write();
                    assert!(!writing.swap(true, Ordering::SeqCst), "rwtest: two writers");
                    assert_eq!(readers.load(Ordering::SeqCst), 0, "rwtest: writer with readers");
                    std::thread::yield_now();
                    writing.store(false, Ordering::SeqCst);
                    rw.release_write();
                } else {
                    rw.acquire_read();
                    let now = readers.fetch_add(1, Ordering::SeqCst) + 1;
                    max_readers.fetch_max(now, Ordering::SeqCst);
                    assert!(!writing.load(Ordering::SeqCst), "rwtest: reader with writer");
                    std::thread::yield_now();
                    readers.fetch_sub(1, Ordering::SeqCst);
                    rw.release_read();
                }
            }
        })
    };
    join_all("rwtest", handles);
    kthread::info!(
        "RW lock test done. Up to {} concurrent reader(s).",
        max_readers.load(Ordering::SeqCst)
    );
}

/// Runs the whale mating driver with the default population.
pub fn whalemating() {
    kthread::info!("Starting whalemating...");
    let config = DriverConfig::builder().quiet(true).build();
    let report = run_whalemating(&config).unwrap_or_else(|e| panic!("whalemating: {e}"));
    assert!(
        report.is_complete(config.per_role()),
        "whalemating: incomplete run {report:?}"
    );
    kthread::info!("Whalemating done.");
}
