mod semaphore {
    use kthread::{
        test_utils::{holds_for, init_test_logging, wait_until},
        thread::{ThreadBuilder, ThreadState, get_state_by_tid},
    };
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, AtomicU32, Ordering},
        },
        time::Duration,
    };
    use synch::sync::Semaphore;

    #[test]
    fn sema_0() {
        init_test_logging();
        let sema = Arc::new(Semaphore::new("sema_0", 0).unwrap());
        let is_woken_up = Arc::new(AtomicBool::new(false));

        let thread = {
            let (sema, is_woken_up) = (sema.clone(), is_woken_up.clone());
            ThreadBuilder::new("worker")
                .spawn(move || {
                    sema.wait();
                    is_woken_up.store(true, Ordering::SeqCst);
                })
                .unwrap()
        };

        wait_until("worker to park", || {
            get_state_by_tid(thread.tid) == Ok(ThreadState::Parked)
        });
        assert!(!is_woken_up.load(Ordering::SeqCst));

        sema.signal();
        assert_eq!(thread.join(), 0);

        assert!(is_woken_up.load(Ordering::SeqCst));
        assert_eq!(sema.count(), 0);
    }

    fn admits_in_batches(initial: u32, batch: u32) {
        const COUNT: u32 = 16;
        let sema = Arc::new(Semaphore::new("batches", initial).unwrap());
        let counter = Arc::new(AtomicU32::new(0));

        let handles = (0..COUNT)
            .map(|i| {
                let (sema, counter) = (sema.clone(), counter.clone());
                ThreadBuilder::new(format!("t{i}"))
                    .spawn(move || {
                        sema.wait();
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap()
            })
            .collect::<Vec<_>>();

        let mut expected = initial;
        wait_until("initial permits", || counter.load(Ordering::SeqCst) == expected);
        while expected < COUNT {
            holds_for("blocked threads", Duration::from_millis(20), || {
                counter.load(Ordering::SeqCst) == expected
            });
            for _ in 0..batch {
                sema.signal();
            }
            expected += batch;
            wait_until("released threads", || counter.load(Ordering::SeqCst) == expected);
        }
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }
        assert_eq!(sema.count(), 0);
    }

    #[test]
    fn sema_1() {
        admits_in_batches(1, 1);
    }

    #[test]
    fn sema_2() {
        admits_in_batches(2, 2);
    }

    #[test]
    fn barging_is_allowed() {
        let sema = Arc::new(Semaphore::new("barge", 0).unwrap());
        let sleeper = {
            let sema = sema.clone();
            ThreadBuilder::new("sleeper")
                .spawn(move || sema.wait())
                .unwrap()
        };
        wait_until("sleeper to park", || {
            get_state_by_tid(sleeper.tid) == Ok(ThreadState::Parked)
        });
        // Whoever gets there first takes the unit; the other one takes the
        // second.
        sema.signal();
        sema.signal();
        sema.wait();
        assert_eq!(sleeper.join(), 0);
        assert_eq!(sema.count(), 0);
    }
}

mod lock {
    use kthread::{
        sync::WouldBlock,
        test_utils::{init_test_logging, wait_until},
        thread::{ThreadBuilder, ThreadState, get_state_by_tid},
    };
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use synch::sync::Lock;

    #[test]
    fn smoke() {
        init_test_logging();
        const LENGTH: usize = 64;
        let lock = Arc::new(Lock::new("smoke").unwrap());
        let output = Arc::new(kthread::sync::SpinLock::new(Vec::new()));
        let inside = Arc::new(AtomicUsize::new(0));

        let handles = (0..LENGTH)
            .map(|i| {
                let (lock, output, inside) = (lock.clone(), output.clone(), inside.clone());
                ThreadBuilder::new("smoker")
                    .spawn(move || {
                        lock.acquire();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        std::thread::yield_now();
                        let mut d = output.lock();
                        d.push(i);
                        d.unlock();
                        inside.fetch_sub(1, Ordering::SeqCst);
                        lock.release();
                    })
                    .unwrap()
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }

        let mut output = output.lock();
        output.sort();
        assert_eq!(&*output, &(0..LENGTH).collect::<Vec<_>>());
        output.unlock();
    }

    #[test]
    fn parking() {
        let lock = Arc::new(Lock::new("parking").unwrap());
        lock.acquire();

        let be_parked = {
            let lock = lock.clone();
            ThreadBuilder::new("blockee")
                .spawn(move || {
                    lock.acquire();
                    assert!(lock.held_by_caller());
                    lock.release();
                })
                .unwrap()
        };

        wait_until("blockee to park", || {
            get_state_by_tid(be_parked.tid) == Ok(ThreadState::Parked)
        });
        assert!(lock.held_by_caller());

        lock.release();
        assert_eq!(be_parked.join(), 0);
        assert_eq!(lock.try_acquire(), Ok(()));
        lock.release();
    }

    #[test]
    fn try_acquire_contended() {
        let lock = Arc::new(Lock::new("try").unwrap());
        lock.acquire();
        let other = {
            let lock = lock.clone();
            ThreadBuilder::new("trier")
                .spawn(move || assert_eq!(lock.try_acquire(), Err(WouldBlock)))
                .unwrap()
        };
        assert_eq!(other.join(), 0);
        lock.release();
    }
}

mod condition_variable {
    use kthread::thread::ThreadBuilder;
    use std::sync::Arc;
    use synch::sync::{ConditionVariable, Lock};

    const MAX: usize = 2;
    const ITEMS: usize = 10;

    struct BufferInner {
        item: [usize; MAX],
        front: usize,
        tail: usize,
    }

    impl BufferInner {
        fn is_full(&self) -> bool {
            self.tail.wrapping_sub(self.front) % MAX == MAX - 1
        }

        fn is_empty(&self) -> bool {
            self.front == self.tail
        }
    }

    struct Buffer {
        lock: Lock,
        inner: kthread::sync::SpinLock<BufferInner>,
        full: ConditionVariable,
        empty: ConditionVariable,
    }

    impl Buffer {
        fn new() -> Self {
            Self {
                lock: Lock::new("buffer").unwrap(),
                inner: kthread::sync::SpinLock::new(BufferInner {
                    item: [0; MAX],
                    front: 0,
                    tail: 0,
                }),
                full: ConditionVariable::new("full").unwrap(),
                empty: ConditionVariable::new("empty").unwrap(),
            }
        }

        fn check(&self, f: impl FnOnce(&BufferInner) -> bool) -> bool {
            let guard = self.inner.lock();
            let r = f(&guard);
            guard.unlock();
            r
        }

        fn put(&self, val: usize) {
            self.lock.acquire();
            self.full.wait_while(&self.lock, || self.check(BufferInner::is_full));
            let mut guard = self.inner.lock();
            let tail = (guard.tail + 1) % MAX;
            guard.tail = tail;
            guard.item[tail] = val;
            guard.unlock();
            self.empty.signal(&self.lock);
            self.lock.release();
        }

        fn get(&self) -> usize {
            self.lock.acquire();
            self.empty.wait_while(&self.lock, || self.check(BufferInner::is_empty));
            let mut guard = self.inner.lock();
            let front = (guard.front + 1) % MAX;
            let item = guard.item[front];
            guard.front = front;
            guard.unlock();
            self.full.signal(&self.lock);
            self.lock.release();
            item
        }
    }

    #[test]
    fn bounded_buffer() {
        let buffer = Arc::new(Buffer::new());
        let output = Arc::new(kthread::sync::SpinLock::new(Vec::new()));

        let consumers = (0..ITEMS)
            .map(|_| {
                let (buffer, output) = (buffer.clone(), output.clone());
                ThreadBuilder::new("consumer")
                    .spawn(move || {
                        let d = buffer.get();
                        let mut guard = output.lock();
                        guard.push(d);
                        guard.unlock();
                    })
                    .unwrap()
            })
            .collect::<Vec<_>>();

        let producer = {
            let buffer = buffer.clone();
            ThreadBuilder::new("producer")
                .spawn(move || {
                    for i in 0..ITEMS {
                        buffer.put(i);
                    }
                })
                .unwrap()
        };

        for consumer in consumers {
            assert_eq!(consumer.join(), 0);
        }
        assert_eq!(producer.join(), 0);

        let mut output = output.lock();
        output.sort();
        assert_eq!(&*output, &(0..ITEMS).collect::<Vec<_>>());
        output.unlock();
    }

    #[test]
    fn broadcast_wakes_everyone() {
        const WAITERS: usize = 8;
        let lock = Arc::new(Lock::new("gate").unwrap());
        let cv = Arc::new(ConditionVariable::new("gate").unwrap());
        let state = Arc::new(kthread::sync::SpinLock::new((false, 0usize)));

        let waiters = (0..WAITERS)
            .map(|_| {
                let (lock, cv, state) = (lock.clone(), cv.clone(), state.clone());
                ThreadBuilder::new("waiter")
                    .spawn(move || {
                        lock.acquire();
                        let mut s = state.lock();
                        s.1 += 1;
                        s.unlock();
                        cv.wait_while(&lock, || {
                            let s = state.lock();
                            let closed = !s.0;
                            s.unlock();
                            closed
                        });
                        lock.release();
                    })
                    .unwrap()
            })
            .collect::<Vec<_>>();

        kthread::test_utils::wait_until("waiters to arrive", || {
            let s = state.lock();
            let n = s.1;
            s.unlock();
            n == WAITERS
        });
        lock.acquire();
        let mut s = state.lock();
        s.0 = true;
        s.unlock();
        cv.broadcast(&lock);
        lock.release();

        for waiter in waiters {
            assert_eq!(waiter.join(), 0);
        }
    }
}

mod rwlock {
    use kthread::{
        sync::SpinLock,
        test_utils::{holds_for, wait_until},
        thread::{ThreadBuilder, ThreadState, get_state_by_tid},
    };
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };
    use synch::sync::ReaderWriterLock;

    #[test]
    fn readers_do_not_block_each_other() {
        const READERS: usize = 8;
        let rw = Arc::new(ReaderWriterLock::new("shared").unwrap());
        let inside = Arc::new(AtomicUsize::new(0));

        let readers = (0..READERS)
            .map(|i| {
                let (rw, inside) = (rw.clone(), inside.clone());
                ThreadBuilder::new(format!("reader{i}"))
                    .spawn(move || {
                        rw.acquire_read();
                        inside.fetch_add(1, Ordering::SeqCst);
                        // Nobody leaves before everyone is in.
                        wait_until("all readers inside", || {
                            inside.load(Ordering::SeqCst) == READERS
                        });
                        rw.release_read();
                    })
                    .unwrap()
            })
            .collect::<Vec<_>>();
        for reader in readers {
            assert_eq!(reader.join(), 0);
        }
    }

    #[test]
    fn writer_excludes_readers() {
        let rw = Arc::new(ReaderWriterLock::new("exclusive").unwrap());
        let entered = Arc::new(AtomicUsize::new(0));
        rw.acquire_write();

        let reader = {
            let (rw, entered) = (rw.clone(), entered.clone());
            ThreadBuilder::new("reader")
                .spawn(move || {
                    rw.acquire_read();
                    entered.fetch_add(1, Ordering::SeqCst);
                    rw.release_read();
                })
                .unwrap()
        };
        let writer = {
            let (rw, entered) = (rw.clone(), entered.clone());
            ThreadBuilder::new("writer")
                .spawn(move || {
                    rw.acquire_write();
                    entered.fetch_add(1, Ordering::SeqCst);
                    rw.release_write();
                })
                .unwrap()
        };
        wait_until("both to park", || {
            get_state_by_tid(reader.tid) == Ok(ThreadState::Parked)
                && get_state_by_tid(writer.tid) == Ok(ThreadState::Parked)
        });
        holds_for("exclusion", Duration::from_millis(20), || {
            entered.load(Ordering::SeqCst) == 0
        });
        rw.release_write();
        assert_eq!(reader.join(), 0);
        assert_eq!(writer.join(), 0);
        assert_eq!(entered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn writer_priority() {
        const LATE_READERS: usize = 4;
        let rw = Arc::new(ReaderWriterLock::new("priority").unwrap());
        let log = Arc::new(SpinLock::new(Vec::new()));
        let record = |log: &SpinLock<Vec<&'static str>>, what| {
            let mut guard = log.lock();
            guard.push(what);
            guard.unlock();
        };

        // R1 holds the lock for reading.
        rw.acquire_read();

        // W1 queues up behind R1.
        let writer = {
            let (rw, log) = (rw.clone(), log.clone());
            ThreadBuilder::new("w1")
                .spawn(move || {
                    rw.acquire_write();
                    record(&log, "w1 in");
                    std::thread::sleep(Duration::from_millis(10));
                    record(&log, "w1 out");
                    rw.release_write();
                })
                .unwrap()
        };
        wait_until("w1 to park", || {
            get_state_by_tid(writer.tid) == Ok(ThreadState::Parked)
        });

        // R2..Rn arrive after W1 and must wait for it.
        let readers = (0..LATE_READERS)
            .map(|i| {
                let (rw, log) = (rw.clone(), log.clone());
                ThreadBuilder::new(format!("r{}", i + 2))
                    .spawn(move || {
                        rw.acquire_read();
                        record(&log, "reader in");
                        rw.release_read();
                    })
                    .unwrap()
            })
            .collect::<Vec<_>>();
        wait_until("late readers to park", || {
            readers
                .iter()
                .all(|r| get_state_by_tid(r.tid) == Ok(ThreadState::Parked))
        });

        rw.release_read();
        assert_eq!(writer.join(), 0);
        for reader in readers {
            assert_eq!(reader.join(), 0);
        }

        let log = log.lock();
        assert_eq!(log.len(), 2 + LATE_READERS);
        assert_eq!(&log[..2], &["w1 in", "w1 out"]);
        assert!(log[2..].iter().all(|e| *e == "reader in"));
        log.unlock();
    }
}
