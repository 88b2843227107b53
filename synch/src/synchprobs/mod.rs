//! # Synchronization problems.
//!
//! Classic coordination problems solved with the primitives of
//! [`crate::sync`].
//!
//! [`Rendezvous`] matches threads of `k` different roles into groups of one
//! thread per role. Each group is completed by the last of its members to
//! arrive: that thread finds one waiter of every other role, claims them and
//! releases them, and leaves without blocking. Everybody else blocks on the
//! semaphore of its role until some later arrival claims it.
//!
//! [`whalemating`] is the three-role instance (male, female, matchmaker)
//! together with a driver that runs it with many threads per role.

pub mod whalemating;

pub use whalemating::{
    DriverConfig, DriverConfigBuilder, MatingHooks, MatingReport, Whale, Whalemating,
    run_whalemating,
};

use crate::sync::{Lock, Semaphore};
use kthread::KernelError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// How a thread left [`Rendezvous::arrive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// The thread completed a group and released the other members.
    Completed,
    /// The thread waited and was released by the thread that completed its
    /// group.
    Released,
}

struct Role {
    release: Semaphore,
    // Only changed while holding `Rendezvous::lock`.
    waiting: AtomicUsize,
    matched: AtomicUsize,
}

/// Matches threads of `k` roles into groups of one thread per role.
pub struct Rendezvous {
    lock: Lock,
    roles: Vec<Role>,
    groups: AtomicUsize,
}

impl Rendezvous {
    /// Creates a rendezvous for `roles` roles.
    ///
    /// # Errors
    /// Returns [`KernelError::InvalidArgument`] if `roles < 2`, and
    /// [`KernelError::NoMemory`] if it cannot be allocated.
    pub fn new(name: &str, roles: usize) -> Result<Self, KernelError> {
        if roles < 2 {
            return Err(KernelError::InvalidArgument);
        }
        let mut v = Vec::new();
        v.try_reserve_exact(roles)
            .map_err(|_| KernelError::NoMemory)?;
        for role in 0..roles {
            v.push(Role {
                release: Semaphore::new(&format!("{name}_sem{role}"), 0)?,
                waiting: AtomicUsize::new(0),
                matched: AtomicUsize::new(0),
            });
        }
        Ok(Self {
            lock: Lock::new(name)?,
            roles: v,
            groups: AtomicUsize::new(0),
        })
    }

    /// Number of roles.
    pub fn roles(&self) -> usize {
        self.roles.len()
    }

    #[track_caller]
    fn role(&self, role: usize) -> &Role {
        assert!(
            role < self.roles.len(),
            "Role {role} out of range for a rendezvous of {} roles.",
            self.roles.len()
        );
        &self.roles[role]
    }

    /// Joins a group as `role`, returning once the group is complete.
    ///
    /// # Panics
    /// Panics if `role` is out of range, or if the current thread must not
    /// block.
    pub fn arrive(&self, role: usize) -> Arrival {
        let me = self.role(role);

        self.lock.acquire();
        let complete = self
            .roles
            .iter()
            .enumerate()
            .all(|(i, r)| i == role || r.waiting.load(Ordering::Relaxed) > 0);
        if complete {
            for (_, other) in self.roles.iter().enumerate().filter(|(i, _)| *i != role) {
                other.waiting.fetch_sub(1, Ordering::Relaxed);
                other.release.signal();
            }
            me.matched.fetch_add(1, Ordering::Relaxed);
            self.groups.fetch_add(1, Ordering::Relaxed);
            self.lock.release();
            Arrival::Completed
        } else {
            me.waiting.fetch_add(1, Ordering::Relaxed);
            self.lock.release();
            me.release.wait();
            self.lock.acquire();
            me.matched.fetch_add(1, Ordering::Relaxed);
            self.lock.release();
            Arrival::Released
        }
    }

    fn read(&self, f: impl FnOnce() -> usize) -> usize {
        self.lock.acquire();
        let v = f();
        self.lock.release();
        v
    }

    /// Number of threads of `role` that wait and have not been claimed yet.
    ///
    /// # Panics
    /// Panics if `role` is out of range.
    pub fn waiting(&self, role: usize) -> usize {
        let role = self.role(role);
        self.read(|| role.waiting.load(Ordering::Relaxed))
    }

    /// Number of threads of `role` that have left as part of a group.
    ///
    /// # Panics
    /// Panics if `role` is out of range.
    pub fn matched(&self, role: usize) -> usize {
        let role = self.role(role);
        self.read(|| role.matched.load(Ordering::Relaxed))
    }

    /// Number of completed groups.
    pub fn groups(&self) -> usize {
        self.read(|| self.groups.load(Ordering::Relaxed))
    }

    /// Destroys this rendezvous.
    ///
    /// # Panics
    /// Panics if a thread still waits in it.
    pub fn destroy(self) {
        let Self { lock, roles, .. } = self;
        for role in roles {
            role.release.destroy();
        }
        lock.destroy();
    }
}
