//! # Whale mating.
//!
//! Whales mate in threes: a male, a female and a matchmaker. Each whale is a
//! thread that calls the entry point of its role ([`Whalemating::male`],
//! [`Whalemating::female`] or [`Whalemating::matchmaker`]). A whale may not
//! return from its entry point before it has been matched with one whale of
//! each other role, and every whale belongs to exactly one triple.
//!
//! The problem state lives in a [`Whalemating`] context, created by
//! [`Whalemating::init`] and torn down by [`Whalemating::cleanup`]. Any
//! number of contexts may exist at the same time.
//!
//! Each entry point reports its progress through the [`MatingHooks`] the
//! context was created with: `start` as soon as the whale arrives, `end` once
//! it has been matched. [`run_whalemating`] drives a whole population of
//! whales through a context with recording hooks and reports the counts.

use super::Rendezvous;
use crate::sync::Semaphore;
use kthread::{
    KernelError,
    thread::{JoinHandle, ThreadBuilder},
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// The role of a whale.
#[derive(Clone, Copy, Eq, PartialEq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(usize)]
pub enum Whale {
    /// A male whale.
    Male = 0,
    /// A female whale.
    Female = 1,
    /// A matchmaker whale.
    Matchmaker = 2,
}

impl Whale {
    /// Every role, in index order.
    pub const ALL: [Whale; 3] = [Whale::Male, Whale::Female, Whale::Matchmaker];

    /// Lower-case name of the role.
    pub fn name(self) -> &'static str {
        match self {
            Whale::Male => "male",
            Whale::Female => "female",
            Whale::Matchmaker => "matchmaker",
        }
    }
}

/// Progress notifications of the whale entry points.
pub trait MatingHooks: Send + Sync {
    /// Whale `index` of role `whale` has arrived.
    fn start(&self, whale: Whale, index: u32);
    /// Whale `index` of role `whale` has been matched and is leaving.
    fn end(&self, whale: Whale, index: u32);
}

impl MatingHooks for () {
    fn start(&self, _: Whale, _: u32) {}
    fn end(&self, _: Whale, _: u32) {}
}

/// A whale mating context.
pub struct Whalemating<H: MatingHooks> {
    rendezvous: Rendezvous,
    hooks: H,
}

impl<H: MatingHooks> Whalemating<H> {
    /// Creates a context that reports to `hooks`.
    ///
    /// # Errors
    /// Returns [`KernelError::NoMemory`] if the context cannot be allocated.
    pub fn init(hooks: H) -> Result<Self, KernelError> {
        Ok(Self {
            rendezvous: Rendezvous::new("whalemating", Whale::ALL.len())?,
            hooks,
        })
    }

    /// Tears this context down and hands back its hooks.
    ///
    /// # Panics
    /// Panics if a whale is still waiting to be matched.
    pub fn cleanup(self) -> H {
        let Self { rendezvous, hooks } = self;
        rendezvous.destroy();
        hooks
    }

    /// The hooks of this context.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    fn mate(&self, whale: Whale, index: u32) {
        self.hooks.start(whale, index);
        self.rendezvous.arrive(whale.into());
        self.hooks.end(whale, index);
    }

    /// Entry point of male whale `index`.
    pub fn male(&self, index: u32) {
        self.mate(Whale::Male, index)
    }

    /// Entry point of female whale `index`.
    pub fn female(&self, index: u32) {
        self.mate(Whale::Female, index)
    }

    /// Entry point of matchmaker whale `index`.
    pub fn matchmaker(&self, index: u32) {
        self.mate(Whale::Matchmaker, index)
    }

    /// Number of whales of role `whale` that wait to be matched.
    pub fn waiting(&self, whale: Whale) -> usize {
        self.rendezvous.waiting(whale.into())
    }

    /// Number of whales of role `whale` that have been matched.
    pub fn matched(&self, whale: Whale) -> usize {
        self.rendezvous.matched(whale.into())
    }

    /// Number of completed triples.
    pub fn triads(&self) -> usize {
        self.rendezvous.groups()
    }
}

/// Configuration of [`run_whalemating`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    per_role: u32,
    stagger: bool,
    quiet: bool,
}

impl DriverConfig {
    /// Starts building a configuration.
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }

    /// Number of whales of each role.
    pub fn per_role(&self) -> u32 {
        self.per_role
    }

    /// Whether whales are started role by role rather than interleaved.
    pub fn stagger(&self) -> bool {
        self.stagger
    }

    /// Whether the per-whale log is suppressed.
    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfigBuilder::default().build()
    }
}

/// Builder of [`DriverConfig`].
#[derive(Debug, Clone, Copy)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl Default for DriverConfigBuilder {
    fn default() -> Self {
        Self {
            config: DriverConfig {
                per_role: 10,
                stagger: false,
                quiet: false,
            },
        }
    }
}

impl DriverConfigBuilder {
    /// Sets the number of whales of each role.
    pub fn per_role(mut self, per_role: u32) -> Self {
        self.config.per_role = per_role;
        self
    }

    /// Starts all males, then all females, then all matchmakers.
    ///
    /// Every male and female then has to wait for a matchmaker.
    pub fn stagger(mut self, stagger: bool) -> Self {
        self.config.stagger = stagger;
        self
    }

    /// Suppresses the per-whale log.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.config.quiet = quiet;
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> DriverConfig {
        self.config
    }
}

/// Outcome of [`run_whalemating`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatingReport {
    /// Whales that arrived, per role.
    pub started: [usize; 3],
    /// Whales that left after being matched, per role.
    pub ended: [usize; 3],
    /// Completed triples.
    pub triads: usize,
    /// Whale threads that panicked.
    pub failed: usize,
}

impl MatingReport {
    /// Returns `true` if every whale was matched exactly once.
    pub fn is_complete(&self, per_role: u32) -> bool {
        let n = per_role as usize;
        self.failed == 0
            && self.triads == n
            && self.started.iter().all(|&c| c == n)
            && self.ended.iter().all(|&c| c == n)
    }
}

#[derive(Default)]
struct Recorder {
    started: [AtomicUsize; 3],
    ended: [AtomicUsize; 3],
    quiet: bool,
}

impl MatingHooks for Recorder {
    fn start(&self, whale: Whale, index: u32) {
        self.started[usize::from(whale)].fetch_add(1, Ordering::SeqCst);
        if !self.quiet {
            kthread::debug!("{} whale #{index} starting", whale.name());
        }
    }

    fn end(&self, whale: Whale, index: u32) {
        self.ended[usize::from(whale)].fetch_add(1, Ordering::SeqCst);
        if !self.quiet {
            kthread::debug!("{} whale #{index} ending", whale.name());
        }
    }
}

/// Holds the whales back until the whole population has been spawned.
struct StartGate {
    roles: [Semaphore; 3],
    abort: AtomicBool,
}

impl StartGate {
    fn new() -> Result<Self, KernelError> {
        let [male, female, matchmaker] =
            Whale::ALL.map(|w| Semaphore::new(&format!("{}_gate", w.name()), 0));
        Ok(Self {
            roles: [male?, female?, matchmaker?],
            abort: AtomicBool::new(false),
        })
    }

    /// Returns `false` if the run was called off before this whale started.
    fn pass(&self, whale: Whale) -> bool {
        self.roles[usize::from(whale)].wait();
        !self.abort.load(Ordering::SeqCst)
    }

    fn open(&self, whale: Whale) {
        self.roles[usize::from(whale)].signal();
    }

    fn destroy(self) {
        let Self { roles, .. } = self;
        for role in roles {
            role.destroy();
        }
    }
}

type WhaleFn = Box<dyn FnOnce() + Send>;

/// Runs `config.per_role()` whales of every role through a fresh context and
/// reports what happened.
///
/// No whale arrives before every whale thread has been spawned. If a spawn
/// fails, the whales spawned so far are let go without arriving and joined
/// before the error is returned.
///
/// # Errors
/// Returns [`KernelError::NoMemory`] if the context or a whale thread cannot
/// be created, and [`KernelError::Busy`] if the context is still referenced
/// after every whale has been joined.
pub fn run_whalemating(config: &DriverConfig) -> Result<MatingReport, KernelError> {
    drive(config, |name, whale_fn| ThreadBuilder::new(name).spawn(whale_fn))
}

fn drive(
    config: &DriverConfig,
    mut spawn: impl FnMut(String, WhaleFn) -> Result<JoinHandle, KernelError>,
) -> Result<MatingReport, KernelError> {
    let ctx = Arc::new(Whalemating::init(Recorder {
        quiet: config.quiet(),
        ..Default::default()
    })?);
    let gate = Arc::new(StartGate::new()?);

    let order: Vec<(Whale, u32)> = if config.stagger() {
        Whale::ALL
            .iter()
            .flat_map(|&w| (0..config.per_role()).map(move |i| (w, i)))
            .collect()
    } else {
        (0..config.per_role())
            .flat_map(|i| Whale::ALL.iter().map(move |&w| (w, i)))
            .collect()
    };

    let mut handles = Vec::with_capacity(order.len());
    let mut spawn_error = None;
    for &(whale, index) in &order {
        let (ctx, gate) = (ctx.clone(), gate.clone());
        let whale_fn: WhaleFn = Box::new(move || {
            if !gate.pass(whale) {
                return;
            }
            match whale {
                Whale::Male => ctx.male(index),
                Whale::Female => ctx.female(index),
                Whale::Matchmaker => ctx.matchmaker(index),
            }
        });
        match spawn(format!("{} whale #{index}", whale.name()), whale_fn) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                kthread::warning!(
                    "whalemating: cannot spawn {} whale #{index}: {e}",
                    whale.name()
                );
                spawn_error = Some(e);
                break;
            }
        }
    }

    if spawn_error.is_some() {
        gate.abort.store(true, Ordering::SeqCst);
    }
    for &(whale, _) in &order[..handles.len()] {
        gate.open(whale);
    }
    let failed = handles
        .into_iter()
        .map(JoinHandle::join)
        .filter(|&code| code != 0)
        .count();
    if failed > 0 {
        kthread::warning!("{failed} whale(s) panicked");
    }

    let triads = ctx.triads();
    let recorder = Arc::try_unwrap(ctx)
        .map_err(|_| KernelError::Busy)?
        .cleanup();
    Arc::try_unwrap(gate)
        .map_err(|_| KernelError::Busy)?
        .destroy();
    if let Some(e) = spawn_error {
        return Err(e);
    }

    let load = |counts: &[AtomicUsize; 3]| counts.each_ref().map(|c| c.load(Ordering::SeqCst));
    let report = MatingReport {
        started: load(&recorder.started),
        ended: load(&recorder.ended),
        triads,
        failed,
    };
    kthread::info!(
        "whalemating: {} triad(s), started {:?}, ended {:?}",
        report.triads,
        report.started,
        report.ended
    );
    Ok(report)
}
