//! Test utilities.
//!
//! Shared helpers for the tests of this crate and of the crates built on it:
//! tracing-based log initialization and a bounded polling helper for
//! asserting on state that another thread changes.

use std::{
    sync::Once,
    time::{Duration, Instant},
};

static INIT_LOGGING: Once = Once::new();

/// How long [`wait_until`] polls before failing the test.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialize test logging with debug-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::DEBUG);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Polls `cond` until it holds.
///
/// # Panics
/// Panics with `what` if `cond` does not hold within [`DEFAULT_TIMEOUT`].
pub fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + DEFAULT_TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Asserts that `cond` keeps holding for the whole of `period`.
///
/// Used to check that blocked threads stay blocked.
pub fn holds_for(what: &str, period: Duration, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + period;
    while Instant::now() < deadline {
        assert!(cond(), "{what} stopped holding");
        std::thread::sleep(Duration::from_millis(1));
    }
}
