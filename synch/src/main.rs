//! `synchtest`: runs the kernel-menu synchronization tests.
//!
//! ```text
//! synchtest [TEST ...]
//! ```
//!
//! Without arguments every test runs. Otherwise only the named tests run,
//! e.g. `synchtest synchtests::locktest synchtests::whalemating`. Set
//! `SYNCHTEST_QUIET=1` to silence the log.

use kthread::TestDriver;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use synch::synchtests;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_thread_names(true)
        .init();
    if std::env::var_os("SYNCHTEST_QUIET").is_some() {
        kthread::QUIET.store(true, Ordering::SeqCst);
    }

    let filter = std::env::args().skip(1).collect::<Vec<_>>();
    let (total, passed) = TestDriver::start(
        &[
            &synchtests::semtest,
            &synchtests::locktest,
            &synchtests::cvtest,
            &synchtests::cvtest2,
            &synchtests::rwtest,
            &synchtests::whalemating,
        ],
        &filter,
    );
    if total == passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
