//! Kernel print utilities.

use std::io::Write;

#[doc(hidden)]
pub fn _print(fmt: core::fmt::Arguments<'_>) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_fmt(fmt);
    let _ = out.flush();
}

/// Prints out the message.
///
/// Use the format! syntax to write data to the standard output.
/// This first holds the lock for console device.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::kprint::_print(format_args!($($arg)*)));
}

/// Prints out the message with a newline.
///
/// Use the format! syntax to write data to the standard output.
/// This first holds the lock for console device.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

/// Display an information message.
///
/// The message is emitted as a [`tracing`] event at the `INFO` level unless
/// [`QUIET`](crate::QUIET) is set.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::__tracing::info!($($arg)*) });
}

/// Display a warning message.
///
/// The message is emitted as a [`tracing`] event at the `WARN` level unless
/// [`QUIET`](crate::QUIET) is set.
#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::__tracing::warn!($($arg)*) });
}

/// Display a debug message.
///
/// The message is emitted as a [`tracing`] event at the `DEBUG` level unless
/// [`QUIET`](crate::QUIET) is set.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::__tracing::debug!($($arg)*) });
}
