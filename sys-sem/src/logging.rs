// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Logging
//!
//! Logging in this crate goes through the `log` crate.  The semaphore only logs on its slow paths
//! (parking, waking, timeouts, rejected arguments and denied accesses), at `debug` and `trace`
//! level; the fast path never logs.
//!
//! Applications are free to install any `log` backend.  For convenience, when `std` is available,
//! [`set_logger`] installs a simple console logger that writes each message to stderr as a single
//! line.  Without `std` there is nowhere to send messages, and `set_logger` does nothing.

use log::{LevelFilter, SetLoggerError};

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        mod impl_console;
        pub use impl_console::set_logger_level;
    } else {
        /// No logging is possible, provide an empty handler that does nothing.
        pub fn set_logger_level(_level: LevelFilter) -> Result<(), SetLoggerError> {
            Ok(())
        }
    }
}

/// Install the console logger, with messages at `Info` and above enabled.
///
/// Fails if a logger has already been installed.
pub fn set_logger() -> Result<(), SetLoggerError> {
    set_logger_level(LevelFilter::Info)
}
