// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Logging to the console
//!
//! This module implements a log handler (for the [`log`] crate) that writes messages to stderr.

use std::eprintln;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// A simple log handler, built around stderr.
struct ConsoleLogger;

impl Log for ConsoleLogger {
    // Filtering is done by the global max level.
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    // One `eprintln!` per message, so lines from different threads don't interleave.
    fn log(&self, record: &Record<'_>) {
        eprintln!("{}:{}: {}", record.level(), record.target(), record.args());
    }

    // Stderr is unbuffered.
    fn flush(&self) {}
}

static CONSOLE_LOGGER: ConsoleLogger = ConsoleLogger;

/// Install the console logger, with messages at `level` and above enabled.
///
/// Fails if a logger has already been installed.
pub fn set_logger_level(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&CONSOLE_LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
