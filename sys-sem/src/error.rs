// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! # Semaphore errors
//!
//! This module contains an `Error` and `Result` type for the semaphore operations.  Each error
//! corresponds to the errno a kernel call would traditionally return for it, available through
//! [`Error::errno`].
//!
//! None of these are fatal.  `LimitReached` in particular is the expected way for `give` to report
//! backpressure.

use core::fmt;

/// errno: Try again.
pub const EAGAIN: u32 = 11;
/// errno: Permission denied.
pub const EACCES: u32 = 13;
/// errno: Invalid argument.
pub const EINVAL: u32 = 22;
/// errno: Connection timed out.
pub const ETIMEDOUT: u32 = 116;

/// A semaphore error.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The semaphore is not valid (uninitialized), or `init` was given a limit outside
    /// `(0, SYS_SEM_MAX_LIMIT]` or an initial count above the limit.
    InvalidArgument,
    /// The calling thread does not have read/write access to the semaphore's memory.
    AccessDenied,
    /// `give` was called while the count was already at the limit.
    LimitReached,
    /// `take` could not get a unit before the timeout.
    Timeout,
}

impl Error {
    /// The (positive) errno corresponding to this error.
    pub const fn errno(self) -> u32 {
        match self {
            Error::InvalidArgument => EINVAL,
            Error::AccessDenied => EACCES,
            Error::LimitReached => EAGAIN,
            Error::Timeout => ETIMEDOUT,
        }
    }
}

impl core::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::AccessDenied => write!(f, "access denied"),
            Error::LimitReached => write!(f, "semaphore limit reached"),
            Error::Timeout => write!(f, "timed out"),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sys_sem error errno:{} ({})", self.errno(), self)
    }
}

/// Wraps a value with a possible semaphore error.
pub type Result<T> = core::result::Result<T, Error>;
