// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Counting semaphores for user and kernel mode
//!
//! This crate provides `sys_sem`, a counting semaphore that can be used the same way from
//! privileged and unprivileged threads.  In an isolation-enabled build, the semaphore is a word of
//! shared memory updated with atomics, and only enters the kernel when a taker has to block or a
//! blocked taker has to be woken.  Otherwise, it is a thin wrapper around a kernel semaphore.
//!
//! ```
//! use sys_sem::{kernel::HostKernel, time::{Duration, NoWait}, CountingSemaphore, Error, SysSem};
//!
//! let kernel = HostKernel::new();
//! let sem = SysSem::new(&kernel, 0, 2).unwrap();
//!
//! sem.give().unwrap();
//! sem.give().unwrap();
//! assert_eq!(sem.give(), Err(Error::LimitReached));
//!
//! sem.take(NoWait).unwrap();
//! sem.take(Duration::millis(10)).unwrap();
//! assert_eq!(sem.take(NoWait), Err(Error::Timeout));
//! ```
//!
//! See [`sys::sync`] for the details, and [`kernel`] for the host kernel the semaphores run on
//! when built with `std`.

#![no_std]
#![deny(missing_docs)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod error;
pub mod logging;
pub mod sync;
pub mod sys;
pub mod time;

#[cfg(feature = "std")]
pub mod kernel;

pub use error::{Error, Result};

pub use logging::set_logger;

pub use sys::sync::{CountingSemaphore, UserSemaphore, SYS_SEM_MAX_LIMIT};

#[cfg(feature = "std")]
pub use sys::sync::{KernelSemaphore, SysSem};
