// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! # Counting semaphores usable from user and kernel mode.
//!
//! A `sys_sem` is a counting semaphore with both a lower bound (zero) and an upper bound (the
//! *limit*) on its count.  It lives in memory owned by the caller, which, in an isolation-enabled
//! build, may be memory shared between user-mode threads.
//!
//! There are two implementations of the [`CountingSemaphore`] interface:
//!
//! - [`UserSemaphore`]: the count is a single atomic word (see [`Futex`]).  Uncontended `give` and
//!   `take` are a compare-and-swap on that word and never enter the kernel.  Only a `take` that has
//!   to block, or a `give` that has to wake a blocked taker, calls into the kernel's
//!   [`WaitChannel`], keyed by the address of the word.
//! - [`KernelSemaphore`]: every operation goes to a kernel-only semaphore object.  This is what is
//!   used when there is no privilege boundary to economize across.
//!
//! The `userspace` feature selects which of these is [`SysSem`].  Both are always built, so code
//! that wants a particular implementation can name it directly.
//!
//! # Errors
//!
//! - `init` with a limit of zero, a limit above [`SYS_SEM_MAX_LIMIT`], or an initial count above
//!   the limit fails with [`Error::InvalidArgument`] and leaves the semaphore untouched.
//! - `give` at the limit fails with [`Error::LimitReached`].  This is ordinary backpressure.
//! - `take` that can't get a unit in time fails with [`Error::Timeout`].
//! - Operations on a semaphore that was never initialized fail with [`Error::InvalidArgument`].
//! - In isolation builds, a user-mode caller without read/write access to the semaphore gets
//!   [`Error::AccessDenied`].
//!
//! A failed operation never changes the count.
//!
//! # Fairness
//!
//! Nothing is promised about which blocked taker a `give` wakes.  Each `give` wakes at least one
//! waiter if any are blocked, and every woken waiter re-checks the count.
//!
//! [`Error::InvalidArgument`]: crate::Error::InvalidArgument
//! [`Error::LimitReached`]: crate::Error::LimitReached
//! [`Error::Timeout`]: crate::Error::Timeout
//! [`Error::AccessDenied`]: crate::Error::AccessDenied

use log::debug;

use crate::error::{Error, Result};
use crate::time::Timeout;

mod futex;
mod semaphore;
#[cfg(feature = "std")]
mod fallback;

pub use futex::{Access, AccessCheck, Futex, WaitChannel, WaitOutcome};
pub use semaphore::UserSemaphore;
#[cfg(feature = "std")]
pub use fallback::KernelSemaphore;

/// The largest limit a semaphore may be given.
pub const SYS_SEM_MAX_LIMIT: u32 = i32::MAX as u32;

/// The operations common to both semaphore implementations.
pub trait CountingSemaphore {
    /// Initialize the semaphore with the given count and limit.
    ///
    /// The `limit` must be in `(0, SYS_SEM_MAX_LIMIT]` and `initial_count` must not exceed it.
    /// Taking `&mut self` guarantees that nothing is blocked on the semaphore while it is being
    /// reinitialized.
    fn init(&mut self, initial_count: u32, limit: u32) -> Result<()>;

    /// Give the semaphore.
    ///
    /// Increments the count, unless the semaphore is already at its limit, in which case this
    /// returns [`Error::LimitReached`] and does nothing.
    fn give(&self) -> Result<()>;

    /// Take the semaphore.
    ///
    /// Decrements the count, waiting according to `timeout` for the count to become non-zero.
    /// With [`NoWait`], this never blocks, and is usable from contexts that can't block.
    ///
    /// [`NoWait`]: crate::time::NoWait
    fn take<T>(&self, timeout: T) -> Result<()>
    where
        T: Into<Timeout>;

    /// Get the semaphore's current count.
    ///
    /// This is a snapshot, and may be stale by the time the caller looks at it.
    fn count_get(&self) -> u32;

    /// Get the semaphore's limit.  Zero for a semaphore that hasn't been initialized.
    fn limit(&self) -> u32;
}

/// Validate the arguments to `init`.
pub(crate) fn check_init_args(initial_count: u32, limit: u32) -> Result<()> {
    if limit == 0 || limit > SYS_SEM_MAX_LIMIT || initial_count > limit {
        debug!("sys_sem: rejecting init count:{} limit:{}", initial_count, limit);
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

cfg_if::cfg_if! {
    if #[cfg(all(feature = "std", feature = "userspace"))] {
        /// The semaphore for this build: atomic cell with the host kernel's wait channel.
        pub type SysSem<'k> = UserSemaphore<'k, crate::kernel::HostKernel>;
    } else if #[cfg(feature = "std")] {
        /// The semaphore for this build: delegates to the host kernel's semaphore.
        pub type SysSem<'k> = KernelSemaphore<'k>;
    }
}
