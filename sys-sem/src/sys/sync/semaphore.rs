// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! User-mode semaphore
//!
//! The count lives in a [`Futex`] in the caller's memory.  `give` and `take` update it with a
//! compare-and-swap loop, and that is all they do as long as there is no contention.  A `take`
//! that finds the count at zero parks on the kernel's [`WaitChannel`], keyed by the address of the
//! count, and a `give` that sees parked takers wakes one of them.
//!
//! A taker that is woken has no claim on any unit.  It goes back around the loop and competes for
//! the count like everyone else, which covers spurious wakeups, wakeups stolen by a fast-path
//! taker, and addresses that alias in the kernel's tables.

use core::fmt;
use core::mem::size_of;
use core::sync::atomic::Ordering;

use log::trace;

use super::futex::{Access, AccessCheck, Futex, WaitChannel, WaitOutcome};
use super::{check_init_args, CountingSemaphore};
use crate::error::{Error, Result};
use crate::time::{self, Timeout};

/// A counting semaphore usable from user mode.
///
/// `K` provides the kernel services: the wait channel, and the access check that the memory
/// protection hardware would otherwise perform.
pub struct UserSemaphore<'k, K: ?Sized> {
    futex: Futex,
    /// Maximum count.  Zero until initialized.
    limit: u32,
    kernel: &'k K,
}

impl<'k, K> UserSemaphore<'k, K>
where
    K: WaitChannel + AccessCheck + ?Sized,
{
    /// A semaphore that has not been initialized.
    ///
    /// All operations other than [`init`] fail with `InvalidArgument` until it is.
    ///
    /// [`init`]: CountingSemaphore::init
    pub const fn uninit(kernel: &'k K) -> Self {
        UserSemaphore {
            futex: Futex::new(0),
            limit: 0,
            kernel,
        }
    }

    /// Construct and initialize a semaphore.
    pub fn new(kernel: &'k K, initial_count: u32, limit: u32) -> Result<Self> {
        let mut sem = Self::uninit(kernel);
        sem.init(initial_count, limit)?;
        Ok(sem)
    }

    /// Check that this refers to a usable semaphore that the caller may touch.
    fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            trace!("sys_sem {:#x}: not initialized", self.futex.addr());
            return Err(Error::InvalidArgument);
        }
        self.kernel
            .check_access(self.futex.addr(), size_of::<Futex>(), Access::ReadWrite)
    }
}

impl<K> CountingSemaphore for UserSemaphore<'_, K>
where
    K: WaitChannel + AccessCheck + ?Sized,
{
    fn init(&mut self, initial_count: u32, limit: u32) -> Result<()> {
        check_init_args(initial_count, limit)?;
        self.futex.reset(initial_count);
        self.limit = limit;
        Ok(())
    }

    fn give(&self) -> Result<()> {
        self.validate()?;

        if self.futex.bounded_inc(self.limit).is_none() {
            return Err(Error::LimitReached);
        }

        // Pairs with `add_waiter` in take: either we see the waiter, or its wait sees the new
        // count and returns without sleeping.
        if self.futex.has_waiters() {
            let woken = self.kernel.wake(self.futex.value(), 1);
            trace!("sys_sem {:#x}: give woke {}", self.futex.addr(), woken);
        }
        Ok(())
    }

    fn take<T>(&self, timeout: T) -> Result<()>
    where
        T: Into<Timeout>,
    {
        self.validate()?;

        if self.futex.bounded_dec() {
            return Ok(());
        }

        let timeout: Timeout = timeout.into();
        if timeout.is_no_wait() {
            return Err(Error::Timeout);
        }

        // Fix the deadline once, so that repeated wakeups don't extend the wait.
        let deadline = timeout.deadline(self.kernel.uptime());
        loop {
            self.futex.add_waiter();
            let outcome = self
                .kernel
                .wait(self.futex.value(), 0, Timeout::from_deadline(deadline));
            self.futex.remove_waiter();

            if self.futex.bounded_dec() {
                return Ok(());
            }

            let expired = match outcome {
                WaitOutcome::TimedOut => true,
                WaitOutcome::Woken | WaitOutcome::ValueChanged => {
                    deadline.is_some_and(|at| time::expired(at, self.kernel.uptime()))
                }
            };
            if expired {
                trace!("sys_sem {:#x}: take timed out", self.futex.addr());
                return Err(Error::Timeout);
            }
        }
    }

    fn count_get(&self) -> u32 {
        self.futex.value().load(Ordering::Acquire)
    }

    fn limit(&self) -> u32 {
        self.limit
    }
}

impl<K: ?Sized> fmt::Debug for UserSemaphore<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sys::UserSemaphore {{ count: {}, limit: {} }}",
            self.futex.value().load(Ordering::Relaxed),
            self.limit
        )
    }
}
