// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! The shared counter word, and the kernel services it relies on.
//!
//! A [`Futex`] is the only state a [`UserSemaphore`] shares between threads.  The kernel side is
//! reached through two traits, so that a semaphore can be pointed at the real kernel, the host
//! kernel, or a test double:
//!
//! - [`WaitChannel`]: park on, and wake, an address.
//! - [`AccessCheck`]: the memory-protection check for the calling thread.
//!
//! [`UserSemaphore`]: super::UserSemaphore

use core::sync::atomic::Ordering;

use crate::error::Result;
use crate::sync::atomic::AtomicU32;
use crate::time::{Instant, Timeout};

/// Why a [`WaitChannel::wait`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Another thread called `wake` on the address.
    Woken,
    /// The word did not hold the expected value, so the caller never slept.
    ValueChanged,
    /// The timeout elapsed.
    TimedOut,
}

/// The kernel's address-keyed wait queue.
///
/// Wakeups are a hint, not a promise: a caller must always re-check its condition after `wait`
/// returns, whatever the outcome.
pub trait WaitChannel {
    /// Block until `cell` is woken, or the timeout elapses.
    ///
    /// If `cell` does not hold `expected`, return [`WaitOutcome::ValueChanged`] immediately.  The
    /// comparison must be sequentially consistent, and atomic with respect to [`wake`] on the
    /// same address.
    ///
    /// [`wake`]: WaitChannel::wake
    fn wait(&self, cell: &AtomicU32, expected: u32, timeout: Timeout) -> WaitOutcome;

    /// Wake up to `count` threads blocked in [`wait`] on `cell`.  Returns how many were woken.
    ///
    /// [`wait`]: WaitChannel::wait
    fn wake(&self, cell: &AtomicU32, count: u32) -> u32;

    /// The kernel's monotonic clock.
    fn uptime(&self) -> Instant;
}

/// The kind of access being checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Read only.
    Read,
    /// Read and write.
    ReadWrite,
}

/// The memory-protection check for the calling thread.
pub trait AccessCheck {
    /// Check that the calling thread may access `len` bytes at `addr`.
    ///
    /// Returns [`Error::AccessDenied`] if not.
    ///
    /// [`Error::AccessDenied`]: crate::Error::AccessDenied
    fn check_access(&self, addr: usize, len: usize, access: Access) -> Result<()>;
}

/// The atomic counter cell of a semaphore.
///
/// `val` is the count itself, and its address is the key for the wait channel.  `waiters` counts
/// threads that are in, or about to enter, [`WaitChannel::wait`] on `val`; a giver only calls into
/// the kernel when this is non-zero.
#[derive(Debug)]
pub struct Futex {
    val: AtomicU32,
    waiters: AtomicU32,
}

impl Futex {
    /// A cell holding `val`, with no waiters.
    pub const fn new(val: u32) -> Futex {
        Futex {
            val: AtomicU32::new(val),
            waiters: AtomicU32::new(0),
        }
    }

    /// The count word.  Its address is the wait channel key.
    pub fn value(&self) -> &AtomicU32 {
        &self.val
    }

    /// Set the count, and clear the wait state.
    pub fn reset(&mut self, val: u32) {
        *self.val.get_mut() = val;
        *self.waiters.get_mut() = 0;
    }

    /// Address of the cell, for the access check.
    pub fn addr(&self) -> usize {
        self as *const Futex as usize
    }

    /// Increment the count, unless it is already at `limit`.
    ///
    /// Returns the previous count, or `None` if at the limit.
    pub(crate) fn bounded_inc(&self, limit: u32) -> Option<u32> {
        let mut old = self.val.load(Ordering::Relaxed);
        loop {
            if old >= limit {
                return None;
            }
            match self.val.compare_exchange_weak(old, old + 1, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return Some(old),
                Err(current) => old = current,
            }
        }
    }

    /// Decrement the count, unless it is zero.  Returns whether a unit was taken.
    pub(crate) fn bounded_dec(&self) -> bool {
        let mut old = self.val.load(Ordering::Relaxed);
        loop {
            if old == 0 {
                return false;
            }
            match self.val.compare_exchange_weak(old, old - 1, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(current) => old = current,
            }
        }
    }

    /// Announce that the caller is about to wait.
    pub(crate) fn add_waiter(&self) {
        self.waiters.fetch_add(1, Ordering::SeqCst);
    }

    /// Undo [`add_waiter`](Self::add_waiter).
    pub(crate) fn remove_waiter(&self) {
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }

    /// Are there threads that may be blocked on this cell?
    pub(crate) fn has_waiters(&self) -> bool {
        self.waiters.load(Ordering::SeqCst) != 0
    }
}
