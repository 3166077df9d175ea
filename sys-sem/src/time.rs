// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Time types for semaphore timeouts.
//!
//! Time is counted in ticks of the kernel's monotonic clock.  On the host kernel a tick is one
//! microsecond.  [`Duration`] and [`Instant`] are [`fugit`] types over that tick rate, so the usual
//! constructors (`Duration::millis(10)`, `Duration::secs(1)`) are available.
//!
//! Operations that may block take anything that is `Into<Timeout>`:
//!
//! - [`NoWait`]: don't block at all, fail immediately if the operation can't be done.
//! - [`Forever`]: block as long as needed.
//! - a [`Duration`]: block for at most this long, measured from the call.
//! - an [`Instant`]: block until at most this point in uptime.

/// The type used to count ticks.
pub type Tick = u64;

/// The frequency of the kernel clock, in ticks per second.
pub const SYS_FREQUENCY: u32 = 1_000_000;

/// A duration of time, in ticks.
pub type Duration = fugit::Duration<Tick, 1, SYS_FREQUENCY>;

/// A point in uptime, in ticks since the kernel started.
pub type Instant = fugit::Instant<Tick, 1, SYS_FREQUENCY>;

/// How long a blocking operation may wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// Do not wait.
    NoWait,
    /// Wait as long as needed.
    Forever,
    /// Wait for at most this duration, relative to when the wait starts.
    After(Duration),
    /// Wait until at most this instant.
    Until(Instant),
}

/// A timeout that doesn't wait.
#[derive(Clone, Copy, Debug)]
pub struct NoWait;

/// A timeout that waits forever.
#[derive(Clone, Copy, Debug)]
pub struct Forever;

impl From<NoWait> for Timeout {
    fn from(_: NoWait) -> Timeout {
        Timeout::NoWait
    }
}

impl From<Forever> for Timeout {
    fn from(_: Forever) -> Timeout {
        Timeout::Forever
    }
}

impl From<Duration> for Timeout {
    fn from(value: Duration) -> Timeout {
        Timeout::After(value)
    }
}

impl From<Instant> for Timeout {
    fn from(value: Instant) -> Timeout {
        Timeout::Until(value)
    }
}

impl Timeout {
    /// True if this timeout never blocks.  A zero duration counts as not waiting.
    pub fn is_no_wait(self) -> bool {
        match self {
            Timeout::NoWait => true,
            Timeout::After(d) => d.ticks() == 0,
            _ => false,
        }
    }

    /// Convert to an absolute deadline, given the current uptime.
    ///
    /// Returns `None` for a timeout that never expires.
    pub fn deadline(self, now: Instant) -> Option<Instant> {
        match self {
            Timeout::NoWait => Some(now),
            Timeout::Forever => None,
            // A deadline past the end of the clock is as good as forever.
            Timeout::After(d) => now.ticks().checked_add(d.ticks()).map(Instant::from_ticks),
            Timeout::Until(at) => Some(at),
        }
    }

    /// Build the timeout that waits until `deadline`, or forever for `None`.
    pub fn from_deadline(deadline: Option<Instant>) -> Timeout {
        match deadline {
            Some(at) => Timeout::Until(at),
            None => Timeout::Forever,
        }
    }
}

/// Has `deadline` passed at `now`?
///
/// Uptime starts at zero and never wraps, so this compares raw ticks.  `Instant`'s own ordering
/// assumes wrapping, and gets deadlines more than half the tick range away backwards.
pub fn expired(deadline: Instant, now: Instant) -> bool {
    now.ticks() >= deadline.ticks()
}

/// Convert a tick duration into a `core::time::Duration`.
pub fn to_core(d: Duration) -> core::time::Duration {
    // Ticks are microseconds.
    core::time::Duration::from_micros(d.ticks())
}
