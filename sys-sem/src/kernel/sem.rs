// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! The kernel's own counting semaphore.
//!
//! This is the object behind [`KernelSemaphore`].  Its state is only touched by the kernel, under
//! the object's lock, and blocked takers sleep on the object's condition variable.
//!
//! [`KernelSemaphore`]: crate::sys::sync::KernelSemaphore

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant as StdInstant;

use core::fmt;

use log::trace;

use super::HostKernel;
use crate::error::{Error, Result};
use crate::time::Timeout;

#[derive(Debug)]
struct State {
    count: u32,
    /// Zero until initialized.
    limit: u32,
}

/// A kernel semaphore object.
pub struct KernelSem {
    state: Mutex<State>,
    cond: Condvar,
}

impl KernelSem {
    /// An uninitialized semaphore object.
    pub const fn new() -> KernelSem {
        KernelSem {
            state: Mutex::new(State { count: 0, limit: 0 }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The limit the object was initialized with.
    pub fn limit(&self) -> u32 {
        self.lock().limit
    }
}

impl Default for KernelSem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KernelSem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        write!(f, "KernelSem {{ count: {}, limit: {} }}", state.count, state.limit)
    }
}

impl HostKernel {
    /// Initialize a semaphore object.  The arguments have already been validated.
    pub fn sem_init(&self, sem: &mut KernelSem, initial_count: u32, limit: u32) {
        let state = sem.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.count = initial_count;
        state.limit = limit;
    }

    /// Give a semaphore object, waking one blocked taker.
    pub fn sem_give(&self, sem: &KernelSem) -> Result<()> {
        let mut state = sem.lock();
        if state.limit == 0 {
            return Err(Error::InvalidArgument);
        }
        if state.count == state.limit {
            return Err(Error::LimitReached);
        }
        state.count += 1;
        drop(state);

        sem.cond.notify_one();
        Ok(())
    }

    /// Take a semaphore object, blocking up to `timeout`.
    pub fn sem_take(&self, sem: &KernelSem, timeout: Timeout) -> Result<()> {
        let deadline = self.host_deadline(timeout);
        let mut state = sem.lock();
        if state.limit == 0 {
            return Err(Error::InvalidArgument);
        }

        loop {
            if state.count > 0 {
                state.count -= 1;
                return Ok(());
            }

            state = match deadline {
                None => sem.cond.wait(state).unwrap_or_else(PoisonError::into_inner),
                Some(at) => {
                    let now = StdInstant::now();
                    if now >= at {
                        trace!("ksem {:p}: take timed out", sem);
                        return Err(Error::Timeout);
                    }
                    sem.cond
                        .wait_timeout(state, at - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// The current count of a semaphore object.
    pub fn sem_count_get(&self, sem: &KernelSem) -> u32 {
        sem.lock().count
    }
}
