// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! # Host kernel
//!
//! The semaphore needs three things from a kernel: a way to park a thread on an address and wake
//! it again, a monotonic clock, and (for user mode) a check that the calling thread may touch the
//! semaphore's memory.  Builds without user mode also need the kernel's own semaphore object.
//!
//! [`HostKernel`] provides all of these on top of operating system threads, so that semaphores can
//! be used and tested off target.
//!
//! - Parking is a table of wait queues, hashed by address.  See [`WaitChannel`].
//! - The clock counts microseconds from when the kernel was created.
//! - Memory protection is per thread.  A thread is a supervisor thread, with access to everything,
//!   until it enters user mode with [`enter_user_mode`], after which it can only access the
//!   partitions of its [`MemoryDomain`].
//!
//! [`WaitChannel`]: crate::sys::sync::WaitChannel

use std::time::Instant as StdInstant;

use log::debug;

use crate::error::Result;
use crate::sync::atomic::AtomicU32;
use crate::sys::sync::{Access, AccessCheck, WaitChannel, WaitOutcome};
use crate::time::{self, Duration, Instant, Timeout};

mod futex;
mod mem;
mod sem;

pub use mem::{current_domain, enter_user_mode, MemoryDomain, Partition, PartitionAttr};
pub use sem::KernelSem;

use futex::FutexTable;

/// The host kernel.
///
/// Usually there is one of these, shared by reference with every semaphore.
pub struct HostKernel {
    boot: StdInstant,
    futexes: FutexTable,
}

impl HostKernel {
    /// Start a new kernel.  Its uptime starts at zero.
    pub fn new() -> HostKernel {
        debug!("host kernel starting");
        HostKernel {
            boot: StdInstant::now(),
            futexes: FutexTable::new(),
        }
    }

    /// Time since the kernel started.
    pub fn uptime(&self) -> Instant {
        Instant::from_ticks(self.boot.elapsed().as_micros() as u64)
    }

    /// Convert a timeout into a deadline on the host clock.  `None` never expires.
    fn host_deadline(&self, timeout: Timeout) -> Option<StdInstant> {
        // Round up a tick, since `uptime` truncates.
        timeout.deadline(self.uptime()).and_then(|at| {
            let since_boot = Duration::from_ticks(at.ticks().saturating_add(1));
            self.boot.checked_add(time::to_core(since_boot))
        })
    }
}

impl Default for HostKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitChannel for HostKernel {
    fn wait(&self, cell: &AtomicU32, expected: u32, timeout: Timeout) -> WaitOutcome {
        self.futexes.wait(cell, expected, self.host_deadline(timeout))
    }

    fn wake(&self, cell: &AtomicU32, count: u32) -> u32 {
        self.futexes.wake(cell, count)
    }

    fn uptime(&self) -> Instant {
        HostKernel::uptime(self)
    }
}

impl AccessCheck for HostKernel {
    fn check_access(&self, addr: usize, len: usize, access: Access) -> Result<()> {
        mem::check_current(addr, len, access)
    }
}
