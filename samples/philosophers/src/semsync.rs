// Copyright (c) 2023 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Semaphore based sync.
//!
//! This is the simplest type of sync, which uses a single semaphore per fork.

use std::array;

use sys_sem::kernel::HostKernel;
use sys_sem::time::Forever;
use sys_sem::{CountingSemaphore, Result, SysSem};

use crate::{ForkSync, NUM_PHIL};

#[derive(Debug)]
pub struct SemSync<'k> {
    /// One semaphore per fork, with a limit of one.
    forks: [SysSem<'k>; NUM_PHIL],
}

impl ForkSync for SemSync<'_> {
    fn take(&self, index: usize) {
        // Can only fail on a bad semaphore, which these aren't.
        self.forks[index].take(Forever).unwrap();
    }

    fn release(&self, index: usize) {
        self.forks[index].give().unwrap();
    }
}

pub fn semaphore_sync(kernel: &HostKernel) -> Result<SemSync<'_>> {
    // Each fork starts out on the table.
    let mut forks: [SysSem<'_>; NUM_PHIL] = array::from_fn(|_| SysSem::uninit(kernel));
    for fork in forks.iter_mut() {
        fork.init(1, 1)?;
    }
    Ok(SemSync { forks })
}
