// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Kernel-only semaphore
//!
//! This is a thin wrapper around the kernel's own semaphore object, for builds without user mode.
//! There is no fast path: every operation goes into the kernel, which takes its internal lock.
//! That is fine when there is no privilege boundary to avoid crossing.

use core::fmt;

use super::{check_init_args, CountingSemaphore};
use crate::error::Result;
use crate::kernel::{HostKernel, KernelSem};
use crate::time::Timeout;

/// A semaphore implemented entirely by the kernel.
pub struct KernelSemaphore<'k> {
    /// The kernel semaphore object.
    sem: KernelSem,
    kernel: &'k HostKernel,
}

impl<'k> KernelSemaphore<'k> {
    /// A semaphore that has not been initialized.
    pub const fn uninit(kernel: &'k HostKernel) -> Self {
        KernelSemaphore {
            sem: KernelSem::new(),
            kernel,
        }
    }

    /// Construct and initialize a semaphore.
    pub fn new(kernel: &'k HostKernel, initial_count: u32, limit: u32) -> Result<Self> {
        let mut sem = Self::uninit(kernel);
        sem.init(initial_count, limit)?;
        Ok(sem)
    }
}

impl CountingSemaphore for KernelSemaphore<'_> {
    fn init(&mut self, initial_count: u32, limit: u32) -> Result<()> {
        check_init_args(initial_count, limit)?;
        self.kernel.sem_init(&mut self.sem, initial_count, limit);
        Ok(())
    }

    fn give(&self) -> Result<()> {
        self.kernel.sem_give(&self.sem)
    }

    fn take<T>(&self, timeout: T) -> Result<()>
    where
        T: Into<Timeout>,
    {
        self.kernel.sem_take(&self.sem, timeout.into())
    }

    fn count_get(&self) -> u32 {
        self.kernel.sem_count_get(&self.sem)
    }

    fn limit(&self) -> u32 {
        self.sem.limit()
    }
}

impl fmt::Debug for KernelSemaphore<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sys::KernelSemaphore {:?}", self.sem)
    }
}
