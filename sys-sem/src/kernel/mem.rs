// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Memory domains for user-mode threads.
//!
//! A [`MemoryDomain`] is a set of [`Partition`]s, each a range of memory along with the access the
//! domain's threads have to it.  A thread entering user mode with [`enter_user_mode`] is bound to a
//! domain for the duration, and from then on may only access memory one of its partitions covers.
//! Threads that haven't entered user mode are supervisor threads and may access anything.
//!
//! Note that a partition that covers a semaphore grants access to it at whatever address it has
//! *now*.  Moving the semaphore afterwards leaves the partition behind.

use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use core::mem::size_of;

use bitflags::bitflags;
use log::debug;

use crate::error::{Error, Result};
use crate::sys::sync::Access;

bitflags! {
    /// Access granted by a partition.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PartitionAttr: u32 {
        /// Memory may be read.
        const READ = 1 << 0;
        /// Memory may be written.
        const WRITE = 1 << 1;
    }
}

impl From<Access> for PartitionAttr {
    fn from(access: Access) -> Self {
        match access {
            Access::Read => PartitionAttr::READ,
            Access::ReadWrite => PartitionAttr::READ | PartitionAttr::WRITE,
        }
    }
}

/// A range of memory, and the access allowed to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    /// First address of the partition.
    pub start: usize,
    /// Size in bytes.
    pub size: usize,
    /// Access allowed.
    pub attr: PartitionAttr,
}

impl Partition {
    /// A partition from a raw range.
    pub const fn new(start: usize, size: usize, attr: PartitionAttr) -> Partition {
        Partition { start, size, attr }
    }

    /// A partition covering exactly `obj`.
    pub fn covering<T>(obj: &T, attr: PartitionAttr) -> Partition {
        Partition::new(obj as *const T as usize, size_of::<T>(), attr)
    }

    fn end(&self) -> Option<usize> {
        self.start.checked_add(self.size)
    }

    fn contains(&self, addr: usize, len: usize) -> bool {
        match (self.end(), addr.checked_add(len)) {
            (Some(end), Some(last)) => addr >= self.start && last <= end,
            _ => false,
        }
    }

    fn overlaps(&self, other: &Partition) -> bool {
        match (self.end(), other.end()) {
            (Some(end), Some(other_end)) => self.start < other_end && other.start < end,
            _ => true,
        }
    }
}

/// A set of partitions shared by a group of user-mode threads.
#[derive(Debug, Default)]
pub struct MemoryDomain {
    partitions: Mutex<Vec<Partition>>,
}

impl MemoryDomain {
    /// An empty domain.  Its threads can access nothing.
    pub fn new() -> MemoryDomain {
        MemoryDomain::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Partition>> {
        self.partitions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a partition.
    ///
    /// Fails with `InvalidArgument` if the partition is empty, wraps the address space, or
    /// overlaps one already in the domain.
    pub fn add_partition(&self, part: Partition) -> Result<()> {
        if part.size == 0 || part.end().is_none() {
            return Err(Error::InvalidArgument);
        }
        let mut parts = self.lock();
        if parts.iter().any(|p| p.overlaps(&part)) {
            debug!("domain: partition {:x?} overlaps", part);
            return Err(Error::InvalidArgument);
        }
        parts.push(part);
        Ok(())
    }

    /// Remove a partition.  Fails with `InvalidArgument` if it isn't in the domain.
    pub fn remove_partition(&self, part: &Partition) -> Result<()> {
        let mut parts = self.lock();
        match parts.iter().position(|p| p == part) {
            Some(pos) => {
                parts.remove(pos);
                Ok(())
            }
            None => Err(Error::InvalidArgument),
        }
    }

    /// Can this domain's threads access `len` bytes at `addr` with all of `desired`?
    ///
    /// The whole range must lie within a single partition.
    #[must_use]
    pub fn can_access(&self, addr: usize, len: usize, desired: PartitionAttr) -> bool {
        self.lock()
            .iter()
            .any(|p| p.contains(addr, len) && p.attr.contains(desired))
    }
}

std::thread_local! {
    static CURRENT_DOMAIN: RefCell<Option<Arc<MemoryDomain>>> = const { RefCell::new(None) };
}

/// Run `f` on the current thread in user mode, bound to `domain`.
///
/// The thread returns to its previous mode when `f` returns, or unwinds.
pub fn enter_user_mode<R>(domain: Arc<MemoryDomain>, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<Arc<MemoryDomain>>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let prev = self.0.take();
            CURRENT_DOMAIN.with(|cur| *cur.borrow_mut() = prev);
        }
    }

    let prev = CURRENT_DOMAIN.with(|cur| cur.replace(Some(domain)));
    let _restore = Restore(prev);
    f()
}

/// The domain of the current thread, or `None` for a supervisor thread.
pub fn current_domain() -> Option<Arc<MemoryDomain>> {
    CURRENT_DOMAIN.with(|cur| cur.borrow().clone())
}

/// Check an access by the current thread.
pub(super) fn check_current(addr: usize, len: usize, access: Access) -> Result<()> {
    match current_domain() {
        None => Ok(()),
        Some(domain) if domain.can_access(addr, len, access.into()) => Ok(()),
        Some(_) => {
            debug!("access {:?} to {:#x}+{} denied", access, addr, len);
            Err(Error::AccessDenied)
        }
    }
}
