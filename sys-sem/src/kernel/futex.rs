// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Address-keyed wait queues.
//!
//! Waiters are kept in a fixed number of buckets, chosen by hashing the address they wait on.
//! Each bucket has one lock, which serializes the value check in `wait` against `wake`, and one
//! condition variable that all of its waiters sleep on.  A waker marks the entries it chooses as
//! woken and then notifies everyone in the bucket; each thread checks only its own entry.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant as StdInstant;
use std::vec::Vec;

use core::sync::atomic::Ordering;

use log::trace;

use crate::sync::atomic::{AtomicU32, AtomicU64};
use crate::sys::sync::WaitOutcome;

/// Number of hash buckets.  Distinct addresses may share one.
const FUTEX_BUCKETS: usize = 16;

struct Waiter {
    /// Address waited on.
    key: usize,
    /// Identifies the waiting thread's entry.
    ticket: u64,
    woken: bool,
}

struct Bucket {
    queue: Mutex<Vec<Waiter>>,
    cond: Condvar,
}

impl Bucket {
    const fn new() -> Bucket {
        Bucket {
            queue: Mutex::new(Vec::new()),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Waiter>> {
        // A waiter never panics while holding the lock, but don't compound a panic elsewhere.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(super) struct FutexTable {
    buckets: [Bucket; FUTEX_BUCKETS],
    next_ticket: AtomicU64,
}

impl FutexTable {
    pub(super) fn new() -> FutexTable {
        FutexTable {
            buckets: core::array::from_fn(|_| Bucket::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    fn key(cell: &AtomicU32) -> usize {
        cell as *const AtomicU32 as usize
    }

    fn bucket(&self, key: usize) -> &Bucket {
        // Cells are at least 4-byte aligned, so the low bits carry nothing.
        let hash = (key >> 2) ^ (key >> 9);
        &self.buckets[hash % FUTEX_BUCKETS]
    }

    pub(super) fn wait(
        &self,
        cell: &AtomicU32,
        expected: u32,
        deadline: Option<StdInstant>,
    ) -> WaitOutcome {
        let key = Self::key(cell);
        let bucket = self.bucket(key);
        let mut queue = bucket.lock();

        if cell.load(Ordering::SeqCst) != expected {
            return WaitOutcome::ValueChanged;
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        queue.push(Waiter {
            key,
            ticket,
            woken: false,
        });
        trace!("futex {:#x}: parked ticket {}", key, ticket);

        loop {
            // Only this thread removes its own entry.
            let Some(pos) = queue.iter().position(|w| w.ticket == ticket) else {
                return WaitOutcome::Woken;
            };
            if queue[pos].woken {
                queue.remove(pos);
                return WaitOutcome::Woken;
            }

            queue = match deadline {
                None => bucket.cond.wait(queue).unwrap_or_else(PoisonError::into_inner),
                Some(at) => {
                    let now = StdInstant::now();
                    if now >= at {
                        queue.remove(pos);
                        trace!("futex {:#x}: ticket {} timed out", key, ticket);
                        return WaitOutcome::TimedOut;
                    }
                    bucket
                        .cond
                        .wait_timeout(queue, at - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    pub(super) fn wake(&self, cell: &AtomicU32, count: u32) -> u32 {
        let key = Self::key(cell);
        let bucket = self.bucket(key);
        let mut queue = bucket.lock();

        let mut woken = 0;
        for waiter in queue.iter_mut().filter(|w| w.key == key && !w.woken) {
            if woken == count {
                break;
            }
            waiter.woken = true;
            woken += 1;
        }
        drop(queue);

        if woken > 0 {
            bucket.cond.notify_all();
        }
        woken
    }
}
