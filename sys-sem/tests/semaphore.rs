// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

// Semaphore behavior against the host kernel.  Each check runs on both the user-mode semaphore
// and the kernel-only semaphore, since they promise the same interface.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration as StdDuration, Instant as StdInstant};

use rand::Rng;
use rand_pcg::Pcg32;
use sys_sem::kernel::{enter_user_mode, HostKernel, MemoryDomain, Partition, PartitionAttr};
use sys_sem::sys::{K_FOREVER, K_NO_WAIT};
use sys_sem::time::{Duration, Forever, NoWait};
use sys_sem::{CountingSemaphore, Error, KernelSemaphore, SysSem, UserSemaphore, SYS_SEM_MAX_LIMIT};

/// Run `check` once with each implementation, on a fresh kernel.
macro_rules! both {
    ($check:ident) => {{
        let kernel = HostKernel::new();
        $check(|count, limit| UserSemaphore::new(&kernel, count, limit));
        $check(|count, limit| KernelSemaphore::new(&kernel, count, limit));
    }};
    ($check:ident, with_kernel) => {{
        let kernel = HostKernel::new();
        $check(&kernel, |count, limit| UserSemaphore::new(&kernel, count, limit));
        $check(&kernel, |count, limit| KernelSemaphore::new(&kernel, count, limit));
    }};
}

fn scenario<S, F>(make: F)
where
    S: CountingSemaphore,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    let sem = make(2, 5).unwrap();
    assert_eq!(sem.count_get(), 2);
    assert_eq!(sem.limit(), 5);

    for expect in 3..=5 {
        sem.give().unwrap();
        assert_eq!(sem.count_get(), expect);
    }
    assert_eq!(sem.give(), Err(Error::LimitReached));
    assert_eq!(sem.count_get(), 5);

    for expect in (0..5).rev() {
        sem.take(NoWait).unwrap();
        assert_eq!(sem.count_get(), expect);
    }
    assert_eq!(sem.take(NoWait), Err(Error::Timeout));
    assert_eq!(sem.count_get(), 0);
}

#[test]
fn give_and_take_sequence() {
    both!(scenario);
}

fn bad_init<S, F>(make: F)
where
    S: CountingSemaphore + std::fmt::Debug,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    assert_eq!(make(5, 3).unwrap_err(), Error::InvalidArgument);
    assert_eq!(make(0, 0).unwrap_err(), Error::InvalidArgument);
    assert_eq!(make(0, SYS_SEM_MAX_LIMIT + 1).unwrap_err(), Error::InvalidArgument);
    assert!(make(SYS_SEM_MAX_LIMIT, SYS_SEM_MAX_LIMIT).is_ok());
}

#[test]
fn init_rejects_bad_arguments() {
    both!(bad_init);
}

fn round_trip<S, F>(make: F)
where
    S: CountingSemaphore,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    let sem = make(1, 3).unwrap();
    sem.give().unwrap();
    sem.take(Forever).unwrap();
    assert_eq!(sem.count_get(), 1);
    sem.give().unwrap();
    sem.take(K_FOREVER).unwrap();
    assert_eq!(sem.count_get(), 1);
}

#[test]
fn give_then_take_restores_count() {
    both!(round_trip);
}

fn no_wait_is_immediate<S, F>(make: F)
where
    S: CountingSemaphore,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    let sem = make(0, 1).unwrap();
    let start = StdInstant::now();
    assert_eq!(sem.take(NoWait), Err(Error::Timeout));
    assert_eq!(sem.take(K_NO_WAIT), Err(Error::Timeout));
    assert_eq!(sem.take(Duration::from_ticks(0)), Err(Error::Timeout));
    assert!(start.elapsed() < StdDuration::from_millis(50));
}

#[test]
fn no_wait_take_does_not_block() {
    both!(no_wait_is_immediate);
}

fn woken_by_give<S, F>(make: F)
where
    S: CountingSemaphore + Sync,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    let sem = make(0, 1).unwrap();
    let start = StdInstant::now();
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(StdDuration::from_millis(10));
            sem.give().unwrap();
        });
        sem.take(Duration::millis(100)).unwrap();
    });
    assert!(start.elapsed() < StdDuration::from_millis(100));
    assert_eq!(sem.count_get(), 0);
}

#[test]
fn bounded_take_succeeds_on_give() {
    both!(woken_by_give);
}

fn times_out<S, F>(make: F)
where
    S: CountingSemaphore,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    let sem = make(0, 1).unwrap();
    let start = StdInstant::now();
    assert_eq!(sem.take(Duration::millis(100)), Err(Error::Timeout));
    let elapsed = start.elapsed();
    assert!(elapsed >= StdDuration::from_millis(100), "returned early: {:?}", elapsed);
    // Generous, CI machines can be slow to reschedule.
    assert!(elapsed < StdDuration::from_millis(500), "returned late: {:?}", elapsed);
    assert_eq!(sem.count_get(), 0);
}

#[test]
fn bounded_take_times_out() {
    both!(times_out);
}

fn huge_timeouts_wait_for_give<S, F>(make: F)
where
    S: CountingSemaphore + Sync,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    let sem = make(0, 1).unwrap();
    // The first overflows the clock; the second is past half the tick range.
    for ticks in [u64::MAX, u64::MAX / 2 + 10] {
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(StdDuration::from_millis(50));
                sem.give().unwrap();
            });
            assert_eq!(sem.take(Duration::from_ticks(ticks)), Ok(()), "ticks: {}", ticks);
        });
    }
    assert_eq!(sem.count_get(), 0);
}

#[test]
fn huge_timeout_is_not_an_immediate_timeout() {
    both!(huge_timeouts_wait_for_give);
}

fn takes_until_instant<S, F>(kernel: &HostKernel, make: F)
where
    S: CountingSemaphore,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    let sem = make(0, 1).unwrap();

    let start = StdInstant::now();
    assert_eq!(sem.take(kernel.uptime() + Duration::millis(50)), Err(Error::Timeout));
    let elapsed = start.elapsed();
    assert!(elapsed >= StdDuration::from_millis(50), "returned early: {:?}", elapsed);
    assert!(elapsed < StdDuration::from_millis(500), "returned late: {:?}", elapsed);

    // An instant already behind us behaves like no wait.
    let past = kernel.uptime();
    thread::sleep(StdDuration::from_millis(1));
    let start = StdInstant::now();
    assert_eq!(sem.take(past), Err(Error::Timeout));
    assert!(start.elapsed() < StdDuration::from_millis(50));

    // But still takes a unit that is there.
    sem.give().unwrap();
    sem.take(past).unwrap();
    assert_eq!(sem.count_get(), 0);
}

#[test]
fn take_until_an_instant() {
    both!(takes_until_instant, with_kernel);
}

fn all_waiters_released<S, F>(make: F)
where
    S: CountingSemaphore + Sync,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    const WAITERS: u32 = 6;
    let sem = make(0, WAITERS).unwrap();
    thread::scope(|s| {
        for _ in 0..WAITERS {
            s.spawn(|| sem.take(Forever).unwrap());
        }
        for _ in 0..WAITERS {
            thread::sleep(StdDuration::from_millis(2));
            sem.give().unwrap();
        }
    });
    assert_eq!(sem.count_get(), 0);
}

#[test]
fn every_give_releases_a_waiter() {
    both!(all_waiters_released);
}

fn takers_and_giver<S, F>(make: F)
where
    S: CountingSemaphore + Sync,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    const TAKERS: u32 = 8;
    const GIVES: u32 = 6;
    const LIMIT: u32 = 4;

    let sem = make(0, LIMIT).unwrap();
    let taken = AtomicU32::new(0);
    let given = AtomicU32::new(0);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let sampler = s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                assert!(sem.count_get() <= LIMIT);
                thread::yield_now();
            }
        });

        let takers: Vec<_> = (0..TAKERS)
            .map(|_| {
                s.spawn(|| {
                    if sem.take(Duration::millis(500)).is_ok() {
                        taken.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        s.spawn(|| {
            let stop = StdInstant::now() + StdDuration::from_millis(400);
            while given.load(Ordering::SeqCst) < GIVES && StdInstant::now() < stop {
                match sem.give() {
                    Ok(()) => {
                        given.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(Error::LimitReached) => thread::yield_now(),
                    Err(e) => panic!("give failed: {:?}", e),
                }
            }
        })
        .join()
        .unwrap();

        for taker in takers {
            taker.join().unwrap();
        }
        done.store(true, Ordering::Release);
        sampler.join().unwrap();
    });

    let given = given.load(Ordering::SeqCst);
    let taken = taken.load(Ordering::SeqCst);
    assert_eq!(given, GIVES);
    assert_eq!(sem.count_get(), given - taken);
    assert_eq!(taken, GIVES);
}

#[test]
fn count_tracks_gives_and_takes() {
    both!(takers_and_giver);
}

fn random_stress<S, F>(make: F)
where
    S: CountingSemaphore + Sync,
    F: Fn(u32, u32) -> sys_sem::Result<S>,
{
    const THREADS: u64 = 6;
    const OPS: u32 = 2_000;
    const INITIAL: u32 = 3;
    const LIMIT: u32 = 5;

    let sem = make(INITIAL, LIMIT).unwrap();
    let gives = AtomicU32::new(0);
    let takes = AtomicU32::new(0);

    thread::scope(|s| {
        for id in 0..THREADS {
            let (sem, gives, takes) = (&sem, &gives, &takes);
            s.spawn(move || {
                let mut rng = Pcg32::new(0xcafe_f00d_d15e_a5e5, id);
                for _ in 0..OPS {
                    if rng.gen_bool(0.5) {
                        if sem.give().is_ok() {
                            gives.fetch_add(1, Ordering::SeqCst);
                        }
                    } else {
                        let ok = if rng.gen_bool(0.5) {
                            sem.take(NoWait).is_ok()
                        } else {
                            sem.take(Duration::micros(rng.gen_range(1..200))).is_ok()
                        };
                        if ok {
                            takes.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    assert!(sem.count_get() <= LIMIT);
                }
            });
        }
    });

    let expected = INITIAL + gives.load(Ordering::SeqCst) - takes.load(Ordering::SeqCst);
    assert_eq!(sem.count_get(), expected);
}

#[test]
fn randomized_stress_keeps_count_consistent() {
    both!(random_stress);
}

#[test]
fn uninitialized_semaphores_are_invalid() {
    let kernel = HostKernel::new();

    let user = UserSemaphore::uninit(&kernel);
    assert_eq!(user.give(), Err(Error::InvalidArgument));
    assert_eq!(user.take(NoWait), Err(Error::InvalidArgument));

    let ksem = KernelSemaphore::uninit(&kernel);
    assert_eq!(ksem.give(), Err(Error::InvalidArgument));
    assert_eq!(ksem.take(NoWait), Err(Error::InvalidArgument));
    assert_eq!(ksem.count_get(), 0);
}

#[test]
fn reinit_resets_count_and_limit() {
    let kernel = HostKernel::new();
    let mut sem = SysSem::new(&kernel, 3, 3).unwrap();
    sem.init(0, 1).unwrap();
    assert_eq!(sem.count_get(), 0);
    assert_eq!(sem.limit(), 1);
    sem.give().unwrap();
    assert_eq!(sem.give(), Err(Error::LimitReached));
}

#[test]
fn user_mode_needs_a_partition() {
    let kernel = HostKernel::new();
    let sem = UserSemaphore::new(&kernel, 1, 2).unwrap();
    let domain = Arc::new(MemoryDomain::new());

    enter_user_mode(domain.clone(), || {
        assert_eq!(sem.give(), Err(Error::AccessDenied));
        assert_eq!(sem.take(NoWait), Err(Error::AccessDenied));
        assert_eq!(sem.take(Duration::millis(10)), Err(Error::AccessDenied));
    });
    assert_eq!(sem.count_get(), 1);

    let rw = PartitionAttr::READ | PartitionAttr::WRITE;
    domain.add_partition(Partition::covering(&sem, rw)).unwrap();
    enter_user_mode(domain.clone(), || {
        sem.give().unwrap();
        sem.take(NoWait).unwrap();
        sem.take(NoWait).unwrap();
    });
    assert_eq!(sem.count_get(), 0);

    // Read access alone is not enough.
    let ro = Arc::new(MemoryDomain::new());
    ro.add_partition(Partition::covering(&sem, PartitionAttr::READ)).unwrap();
    enter_user_mode(ro, || {
        assert_eq!(sem.give(), Err(Error::AccessDenied));
    });
    assert_eq!(sem.count_get(), 0);
}

#[test]
fn user_and_supervisor_threads_share_a_semaphore() {
    let kernel = HostKernel::new();
    let sem = UserSemaphore::new(&kernel, 0, 1).unwrap();
    let domain = Arc::new(MemoryDomain::new());
    domain
        .add_partition(Partition::covering(&sem, PartitionAttr::READ | PartitionAttr::WRITE))
        .unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            enter_user_mode(domain.clone(), || sem.take(Duration::millis(500)).unwrap());
        });
        thread::sleep(StdDuration::from_millis(10));
        sem.give().unwrap();
    });
    assert_eq!(sem.count_get(), 0);
}
