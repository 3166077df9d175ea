// Copyright (c) 2023 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Dining philosophers
//!
//! The dining philosophers problem is a simple example of cooperation between multiple threads.
//! Each fork is a `sys_sem` with a limit of one.  Build with `--features userspace` to run on the
//! user-mode semaphore instead of the kernel one.
//!
//! Usage: `philosophers [seconds]`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;

use log::info;
use sys_sem::kernel::HostKernel;
use sys_sem::time::{to_core, Duration, Tick};

use crate::semsync::semaphore_sync;

mod semsync;

/// How many philosophers.  There will be the same number of forks.
const NUM_PHIL: usize = 6;

/// The philosophers use a fork synchronization mechanism.  Essentially, this is 6 locks.
trait ForkSync: core::fmt::Debug + Sync {
    /// Take the given fork.  The are indexed the same as the philosopher index number.  This will
    /// block until the fork is released.
    fn take(&self, index: usize);

    /// Release the given fork.  Index is the same as take.
    fn release(&self, index: usize);
}

fn main() -> sys_sem::Result<()> {
    if let Err(e) = sys_sem::set_logger() {
        eprintln!("logger already set: {}", e);
    }

    let run_time = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .map(Duration::secs)
        .unwrap_or(Duration::secs(2));

    let kernel = HostKernel::new();
    let syncer = semaphore_sync(&kernel)?;
    let stats = Mutex::new(Stats::default());
    let stop = AtomicBool::new(false);

    info!("{} philosophers for {}s", NUM_PHIL, run_time.to_secs());

    thread::scope(|s| {
        for n in 0..NUM_PHIL {
            let (kernel, syncer, stats, stop) = (&kernel, &syncer, &stats, &stop);
            s.spawn(move || phil_thread(n, kernel, syncer, stats, stop));
        }

        thread::sleep(to_core(run_time));
        stop.store(true, Ordering::Relaxed);
    });

    stats.lock().unwrap().show();
    Ok(())
}

fn phil_thread(
    n: usize,
    kernel: &HostKernel,
    syncer: &dyn ForkSync,
    stats: &Mutex<Stats>,
    stop: &AtomicBool,
) {
    info!("Child {} started: {:?}", n, syncer);

    // Determine our two forks.
    let forks = if n == NUM_PHIL - 1 {
        // Per Dijkstra, the last phyilosopher needs to reverse forks, or we deadlock.
        (0, n)
    } else {
        (n, n + 1)
    };

    while !stop.load(Ordering::Relaxed) {
        syncer.take(forks.0);
        syncer.take(forks.1);

        let delay = get_random_delay(kernel, n, 1);
        thread::sleep(to_core(delay));
        stats.lock().unwrap().record_eat(n, delay);

        // Release the forks.
        syncer.release(forks.1);
        syncer.release(forks.0);

        let delay = get_random_delay(kernel, n, 1);
        thread::sleep(to_core(delay));
        stats.lock().unwrap().record_think(n, delay);
    }
}

/// Get a random delay, based on the ID of this user, and the current uptime.
fn get_random_delay(kernel: &HostKernel, id: usize, period: usize) -> Duration {
    let tick = kernel.uptime().ticks() as usize;
    let delay = (tick / 100 * (id + 1)) & 0x1f;

    // Use one greater to be sure to never get a delay of zero.
    Duration::millis(((delay + 1) * period) as Tick)
}

/// Instead of just printint out so much information that the data just scolls by, gather
/// statistics.
#[derive(Default)]
struct Stats {
    /// How many times each philosopher has gone through the loop.
    count: [u64; NUM_PHIL],
    /// How much time each philosopher has spent eating.
    eating: [u64; NUM_PHIL],
    /// How much time each philosopher has spent thinking.
    thinking: [u64; NUM_PHIL],
}

impl Stats {
    fn record_eat(&mut self, index: usize, time: Duration) {
        self.eating[index] += time.to_millis();
    }

    fn record_think(&mut self, index: usize, time: Duration) {
        self.thinking[index] += time.to_millis();
        self.count[index] += 1;
    }

    fn show(&self) {
        info!("c:{:?}, e:{:?}, t:{:?}", self.count, self.eating, self.thinking);
    }
}
