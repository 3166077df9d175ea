// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Synchronization support shared by the semaphore implementations.

pub mod atomic {
    //! Re-export portable atomic.
    //!
    //! Although `core` contains a
    //! [`sync::atomic`](https://doc.rust-lang.org/stable/core/sync/atomic/index.html) module,
    //! these are dependent on the target having atomic instructions, and the types are missing
    //! when the platform cannot support them.  Small embedded cores frequently lack a native
    //! compare-and-swap.  The [`portable-atomic`](https://crates.io/crates/portable-atomic) crate
    //! will either just re-export the types from core, or provide an implementation when those
    //! aren't available, so the counter cell builds everywhere.

    pub use portable_atomic::*;
}
