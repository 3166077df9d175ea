// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! The 'sys' module.
//!
//! This module contains the semaphore itself, in [`sync`], along with the low-level timeout
//! constants.  Everything here works the same whether the caller is a kernel thread or a user-mode
//! thread.

use crate::time::Timeout;

pub mod sync;

/// Represents a timeout with an infinite delay.
///
/// Calls using this value will wait as long as necessary to perform the requested operation.
pub const K_FOREVER: Timeout = Timeout::Forever;

/// Represents a null timeout delay.
///
/// Calls using this value will not wait if the operation cannot be performed immediately.
pub const K_NO_WAIT: Timeout = Timeout::NoWait;
