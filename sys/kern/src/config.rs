// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compile-time chip topology.
//!
//! Every constant here is re-exported from `abi` (shared with `worker`,
//! which needs the same topology to decompose its own hart id). This
//! module exists as the single place the rest of `kern` names them from,
//! rather than recomputing layout ad hoc at each call site.

pub use abi::{
    FIRST_KERNEL_LAUNCH_SYNC_MINION, HARTS_PER_SHIRE, MASTER_SHIRE, MAX_SIMULTANEOUS_KERNELS,
    MINIONS_PER_SHIRE, NUM_SHIRES, NUM_WORKER_SHIRES, SHIRE_COMPLETION_BARRIER_EXPECTED,
};

/// FCC id the launcher uses to wake a kernel's sync thread once its slot is
/// published.
pub const SYNC_FCC_LAUNCH: u8 = 0;

/// FCC id a shire's designated hart uses to report "all harts entered the
/// kernel" to the sync thread.
pub const SYNC_FCC_READY: u8 = 1;

/// FLB id workers use to elect the hart that reports per-shire completion
/// to the master.
pub const SHIRE_COMPLETION_BARRIER: u8 = 0;

/// Hart within the master shire that receives worker->master IPIs.
pub const MASTER_RECEIVER_HART_IN_SHIRE: u8 = 0;
