// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire and address-space types shared between the master-side dispatch
//! firmware (`kern`) and the worker-hart dispatch loop (`worker`).
//!
//! This crate carries no logic beyond small, total helper functions on the
//! types themselves (bit decomposition, transition legality, `TryFrom`
//! parsing of wire IDs). Everything stateful lives in `kern`/`worker`.

#![cfg_attr(not(test), no_std)]

pub mod hart;
pub mod host;
pub mod kernel;
pub mod log;
pub mod message;
pub mod syscall;

pub use hart::{HartId, ShireMask};
pub use host::{
    ApiVersion, FwVersion, HostEvent, HostHeader, HostMessageId, HostRequest, HostResponse,
    LaunchResponse, UnknownHostMessageId,
};
pub use kernel::{
    KernelId, KernelInfo, KernelParams, KernelResultStatus, KernelSlotState,
    PublishedKernelSlot, ShireState,
};
pub use log::LogLevel;
pub use message::{
    BroadcastBuffer, BroadcastHeader, CacheDest, MasterToWorker, Message, PmcCounterMask,
    UnknownMessageId, WorkerToMaster,
};
pub use syscall::Selector;

/// Number of worker shires (0..32). Shire 32 is the master shire.
pub const NUM_WORKER_SHIRES: u32 = 32;

/// The designated master shire. Not a worker shire.
pub const MASTER_SHIRE: u32 = 32;

/// Total number of shires, including the master shire.
pub const NUM_SHIRES: usize = 33;

/// Harts per shire (4 neighborhoods * 16 harts-in-neighborhood).
pub const HARTS_PER_SHIRE: u32 = 64;

/// Minions (two-hart cores) per shire.
pub const MINIONS_PER_SHIRE: u32 = HARTS_PER_SHIRE / 2;

/// Upper bound on kernels that may be in flight simultaneously.
pub const MAX_SIMULTANEOUS_KERNELS: usize = 4;

/// Minion index of the first kernel-launch sync-thread helper on the master
/// shire. Sync thread for `kernel_id` runs on minion
/// `FIRST_KERNEL_LAUNCH_SYNC_MINION + kernel_id / 2`, thread `kernel_id % 2`.
pub const FIRST_KERNEL_LAUNCH_SYNC_MINION: u32 = 16;

/// Number of harts in a shire that must report per-hart completion before a
/// shire's collective completion is reported: all harts but the one that
/// discovers it is last (and sends on behalf of the shire).
pub const SHIRE_COMPLETION_BARRIER_EXPECTED: u32 = MINIONS_PER_SHIRE * 2 - 1;
