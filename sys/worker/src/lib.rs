// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Worker-hart dispatch loop: poll inbox, handle launch / abort /
//! log-level / trace / PMC-configure, call into user kernel code, and
//! return to firmware on completion or exception.
//!
//! `no_std` on the real target; plain `std` when built for the host, same
//! as `kern`. This crate is built against `kern::hw::Chip` rather than
//! its own copy of the hardware trait, so both halves of the message
//! fabric agree on wire layout by construction.

#![cfg_attr(target_os = "none", no_std)]

pub mod config;
pub mod dispatch;
pub mod kernel;
pub mod log;
pub mod mailbox;
pub mod trace;

pub use dispatch::{KernelContext, UserKernel, WorkerDispatch};
pub use kernel::KernelOutcome;
