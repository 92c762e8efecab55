// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Master-side dispatch firmware: kernel launch / worker dispatch and
//! synchronization fabric for a many-core accelerator chip.
//!
//! `no_std` on the real target; plain `std` when built for the host, which
//! is what makes [`hw::sim`]'s backend usable from ordinary `#[test]`
//! functions without an emulator.

#![cfg_attr(target_os = "none", no_std)]

#[macro_use]
pub mod log;

pub mod config;
pub mod err;
pub mod fabric;
pub mod hostmb;
pub mod hw;
pub mod launch;
pub mod runtime;
pub mod shire;
pub mod sync;

pub use launch::{KernelResult, Launcher};
pub use runtime::Runtime;
