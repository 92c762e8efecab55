// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-kernel-slot sync thread.
//!
//! One long-lived helper hart is dedicated per kernel slot. Its loop is
//! "block on launch FCC, invalidate slot copy, block on N ready FCCs,
//! broadcast GO, repeat" -- modeled here as an explicit state machine
//! rather than a blocking loop, so this crate can drive it from an
//! ordinary `poll` call instead of pinning a real hart to it.
//! `kern::runtime` calls `poll` once per kernel slot on
//! every pass of the master's event loop, passing the slot's current
//! `shire_mask`/`num_shires` from its own record -- the sync thread is a
//! master-side helper and reads the launcher's bookkeeping directly rather
//! than re-deriving it from the (worker-facing) published slot.

use crate::config;
use crate::hw::{CacheDest, CacheRegion, Chip};

/// The sync thread's state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncThread {
    /// Waiting for the launcher's `SYNC_FCC_LAUNCH` notification.
    WaitLaunch,
    /// Launch observed; waiting for `remaining` more `SYNC_FCC_READY`
    /// signals, one per selected shire.
    WaitReady { remaining: u32 },
}

impl SyncThread {
    pub const fn new() -> Self {
        Self::WaitLaunch
    }

    /// Minion/thread this sync thread runs on, for FCC addressing.
    fn hart(kernel_id: u8) -> abi::HartId {
        let minion = config::FIRST_KERNEL_LAUNCH_SYNC_MINION + (kernel_id as u32) / 2;
        let thread = (kernel_id as u32) % 2;
        let hart_in_shire = (minion * 2 + thread) as u8;
        abi::HartId::from_parts(abi::MASTER_SHIRE as u8, hart_in_shire >> 4, hart_in_shire & 0b1111)
    }

    /// Advances the state machine against `chip`. `shire_mask`/`num_shires`
    /// are only consulted while transitioning out of `WaitLaunch`, the
    /// moment the launcher's publication becomes relevant. Returns `true`
    /// exactly on the poll that issues the GO broadcast releasing the
    /// shires.
    pub fn poll<C: Chip>(
        &mut self,
        chip: &C,
        kernel_id: u8,
        shire_mask: u64,
        num_shires: u32,
    ) -> bool {
        match *self {
            Self::WaitLaunch => {
                if chip.fcc_read(Self::hart(kernel_id), config::SYNC_FCC_LAUNCH) == 0 {
                    return false;
                }
                chip.fcc_wait(Self::hart(kernel_id), config::SYNC_FCC_LAUNCH);
                chip.evict_and_wait(CacheRegion::KernelSlot(kernel_id), CacheDest::L3);
                if num_shires == 0 {
                    return self.fire_go(chip, shire_mask);
                }
                *self = Self::WaitReady { remaining: num_shires };
                false
            }
            Self::WaitReady { remaining } => {
                if remaining == 0 {
                    return self.fire_go(chip, shire_mask);
                }
                if chip.fcc_read(Self::hart(kernel_id), config::SYNC_FCC_READY) == 0 {
                    return false;
                }
                chip.fcc_wait(Self::hart(kernel_id), config::SYNC_FCC_READY);
                let remaining = remaining - 1;
                if remaining == 0 {
                    self.fire_go(chip, shire_mask)
                } else {
                    *self = Self::WaitReady { remaining };
                    false
                }
            }
        }
    }

    fn fire_go<C: Chip>(&mut self, chip: &C, shire_mask: u64) -> bool {
        // Broadcast to both thread parities so every hart in the shire,
        // not just one per minion, is released.
        for parity in 0..2u8 {
            for shire in 0..abi::NUM_WORKER_SHIRES as u8 {
                if shire_mask & (1u64 << shire) != 0 {
                    chip.fcc_send(shire, parity, config::SYNC_FCC_READY, u32::MAX);
                }
            }
        }
        *self = Self::WaitLaunch;
        true
    }
}

impl Default for SyncThread {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::sim::SimChip;

    fn sync_hart() -> abi::HartId {
        SyncThread::hart(0)
    }

    fn signal(chip: &SimChip, fcc_id: u8) {
        let hart = sync_hart();
        chip.fcc_send(hart.shire_id(), hart.thread_id(), fcc_id, 1 << hart.minion_id());
    }

    #[test]
    fn releases_only_after_all_shires_report_ready() {
        let chip = SimChip::new();
        let mut st = SyncThread::new();
        assert!(!st.poll(&chip, 0, 0b101, 2));

        signal(&chip, config::SYNC_FCC_LAUNCH);
        assert!(!st.poll(&chip, 0, 0b101, 2));
        assert_eq!(st, SyncThread::WaitReady { remaining: 2 });

        signal(&chip, config::SYNC_FCC_READY);
        assert!(!st.poll(&chip, 0, 0b101, 2));
        signal(&chip, config::SYNC_FCC_READY);
        assert!(st.poll(&chip, 0, 0b101, 2));
        assert_eq!(st, SyncThread::WaitLaunch);
    }

    #[test]
    fn zero_shires_fires_go_immediately() {
        let chip = SimChip::new();
        let mut st = SyncThread::new();
        signal(&chip, config::SYNC_FCC_LAUNCH);
        assert!(st.poll(&chip, 0, 0, 0));
    }
}
