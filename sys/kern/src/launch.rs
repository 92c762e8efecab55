// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel launcher.
//!
//! Owns the fixed array of kernel slots and the [`crate::shire::ShireTracker`]
//! it drives. `kern::runtime::Runtime` is the only caller: it feeds host
//! requests and worker-originated completion/exception messages in here and
//! forwards the synchronous/asynchronous replies this module produces.

use core::convert::TryFrom;

use abi::{
    KernelId, KernelInfo, KernelParams, KernelResultStatus, KernelSlotState, Message,
    PublishedKernelSlot, ShireMask, ShireState, WorkerToMaster,
};
use unwrap_lite::UnwrapLite;

use crate::config;
use crate::err::{LaunchError, RuntimeError};
use crate::fabric;
use crate::hw::{CacheDest, CacheRegion, Chip};
use crate::shire::ShireTracker;

ringbuf::ringbuf!(LAUNCH_RINGBUF, LaunchEvent, 32, LaunchEvent::Init);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LaunchEvent {
    Init,
    LaunchRejected { kernel_id: u8, err: LaunchErrorKind },
    LaunchAccepted { kernel_id: u8, shire_mask: u64 },
    ShireComplete { kernel_id: u8, shire: u8, ok: bool },
    KernelComplete { kernel_id: u8, ok: bool },
    AbortRequested { kernel_id: u8 },
}

/// `Copy`-friendly mirror of [`LaunchError`] for ring-buffer storage (the
/// ring buffer entry type must be `PartialEq`; deriving that straight
/// through would be fine too, this just keeps the ring buffer payload
/// small and stable across `err.rs` edits).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LaunchErrorKind {
    SlotBusy,
    InvalidMask,
    ShiresNotReady,
    BroadcastFailed,
}

impl From<LaunchError> for LaunchErrorKind {
    fn from(e: LaunchError) -> Self {
        match e {
            LaunchError::SlotBusy => Self::SlotBusy,
            LaunchError::InvalidMask => Self::InvalidMask,
            LaunchError::ShiresNotReady => Self::ShiresNotReady,
            LaunchError::BroadcastFailed => Self::BroadcastFailed,
        }
    }
}

/// One kernel-launch slot, as tracked by the master.
#[derive(Copy, Clone, Debug)]
struct Slot {
    state: KernelSlotState,
    shire_mask: ShireMask,
    info: KernelInfo,
    params: KernelParams,
    num_shires: u32,
    /// Any shire reporting `Error` forces the kernel-wide result to
    /// `Error`.
    /// Accumulated here rather than re-derived at completion time, since
    /// shires return to `Idle` as each is observed complete.
    error_seen: bool,
}

impl Slot {
    const fn new() -> Self {
        Self {
            state: KernelSlotState::Unused,
            shire_mask: ShireMask::EMPTY,
            info: KernelInfo { compute_pc: 0, kernel_params_ptr: 0 },
            params: KernelParams::EMPTY,
            num_shires: 0,
            error_seen: false,
        }
    }
}

/// A result ready to report to the host via the asynchronous `KERNEL_RESULT`
/// message.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KernelResult {
    pub kernel_id: u8,
    pub status: KernelResultStatus,
}

pub struct Launcher {
    slots: [Slot; abi::MAX_SIMULTANEOUS_KERNELS],
    shires: ShireTracker,
}

impl Launcher {
    pub const fn new() -> Self {
        Self { slots: [Slot::new(); abi::MAX_SIMULTANEOUS_KERNELS], shires: ShireTracker::new() }
    }

    pub fn slot_state(&self, kernel_id: KernelId) -> KernelSlotState {
        self.slots[kernel_id.get() as usize].state
    }

    /// `shire_mask`/`num_shires` for a running slot, as the sync thread
    /// needs them (`kern::sync::SyncThread::poll`).
    pub fn slot_sync_params(&self, kernel_id: KernelId) -> (u64, u32) {
        let slot = &self.slots[kernel_id.get() as usize];
        (slot.shire_mask.raw(), slot.num_shires)
    }

    /// `launch_kernel`.
    ///
    /// Validates preconditions, publishes the slot, broadcasts the launch,
    /// and -- on success -- notifies the kernel's sync thread and moves the
    /// slot and its shires to `Running`. On any precondition failure,
    /// leaves all state untouched and returns the error to report
    /// synchronously to the host.
    pub fn launch_kernel<C: Chip>(
        &mut self,
        chip: &C,
        kernel_id: KernelId,
        shire_mask_raw: u64,
        compute_pc: u64,
        params: KernelParams,
    ) -> Result<(), LaunchError> {
        let result = self.try_launch(chip, kernel_id, shire_mask_raw, compute_pc, params);
        if let Err(e) = result {
            ringbuf::ringbuf_entry!(
                LAUNCH_RINGBUF,
                LaunchEvent::LaunchRejected { kernel_id: kernel_id.get(), err: e.into() }
            );
        }
        result
    }

    fn try_launch<C: Chip>(
        &mut self,
        chip: &C,
        kernel_id: KernelId,
        shire_mask_raw: u64,
        compute_pc: u64,
        params: KernelParams,
    ) -> Result<(), LaunchError> {
        let idx = kernel_id.get() as usize;

        if self.slots[idx].state != KernelSlotState::Unused {
            return Err(LaunchError::SlotBusy);
        }
        let shire_mask =
            ShireMask::try_from(shire_mask_raw).map_err(|_| LaunchError::InvalidMask)?;
        if shire_mask.is_empty() {
            return Err(LaunchError::InvalidMask);
        }
        if !self.shires.all_shires_ready(shire_mask) {
            return Err(LaunchError::ShiresNotReady);
        }

        let num_shires = shire_mask.popcount();
        // kernel_params_ptr is rewritten to point at this slot's own copy
        // so it is stable for workers reading through the coherence plane.
        let info = KernelInfo { compute_pc, kernel_params_ptr: slot_params_addr(kernel_id) };

        chip.kernel_slot_write(kernel_id.get(), PublishedKernelSlot { info, params });
        chip.evict_and_wait(CacheRegion::KernelSlot(kernel_id.get()), CacheDest::L3);

        let launch_msg: Message = abi::MasterToWorker::KernelLaunch {
            kernel_id: kernel_id.get(),
            compute_pc,
            kernel_params_ptr: info.kernel_params_ptr,
        }
        .into();
        fabric::multicast_send(chip, shire_mask, launch_msg)
            .map_err(|_| LaunchError::BroadcastFailed)?;

        // Notify the sync thread: FIRST_KERNEL_LAUNCH_SYNC_MINION +
        // kernel_id / 2, thread parity kernel_id & 1.
        let sync_minion = config::FIRST_KERNEL_LAUNCH_SYNC_MINION + (kernel_id.get() as u32) / 2;
        let sync_parity = (kernel_id.get() as u32) & 1;
        chip.fcc_send(abi::MASTER_SHIRE as u8, sync_parity as u8, config::SYNC_FCC_LAUNCH, 1 << sync_minion);

        self.slots[idx] = Slot {
            state: KernelSlotState::Running,
            shire_mask,
            info,
            params,
            num_shires,
            error_seen: false,
        };
        for shire in shire_mask.worker_shires_iter() {
            // `all_shires_ready` above already established every selected
            // shire is Idle, and Idle -> Running is always legal, so this
            // cannot fail.
            self.shires.update_shire_state(shire, ShireState::Running).unwrap_lite();
            self.shires.set_shire_kernel_id(shire, kernel_id.get());
        }

        ringbuf::ringbuf_entry!(
            LAUNCH_RINGBUF,
            LaunchEvent::LaunchAccepted { kernel_id: kernel_id.get(), shire_mask: shire_mask.raw() }
        );
        Ok(())
    }

    /// `abort_kernel`. A no-op on an already-`Unused` slot.
    pub fn abort_kernel<C: Chip>(&mut self, chip: &C, kernel_id: KernelId) -> Result<(), LaunchError> {
        let idx = kernel_id.get() as usize;
        if self.slots[idx].state == KernelSlotState::Unused {
            return Ok(());
        }
        ringbuf::ringbuf_entry!(LAUNCH_RINGBUF, LaunchEvent::AbortRequested { kernel_id: kernel_id.get() });
        fabric::multicast_send(
            chip,
            self.slots[idx].shire_mask,
            Message::new(abi::message::message_id::KERNEL_ABORT, [0; 7]),
        )
        .map_err(|_| LaunchError::BroadcastFailed)
    }

    /// Called by `kern::runtime::Runtime` once per worker
    /// completion/exception message, after it has identified which shire
    /// sent it (from the message's source hart), to drive the shire's own
    /// transition and check for whole-kernel completion. Returns a result
    /// to report asynchronously once the owning kernel's slot recycles to
    /// `Unused`.
    pub fn observe_shire_result<C: Chip>(
        &mut self,
        chip: &C,
        shire: u8,
        ok: bool,
    ) -> Result<Option<KernelResult>, RuntimeError> {
        let kernel_id = self
            .shires
            .get_shire_kernel_id(shire)
            .ok_or(RuntimeError::UnknownShireOrKernel)?;
        let idx = kernel_id as usize;

        let mut shire_had_error = !ok;

        // A faulting hart's fast-path exception report and its shire's
        // completion-barrier report are both sent for the same shire, and
        // the flag-word scan that feeds this function does not guarantee
        // which of the two a caller observes first. If the other one is
        // already pending, drain and fold it in now instead of finalizing
        // this shire on a single message: otherwise the shire can recycle
        // on whichever report happens to be seen first, and a still-pending
        // exception lands on an already-idle shire and gets dropped.
        while let Some((_, msg)) = fabric::poll_worker_messages_from_shire(chip, shire) {
            match WorkerToMaster::try_from(msg) {
                Ok(WorkerToMaster::Exception { .. }) => shire_had_error = true,
                Ok(WorkerToMaster::KernelComplete { ok: extra_ok, .. }) => {
                    shire_had_error |= !extra_ok;
                }
                _ => {}
            }
        }

        if shire_had_error {
            self.slots[idx].error_seen = true;
        }
        self.shires.update_shire_state(
            shire,
            if shire_had_error { ShireState::Error } else { ShireState::Complete },
        )?;
        ringbuf::ringbuf_entry!(
            LAUNCH_RINGBUF,
            LaunchEvent::ShireComplete { kernel_id, shire, ok: !shire_had_error }
        );

        // A shire moves straight back to Idle once observed, so
        // "all complete" becomes "every selected shire is Idle or
        // Complete and none remain Running."
        self.shires.update_shire_state(
            shire,
            ShireState::Idle,
        )?;

        let mask = self.slots[idx].shire_mask;
        let still_running = mask
            .worker_shires_iter()
            .any(|s| self.shires.state(s) == ShireState::Running);
        if still_running {
            return Ok(None);
        }

        let status =
            if self.slots[idx].error_seen { KernelResultStatus::Error } else { KernelResultStatus::Ok };
        self.slots[idx].state = KernelSlotState::Unused;
        self.slots[idx] = Slot::new();
        ringbuf::ringbuf_entry!(
            LAUNCH_RINGBUF,
            LaunchEvent::KernelComplete { kernel_id, ok: status == KernelResultStatus::Ok }
        );
        Ok(Some(KernelResult { kernel_id, status }))
    }
}

/// Symbolic address workers treat `kernel_params_ptr` as. The real chip
/// would derive this from the linker-provided kernel-slot region base;
/// this runtime never computes real addresses, so it uses the slot id
/// itself, matching how `CacheRegion::KernelSlot(u8)` already identifies
/// the region symbolically.
fn slot_params_addr(kernel_id: KernelId) -> u64 {
    kernel_id.get() as u64
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi::HartId;
    use crate::hw::sim::SimChip;

    fn kid(n: u8) -> KernelId {
        KernelId::new(n).unwrap()
    }

    #[test]
    fn happy_path_launch_moves_shires_to_running() {
        let chip = SimChip::new();
        let mut l = Launcher::new();
        l.launch_kernel(&chip, kid(0), 0b111, 0x1000, KernelParams::EMPTY).unwrap();
        assert_eq!(l.slot_state(kid(0)), KernelSlotState::Running);
        for shire in 0..3 {
            assert_eq!(l.shires.state(shire), ShireState::Running);
            assert_eq!(l.shires.get_shire_kernel_id(shire), Some(0));
        }
    }

    #[test]
    fn busy_slot_is_rejected_without_state_change() {
        let chip = SimChip::new();
        let mut l = Launcher::new();
        l.launch_kernel(&chip, kid(1), 0b1, 0x1000, KernelParams::EMPTY).unwrap();
        let err = l.launch_kernel(&chip, kid(1), 0b10, 0x2000, KernelParams::EMPTY).unwrap_err();
        assert_eq!(err, LaunchError::SlotBusy);
        assert_eq!(l.shires.state(1), ShireState::Idle);
    }

    #[test]
    fn shire_conflict_is_rejected() {
        let chip = SimChip::new();
        let mut l = Launcher::new();
        l.launch_kernel(&chip, kid(0), 0b11, 0x1000, KernelParams::EMPTY).unwrap();
        let err = l.launch_kernel(&chip, kid(1), 0b10, 0x2000, KernelParams::EMPTY).unwrap_err();
        assert_eq!(err, LaunchError::ShiresNotReady);
    }

    #[test]
    fn completion_recycles_slot_and_reports_ok() {
        let chip = SimChip::new();
        let mut l = Launcher::new();
        l.launch_kernel(&chip, kid(0), 0b11, 0x1000, KernelParams::EMPTY).unwrap();
        assert!(l.observe_shire_result(&chip, 0, true).unwrap().is_none());
        let result = l.observe_shire_result(&chip, 1, true).unwrap().unwrap();
        assert_eq!(result.kernel_id, 0);
        assert_eq!(result.status, KernelResultStatus::Ok);
        assert_eq!(l.slot_state(kid(0)), KernelSlotState::Unused);
    }

    #[test]
    fn any_shire_error_forces_kernel_error() {
        let chip = SimChip::new();
        let mut l = Launcher::new();
        l.launch_kernel(&chip, kid(0), 0b11, 0x1000, KernelParams::EMPTY).unwrap();
        l.observe_shire_result(&chip, 0, false).unwrap();
        let result = l.observe_shire_result(&chip, 1, true).unwrap().unwrap();
        assert_eq!(result.status, KernelResultStatus::Error);
    }

    #[test]
    fn exception_pending_behind_a_lower_hart_index_still_forces_kernel_error() {
        // Regression test for a shire that faults on one hart while its
        // other 63 (here, its only other hart) still reach the completion
        // barrier and report `ok`. Both worker->master messages are seeded
        // before the master ever polls, with the completing hart's bit
        // below the excepting hart's, so a scan that stops at the first set
        // bit would read the `KernelComplete{ok: true}` first and never see
        // the `Exception` at all without the same-shire drain.
        let chip = SimChip::new();
        let mut l = Launcher::new();
        l.launch_kernel(&chip, kid(0), 0b1, 0x1000, KernelParams::EMPTY).unwrap();

        let reporter = HartId::from_parts(0, 0, 1);
        let excepter = HartId::from_parts(0, 0, 2);
        chip.w2m_buffer_write(
            reporter,
            WorkerToMaster::KernelComplete { kernel_id: 0, ok: true }.into(),
        );
        chip.flag_or(0, reporter.hart_in_shire());
        chip.w2m_buffer_write(
            excepter,
            WorkerToMaster::Exception { kernel_id: 0, fault_code: 7 }.into(),
        );
        chip.flag_or(0, excepter.hart_in_shire());

        let (hart, msg) = fabric::poll_worker_messages(&chip).unwrap();
        assert_eq!(hart, reporter);
        let (shire, ok) = match WorkerToMaster::try_from(msg).unwrap() {
            WorkerToMaster::KernelComplete { ok, .. } => (hart.shire_id(), ok),
            WorkerToMaster::Exception { .. } => (hart.shire_id(), false),
            WorkerToMaster::LogWrite { .. } => unreachable!(),
        };

        let result = l.observe_shire_result(&chip, shire, ok).unwrap().unwrap();
        assert_eq!(result.status, KernelResultStatus::Error);
        assert_eq!(chip.flag_read(0), 0);
    }

    #[test]
    fn abort_on_unused_slot_is_a_no_op() {
        let chip = SimChip::new();
        let mut l = Launcher::new();
        assert!(l.abort_kernel(&chip, kid(0)).is_ok());
    }
}
