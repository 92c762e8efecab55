// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Top-level master-side runtime: owns every statically reserved region
//! this crate manages and is the single entry point the host mailbox
//! handler and the master's event loop call into.
//!
//! No hidden singletons: a typed value constructed once at reset that all
//! access goes through.

use abi::{
    HostEvent, HostRequest, HostResponse, KernelId, KernelParams, KernelResultStatus,
    LaunchResponse, WorkerToMaster,
};
use core::convert::TryFrom;
use unwrap_lite::UnwrapLite;

use crate::fabric;
use crate::hw::Chip;
use crate::launch::Launcher;
use crate::sync::SyncThread;

/// Constructed once at reset by `message_init_master`'s conceptual
/// equivalent; persists until the next reset.
pub struct Runtime<C: Chip> {
    chip: C,
    launcher: Launcher,
    sync_threads: [SyncThread; abi::MAX_SIMULTANEOUS_KERNELS],
    log_level: abi::LogLevel,
}

impl<C: Chip> Runtime<C> {
    pub const fn new(chip: C) -> Self {
        Self {
            chip,
            launcher: Launcher::new(),
            sync_threads: [SyncThread::new(); abi::MAX_SIMULTANEOUS_KERNELS],
            log_level: abi::LogLevel::DEFAULT,
        }
    }

    pub fn chip(&self) -> &C {
        &self.chip
    }

    /// Handles one synchronous host request, returning its synchronous
    /// reply. `KernelLaunch`'s async `KERNEL_RESULT` arrives later via
    /// [`Runtime::poll`].
    pub fn handle_host_request(&mut self, req: HostRequest) -> HostResponse {
        match req {
            HostRequest::ReflectTest => HostResponse::Reflect,
            HostRequest::DeviceFwVersion => HostResponse::FwVersion(abi::FwVersion {
                git_hash: 0,
                dirty: false,
            }),
            HostRequest::DeviceApiVersion { host_major: _ } => {
                // The device always reports its own version; the host
                // compares `major` itself (`ApiVersion::accepts`) to decide
                // whether to proceed.
                HostResponse::ApiVersion(abi::ApiVersion::CURRENT)
            }
            HostRequest::KernelLaunch { kernel_id, shire_mask, compute_pc, params } => {
                HostResponse::Launch(self.launch(kernel_id, shire_mask, compute_pc, params))
            }
            HostRequest::KernelAbort { kernel_id } => {
                let ok = match KernelId::new(kernel_id) {
                    Some(id) => self.launcher.abort_kernel(&self.chip, id).is_ok(),
                    None => false,
                };
                HostResponse::Abort { ok }
            }
            HostRequest::KernelState { kernel_id } => {
                let state = KernelId::new(kernel_id)
                    .map(|id| self.launcher.slot_state(id))
                    .unwrap_or(abi::KernelSlotState::Unused);
                HostResponse::KernelState(state)
            }
            HostRequest::SetMasterLogLevel { level } => {
                self.log_level = level;
                HostResponse::LogLevelAck
            }
            HostRequest::SetWorkerLogLevel { level } => {
                let _ = fabric::multicast_send(
                    &self.chip,
                    abi::ShireMask::from_raw(abi::ShireMask::ALL_BITS & !(1 << abi::MASTER_SHIRE)),
                    abi::MasterToWorker::SetLogLevel { level }.into(),
                );
                HostResponse::LogLevelAck
            }
        }
    }

    fn launch(
        &mut self,
        kernel_id: u8,
        shire_mask: u64,
        compute_pc: u64,
        params: KernelParams,
    ) -> LaunchResponse {
        let Some(id) = KernelId::new(kernel_id) else {
            return LaunchResponse::ErrorInvalidMask;
        };
        match self.launcher.launch_kernel(&self.chip, id, shire_mask, compute_pc, params) {
            Ok(()) => LaunchResponse::Ok,
            Err(e) => e.response(),
        }
    }

    /// Advances every sync thread and drains at most one worker-originated
    /// message. Called on every pass of the master's event loop; returns
    /// an event to emit to the host, if one became ready this pass.
    ///
    /// A single pass handles at most one of each kind of work so the
    /// caller's loop stays bounded and fair across kernel slots, matching
    /// how the real mailbox handler would rather poll everything once per
    /// iteration than starve on a single busy source.
    pub fn poll(&mut self) -> Option<HostEvent> {
        for kernel_id in 0..abi::MAX_SIMULTANEOUS_KERNELS as u8 {
            let id = KernelId::new(kernel_id).unwrap_lite();
            let (shire_mask, num_shires) = self.launcher.slot_sync_params(id);
            self.sync_threads[kernel_id as usize].poll(&self.chip, kernel_id, shire_mask, num_shires);
        }

        let (hart, msg) = fabric::poll_worker_messages(&self.chip)?;
        let parsed = match WorkerToMaster::try_from(msg) {
            Ok(m) => m,
            Err(_) => return None, // unknown message id: logged and dropped
        };

        let (shire, ok) = match parsed {
            WorkerToMaster::KernelComplete { ok, .. } => (hart.shire_id(), ok),
            WorkerToMaster::Exception { .. } => (hart.shire_id(), false),
            WorkerToMaster::LogWrite { .. } => return None,
        };

        match self.launcher.observe_shire_result(&self.chip, shire, ok) {
            Ok(Some(result)) => Some(HostEvent::KernelResult {
                kernel_id: result.kernel_id,
                status: result.status,
            }),
            Ok(None) => None,
            Err(e) => {
                klog!("firmware invariant violated: {:?}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::sim::SimChip;
    use abi::HartId;

    fn complete_shire<C: Chip>(chip: &C, shire: u8, kernel_id: u8, ok: bool) {
        let hart = HartId::from_parts(shire, 0, 0);
        chip.w2m_buffer_write(hart, abi::WorkerToMaster::KernelComplete { kernel_id, ok }.into());
        chip.flag_or(shire, hart.hart_in_shire());
    }

    #[test]
    fn happy_path_end_to_end() {
        let mut rt = Runtime::new(SimChip::new());
        let resp = rt.handle_host_request(HostRequest::KernelLaunch {
            kernel_id: 0,
            shire_mask: 0b111,
            compute_pc: 0x1000,
            params: KernelParams::EMPTY,
        });
        assert_eq!(resp, HostResponse::Launch(LaunchResponse::Ok));

        for shire in 0..3 {
            complete_shire(rt.chip(), shire, 0, true);
        }
        let mut events = vec![];
        for _ in 0..3 {
            if let Some(e) = rt.poll() {
                events.push(e);
            }
        }
        assert_eq!(
            events,
            vec![HostEvent::KernelResult { kernel_id: 0, status: KernelResultStatus::Ok }]
        );
        assert_eq!(
            rt.handle_host_request(HostRequest::KernelState { kernel_id: 0 }),
            HostResponse::KernelState(abi::KernelSlotState::Unused)
        );
    }

    #[test]
    fn busy_slot_rejected_synchronously() {
        let mut rt = Runtime::new(SimChip::new());
        rt.handle_host_request(HostRequest::KernelLaunch {
            kernel_id: 1,
            shire_mask: 0b1,
            compute_pc: 0,
            params: KernelParams::EMPTY,
        });
        let resp = rt.handle_host_request(HostRequest::KernelLaunch {
            kernel_id: 1,
            shire_mask: 0b10,
            compute_pc: 0,
            params: KernelParams::EMPTY,
        });
        assert_eq!(resp, HostResponse::Launch(LaunchResponse::ErrorSlotBusy));
    }

    #[test]
    fn abort_on_unused_kernel_succeeds() {
        let mut rt = Runtime::new(SimChip::new());
        let resp = rt.handle_host_request(HostRequest::KernelAbort { kernel_id: 0 });
        assert_eq!(resp, HostResponse::Abort { ok: true });
    }
}
