// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel-slot and shire state machines, and the parameters a launch carries.

use core::convert::TryFrom;
use serde::{Deserialize, Serialize};

/// Identifies one of the `MAX_SIMULTANEOUS_KERNELS` launch slots.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct KernelId(u8);

impl KernelId {
    pub const fn new(raw: u8) -> Option<Self> {
        if (raw as usize) < crate::MAX_SIMULTANEOUS_KERNELS {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// The sync-thread minion this kernel's launch barrier runs on.
    pub const fn sync_minion(self) -> u32 {
        crate::FIRST_KERNEL_LAUNCH_SYNC_MINION + (self.0 as u32) / 2
    }

    /// The sync-thread thread index (0 or 1) this kernel's launch barrier
    /// runs on.
    pub const fn sync_thread(self) -> u32 {
        (self.0 as u32) % 2
    }
}

/// Lifecycle of one kernel-launch slot on the master.
///
/// `Unused -> Running -> {Complete, Error} -> Unused`. A slot only leaves
/// `Complete`/`Error` once the host has consumed the result via
/// `KERNEL_STATE`/`KERNEL_RESULT` and the master recycles it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum KernelSlotState {
    Unused,
    Running,
    Complete,
    Error,
}

impl KernelSlotState {
    /// `true` if `self -> next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unused, Self::Running)
                | (Self::Running, Self::Complete)
                | (Self::Running, Self::Error)
                | (Self::Complete, Self::Unused)
                | (Self::Error, Self::Unused)
        )
    }
}

/// Lifecycle of a single shire's participation in a kernel launch.
///
/// `Idle -> Running -> {Complete, Error} -> Idle`. `Ready` is part of the
/// wire vocabulary but is never produced by `update_shire_state`: shires
/// observe the broadcasted launch and move straight from `Idle` to
/// `Running` once the sync thread releases them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShireState {
    Idle,
    Ready,
    Running,
    Complete,
    Error,
}

impl ShireState {
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Complete)
                | (Self::Running, Self::Error)
                | (Self::Complete, Self::Idle)
                | (Self::Error, Self::Idle)
        )
    }
}

/// Static description of a kernel: its entry point and the location of its
/// parameter blob. Both are addresses in the worker's address space.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KernelInfo {
    pub compute_pc: u64,
    pub kernel_params_ptr: u64,
}

/// A fixed-size parameter blob handed to a launched kernel. Sized to one
/// cache line's worth of `u64`s, matching the payload carried by a single
/// broadcast message.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    pub words: [u64; 6],
}

impl KernelParams {
    pub const EMPTY: Self = Self { words: [0; 6] };
}

/// The record a launch publishes to the coherence plane: exactly what a
/// worker hart is allowed to read back out of a kernel slot. Slot *state*
/// (`KernelSlotState`, `shire_mask`, `num_shires`) is master-internal
/// bookkeeping and is never shared with workers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PublishedKernelSlot {
    pub info: KernelInfo,
    pub params: KernelParams,
}

impl PublishedKernelSlot {
    pub const EMPTY: Self = Self {
        info: KernelInfo { compute_pc: 0, kernel_params_ptr: 0 },
        params: KernelParams::EMPTY,
    };
}

/// Final disposition of a completed kernel, as reported in `KERNEL_RESULT`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum KernelResultStatus {
    Ok,
    Error,
}

impl KernelResultStatus {
    /// Merges a shire's result into the kernel-wide result: any shire
    /// reporting `Error` makes the whole kernel `Error`.
    pub const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Error, _) | (_, Self::Error) => Self::Error,
            (Self::Ok, Self::Ok) => Self::Ok,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InvalidKernelId(pub u8);

impl TryFrom<u8> for KernelId {
    type Error = InvalidKernelId;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(InvalidKernelId(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_id_bounds() {
        assert!(KernelId::new(0).is_some());
        assert!(KernelId::new(crate::MAX_SIMULTANEOUS_KERNELS as u8 - 1).is_some());
        assert!(KernelId::new(crate::MAX_SIMULTANEOUS_KERNELS as u8).is_none());
    }

    #[test]
    fn sync_thread_assignment_interleaves() {
        let k0 = KernelId::new(0).unwrap();
        let k1 = KernelId::new(1).unwrap();
        let k2 = KernelId::new(2).unwrap();
        assert_eq!(k0.sync_minion(), crate::FIRST_KERNEL_LAUNCH_SYNC_MINION);
        assert_eq!(k0.sync_thread(), 0);
        assert_eq!(k1.sync_minion(), crate::FIRST_KERNEL_LAUNCH_SYNC_MINION);
        assert_eq!(k1.sync_thread(), 1);
        assert_eq!(k2.sync_minion(), crate::FIRST_KERNEL_LAUNCH_SYNC_MINION + 1);
    }

    #[test]
    fn slot_state_legal_transitions() {
        assert!(KernelSlotState::Unused.can_transition_to(KernelSlotState::Running));
        assert!(KernelSlotState::Running.can_transition_to(KernelSlotState::Complete));
        assert!(!KernelSlotState::Unused.can_transition_to(KernelSlotState::Complete));
        assert!(!KernelSlotState::Complete.can_transition_to(KernelSlotState::Running));
    }

    #[test]
    fn shire_state_ready_is_not_reachable_via_transition() {
        // Ready exists in the wire vocabulary but update_shire_state never
        // produces it from any state.
        for from in [
            ShireState::Idle,
            ShireState::Running,
            ShireState::Complete,
            ShireState::Error,
        ] {
            assert!(!from.can_transition_to(ShireState::Ready));
        }
    }

    #[test]
    fn result_merge_error_dominates() {
        assert_eq!(
            KernelResultStatus::Ok.merge(KernelResultStatus::Error),
            KernelResultStatus::Error
        );
        assert_eq!(
            KernelResultStatus::Ok.merge(KernelResultStatus::Ok),
            KernelResultStatus::Ok
        );
    }
}
