// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shire/hart state tracker.
//!
//! Pure in-memory state owned by the master; never shared with workers.
//! `kern::launch` is the only caller that mutates it; workers only ever
//! influence it indirectly, by sending messages the launcher interprets.

use abi::ShireState;

use crate::err::RuntimeError;

ringbuf::ringbuf!(SHIRE_RINGBUF, ShireEvent, 32, ShireEvent::Init);

/// A ring buffer entry recording a shire-state transition, for
/// post-mortem inspection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShireEvent {
    Init,
    Transition { shire: u8, from: ShireState, to: ShireState },
}

/// One worker shire's tracked state, plus the master-local bookkeeping
/// needed to attribute its messages to a kernel.
#[derive(Copy, Clone, Debug)]
struct ShireStatus {
    state: ShireState,
    current_kernel_id: Option<u8>,
}

impl ShireStatus {
    const fn new() -> Self {
        Self { state: ShireState::Idle, current_kernel_id: None }
    }
}

/// Tracks every worker shire's lifecycle state across launches.
///
/// Shire 32 (the master shire) is not tracked here: it never runs a worker
/// kernel body through this path, only the master firmware and the upper
/// half of its harts as launch-notification receivers.
pub struct ShireTracker {
    shires: [ShireStatus; abi::NUM_WORKER_SHIRES as usize],
}

impl ShireTracker {
    pub const fn new() -> Self {
        Self { shires: [ShireStatus::new(); abi::NUM_WORKER_SHIRES as usize] }
    }

    fn get(&self, shire: u8) -> &ShireStatus {
        &self.shires[shire as usize]
    }

    pub fn state(&self, shire: u8) -> ShireState {
        self.get(shire).state
    }

    pub fn kernel_id(&self, shire: u8) -> Option<u8> {
        self.get(shire).current_kernel_id
    }

    /// `true` iff every shire set in `mask` is `Idle`. An empty mask
    /// trivially holds.
    pub fn all_shires_ready(&self, mask: abi::ShireMask) -> bool {
        mask.worker_shires_iter().all(|s| self.state(s) == ShireState::Idle)
    }

    /// `true` iff every shire set in `mask` is `Complete`.
    pub fn all_shires_complete(&self, mask: abi::ShireMask) -> bool {
        mask.worker_shires_iter().all(|s| self.state(s) == ShireState::Complete)
    }

    /// Moves `shire` to `new_state`, asserting the transition is legal per
    /// `ShireState::can_transition_to`. Returns `RuntimeError` on a
    /// violated invariant rather than panicking directly, so the caller
    /// can log with full launch context before halting.
    pub fn update_shire_state(
        &mut self,
        shire: u8,
        new_state: ShireState,
    ) -> Result<(), RuntimeError> {
        let cur = self.state(shire);
        if !cur.can_transition_to(new_state) {
            return Err(RuntimeError::IllegalShireTransition { from: cur, to: new_state });
        }
        ringbuf::ringbuf_entry!(
            SHIRE_RINGBUF,
            ShireEvent::Transition { shire, from: cur, to: new_state }
        );
        self.shires[shire as usize].state = new_state;
        if new_state == ShireState::Idle {
            self.shires[shire as usize].current_kernel_id = None;
        }
        Ok(())
    }

    pub fn set_shire_kernel_id(&mut self, shire: u8, kernel_id: u8) {
        self.shires[shire as usize].current_kernel_id = Some(kernel_id);
    }

    pub fn get_shire_kernel_id(&self, shire: u8) -> Option<u8> {
        self.kernel_id(shire)
    }
}

impl Default for ShireTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::TryFrom;

    #[test]
    fn fresh_tracker_is_all_ready() {
        let t = ShireTracker::new();
        let mask = abi::ShireMask::try_from(0b111).unwrap();
        assert!(t.all_shires_ready(mask));
        assert!(!t.all_shires_complete(mask));
    }

    #[test]
    fn transition_then_complete_then_idle() {
        let mut t = ShireTracker::new();
        t.update_shire_state(0, ShireState::Running).unwrap();
        t.set_shire_kernel_id(0, 2);
        assert_eq!(t.get_shire_kernel_id(0), Some(2));
        t.update_shire_state(0, ShireState::Complete).unwrap();
        let mask = abi::ShireMask::try_from(0b1).unwrap();
        assert!(t.all_shires_complete(mask));
        t.update_shire_state(0, ShireState::Idle).unwrap();
        assert_eq!(t.get_shire_kernel_id(0), None);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut t = ShireTracker::new();
        assert!(t.update_shire_state(0, ShireState::Complete).is_err());
    }
}
