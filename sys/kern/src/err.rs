// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common error-handling support.
//!
//! Mirrors the split the master's own syscall layer would want: recoverable
//! conditions the host learns about synchronously in the same response
//! slot it asked in, versus firmware invariants that should never be
//! reachable and are treated as fatal if they are.

/// A synchronous, recoverable launch-precondition failure. Reported back
/// to the host in the same response as the request; no runtime state
/// changes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LaunchError {
    /// The requested kernel slot is not `Unused`.
    SlotBusy,
    /// `shire_mask` has reserved bits set, or is empty.
    InvalidMask,
    /// Not every shire in `shire_mask` is `Idle`.
    ShiresNotReady,
    /// The broadcast send returned a nonzero failure status; the slot was
    /// not moved to `Running`.
    BroadcastFailed,
}

impl LaunchError {
    pub const fn response(self) -> abi::LaunchResponse {
        match self {
            Self::SlotBusy => abi::LaunchResponse::ErrorSlotBusy,
            Self::InvalidMask => abi::LaunchResponse::ErrorInvalidMask,
            Self::ShiresNotReady => abi::LaunchResponse::ErrorShiresNotReady,
            Self::BroadcastFailed => abi::LaunchResponse::ErrorBroadcastFailed,
        }
    }
}

/// A violated firmware invariant: reached only by construction bugs, not by
/// any host- or worker-originated input. Callers should log via `klog!`
/// and then panic; never attempt to recover from one of these.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RuntimeError {
    /// `update_shire_state` was asked to perform an illegal transition.
    IllegalShireTransition { from: abi::ShireState, to: abi::ShireState },
    /// Two `Running` slots claimed overlapping shires.
    OverlappingShireMask,
    /// A completion/exception message named a shire or kernel id the
    /// runtime has no record of.
    UnknownShireOrKernel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_error_maps_to_distinct_responses() {
        assert_eq!(LaunchError::SlotBusy.response(), abi::LaunchResponse::ErrorSlotBusy);
        assert_eq!(LaunchError::InvalidMask.response(), abi::LaunchResponse::ErrorInvalidMask);
        assert_eq!(
            LaunchError::ShiresNotReady.response(),
            abi::LaunchResponse::ErrorShiresNotReady
        );
        assert_eq!(
            LaunchError::BroadcastFailed.response(),
            abi::LaunchResponse::ErrorBroadcastFailed
        );
    }
}
