// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! M-mode syscall selectors used by the dispatch firmware's trap handler.
//!
//! These cross the S-mode/M-mode boundary: cache ops, IPI trigger, broadcast
//! issue, and PMC access are all privileged operations the dispatch firmware
//! requests rather than performs directly.

use core::convert::TryFrom;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Selector {
    CacheOpsEvictSw = 0,
    CacheOpsFlushSw = 1,
    CacheOpsLockSw = 2,
    CacheOpsUnlockSw = 3,
    CacheOpsInvalidate = 4,
    CacheOpsEvictL1 = 5,
    IpiTrigger = 6,
    Broadcast = 7,
    GetMtime = 8,
    ConfigurePmcs = 9,
    SamplePmcs = 10,
    ResetPmcs = 11,
    LogWrite = 12,
    MessageSend = 13,
    ReturnFromKernel = 14,
}

impl Selector {
    pub const fn as_raw(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Selector {
    /// An unrecognized selector is not an error condition worth a typed
    /// variant: the M-mode trap handler just returns `-1` to the caller.
    type Error = ();

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Ok(match raw {
            0 => Self::CacheOpsEvictSw,
            1 => Self::CacheOpsFlushSw,
            2 => Self::CacheOpsLockSw,
            3 => Self::CacheOpsUnlockSw,
            4 => Self::CacheOpsInvalidate,
            5 => Self::CacheOpsEvictL1,
            6 => Self::IpiTrigger,
            7 => Self::Broadcast,
            8 => Self::GetMtime,
            9 => Self::ConfigurePmcs,
            10 => Self::SamplePmcs,
            11 => Self::ResetPmcs,
            12 => Self::LogWrite,
            13 => Self::MessageSend,
            14 => Self::ReturnFromKernel,
            _ => return Err(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_round_trips() {
        for raw in 0u32..=14 {
            let sel = Selector::try_from(raw).unwrap();
            assert_eq!(sel.as_raw(), raw);
        }
    }

    #[test]
    fn unknown_selector_rejected() {
        assert!(Selector::try_from(999).is_err());
    }
}
