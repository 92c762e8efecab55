// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host mailbox framing: the PCIe-backed channel between the master core and
//! the host driver.

use serde::{Deserialize, Serialize};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Fixed 16-byte header prefixing every host<->device mailbox message.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct HostHeader {
    pub message_id: u16,
    pub reserved: u16,
    pub host_timestamp: u64,
    pub device_timestamp: u64,
}

/// Message IDs exchanged with the host over the mailbox. Host->device IDs
/// and device->host IDs share this namespace; each variant's direction is
/// fixed by the protocol, not by the type.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum HostMessageId {
    ReflectTest = 0,
    DeviceFwVersion = 1,
    DeviceApiVersion = 2,
    KernelLaunch = 3,
    KernelAbort = 4,
    KernelState = 5,
    SetMasterLogLevel = 6,
    SetWorkerLogLevel = 7,
    KernelResult = 8,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UnknownHostMessageId(pub u16);

impl core::convert::TryFrom<u16> for HostMessageId {
    type Error = UnknownHostMessageId;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Ok(match raw {
            0 => Self::ReflectTest,
            1 => Self::DeviceFwVersion,
            2 => Self::DeviceApiVersion,
            3 => Self::KernelLaunch,
            4 => Self::KernelAbort,
            5 => Self::KernelState,
            6 => Self::SetMasterLogLevel,
            7 => Self::SetWorkerLogLevel,
            8 => Self::KernelResult,
            other => return Err(UnknownHostMessageId(other)),
        })
    }
}

/// Device firmware version, reported in response to `DeviceFwVersion`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FwVersion {
    pub git_hash: u32,
    pub dirty: bool,
}

/// Device API version, reported in response to `DeviceApiVersion`. The host
/// compares its own `major` before accepting the connection; `minor` bumps
/// are assumed backward compatible.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ApiVersion {
    pub const CURRENT: Self = Self { major: 1, minor: 0, patch: 0 };

    pub const fn accepts(self, host_major: u16) -> bool {
        self.major == host_major
    }
}

/// Outcome of a `KernelLaunch` request, returned synchronously to the host.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum LaunchResponse {
    Ok,
    ErrorSlotBusy,
    ErrorShiresNotReady,
    ErrorInvalidMask,
    ErrorBroadcastFailed,
}

/// A parsed, typed host->device request, decoded from the wire envelope
/// (`HostHeader` + `HostMessageId`-tagged payload). Keeping the host
/// mailbox's framing separate from this enum's variants means the framing
/// code is the only place that needs to change if the wire payload shapes
/// move.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HostRequest {
    ReflectTest,
    DeviceFwVersion,
    DeviceApiVersion { host_major: u16 },
    KernelLaunch {
        kernel_id: u8,
        shire_mask: u64,
        compute_pc: u64,
        params: crate::KernelParams,
    },
    KernelAbort { kernel_id: u8 },
    KernelState { kernel_id: u8 },
    SetMasterLogLevel { level: crate::LogLevel },
    SetWorkerLogLevel { level: crate::LogLevel },
}

/// The synchronous reply to a [`HostRequest`]. `KernelLaunch`'s reply uses
/// a small `[message_id, kernel_id, status]` shape; every other reply is
/// small enough to carry directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HostResponse {
    Reflect,
    FwVersion(FwVersion),
    ApiVersion(ApiVersion),
    Launch(LaunchResponse),
    Abort { ok: bool },
    KernelState(crate::KernelSlotState),
    LogLevelAck,
}

/// An asynchronous device->host event. Only `KernelResult` exists today;
/// modeled as its own enum rather than folded into `HostResponse` since it
/// isn't a reply to any particular request.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HostEvent {
    KernelResult { kernel_id: u8, status: crate::KernelResultStatus },
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::TryFrom;

    #[test]
    fn host_header_is_16_bytes() {
        assert_eq!(core::mem::size_of::<HostHeader>(), 16);
    }

    #[test]
    fn host_message_id_round_trips() {
        assert_eq!(HostMessageId::try_from(3).unwrap(), HostMessageId::KernelLaunch);
        assert!(HostMessageId::try_from(200).is_err());
    }

    #[test]
    fn api_version_major_gate() {
        assert!(ApiVersion::CURRENT.accepts(1));
        assert!(!ApiVersion::CURRENT.accepts(2));
    }
}
