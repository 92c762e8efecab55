// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire framing for the PCIe-backed host mailbox.
//!
//! Every message is a fixed 16-byte [`abi::HostHeader`] (message id plus
//! both sides' timestamps) followed by a variable-length payload. The
//! payload is whatever `ssmarshal` makes of the typed [`abi::HostRequest`],
//! [`abi::HostResponse`], or [`abi::HostEvent`] -- the same scheme the
//! kernel's own IPC layer uses to move typed messages across a raw byte
//! buffer without a second copy of the framing logic per message kind.

use abi::{HostEvent, HostHeader, HostMessageId, HostRequest, HostResponse};
use core::convert::TryFrom;
use zerocopy::{AsBytes, FromBytes};

#[derive(Debug)]
pub enum DecodeError {
    /// Buffer shorter than a `HostHeader`.
    Truncated,
    /// The header named a message id this direction doesn't carry.
    WrongDirection(u16),
    /// `ssmarshal` rejected the payload (truncated, or a malformed enum
    /// discriminant).
    Malformed,
}

#[derive(Debug)]
pub enum EncodeError {
    /// The caller's buffer is too small for the header plus payload.
    BufferTooSmall,
}

fn message_id_of_request(req: &HostRequest) -> HostMessageId {
    match req {
        HostRequest::ReflectTest => HostMessageId::ReflectTest,
        HostRequest::DeviceFwVersion => HostMessageId::DeviceFwVersion,
        HostRequest::DeviceApiVersion { .. } => HostMessageId::DeviceApiVersion,
        HostRequest::KernelLaunch { .. } => HostMessageId::KernelLaunch,
        HostRequest::KernelAbort { .. } => HostMessageId::KernelAbort,
        HostRequest::KernelState { .. } => HostMessageId::KernelState,
        HostRequest::SetMasterLogLevel { .. } => HostMessageId::SetMasterLogLevel,
        HostRequest::SetWorkerLogLevel { .. } => HostMessageId::SetWorkerLogLevel,
    }
}

/// Decodes a host->device request from the raw mailbox buffer, returning
/// the parsed request and the header's `host_timestamp` for the device to
/// echo back in its reply.
pub fn decode_request(buf: &[u8]) -> Result<(HostRequest, u64), DecodeError> {
    let header_bytes = buf.get(..core::mem::size_of::<HostHeader>()).ok_or(DecodeError::Truncated)?;
    let header = HostHeader::read_from(header_bytes).ok_or(DecodeError::Truncated)?;
    let id = HostMessageId::try_from(header.message_id)
        .map_err(|abi::UnknownHostMessageId(raw)| DecodeError::WrongDirection(raw))?;
    if id == HostMessageId::KernelResult {
        // Device->host only; a host would never send this.
        return Err(DecodeError::WrongDirection(header.message_id));
    }
    let payload = &buf[core::mem::size_of::<HostHeader>()..];
    let (req, _) = ssmarshal::deserialize::<HostRequest>(payload).map_err(|_| DecodeError::Malformed)?;
    if message_id_of_request(&req) != id {
        return Err(DecodeError::Malformed);
    }
    Ok((req, header.host_timestamp))
}

/// Encodes a device->host reply into `buf`, returning the number of bytes
/// written. `host_timestamp` is echoed from the request this replies to;
/// `device_timestamp` is this reply's own `mtime` snapshot.
pub fn encode_response(
    buf: &mut [u8],
    resp: &HostResponse,
    host_timestamp: u64,
    device_timestamp: u64,
) -> Result<usize, EncodeError> {
    encode(buf, HostMessageId::responding_to(resp), resp, host_timestamp, device_timestamp)
}

/// Encodes an asynchronous device->host event into `buf`.
pub fn encode_event(
    buf: &mut [u8],
    event: &HostEvent,
    device_timestamp: u64,
) -> Result<usize, EncodeError> {
    encode(buf, HostMessageId::KernelResult, event, 0, device_timestamp)
}

fn encode<T: serde::Serialize>(
    buf: &mut [u8],
    id: HostMessageId,
    payload: &T,
    host_timestamp: u64,
    device_timestamp: u64,
) -> Result<usize, EncodeError> {
    let header = HostHeader { message_id: id as u16, reserved: 0, host_timestamp, device_timestamp };
    let header_len = core::mem::size_of::<HostHeader>();
    let slot = buf.get_mut(..header_len).ok_or(EncodeError::BufferTooSmall)?;
    slot.copy_from_slice(header.as_bytes());
    let written = ssmarshal::serialize(&mut buf[header_len..], payload).map_err(|_| EncodeError::BufferTooSmall)?;
    Ok(header_len + written)
}

impl HostMessageId {
    fn responding_to(resp: &HostResponse) -> Self {
        match resp {
            HostResponse::Reflect => Self::ReflectTest,
            HostResponse::FwVersion(_) => Self::DeviceFwVersion,
            HostResponse::ApiVersion(_) => Self::DeviceApiVersion,
            HostResponse::Launch(_) => Self::KernelLaunch,
            HostResponse::Abort { .. } => Self::KernelAbort,
            HostResponse::KernelState(_) => Self::KernelState,
            HostResponse::LogLevelAck => Self::SetMasterLogLevel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi::KernelParams;

    #[test]
    fn round_trips_kernel_launch_request() {
        let req = HostRequest::KernelLaunch {
            kernel_id: 2,
            shire_mask: 0b1010,
            compute_pc: 0x4000,
            params: KernelParams::EMPTY,
        };
        let mut buf = [0u8; 128];
        let header = HostHeader { message_id: HostMessageId::KernelLaunch as u16, reserved: 0, host_timestamp: 42, device_timestamp: 0 };
        buf[..16].copy_from_slice(header.as_bytes());
        let written = ssmarshal::serialize(&mut buf[16..], &req).unwrap();

        let (decoded, ts) = decode_request(&buf[..16 + written]).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(ts, 42);
    }

    #[test]
    fn rejects_truncated_buffer() {
        let buf = [0u8; 4];
        assert!(matches!(decode_request(&buf), Err(DecodeError::Truncated)));
    }

    #[test]
    fn encodes_response_with_matching_header() {
        let mut buf = [0u8; 64];
        let n = encode_response(&mut buf, &HostResponse::Abort { ok: true }, 7, 99).unwrap();
        let header = HostHeader::read_from(&buf[..16]).unwrap();
        assert_eq!(header.message_id, HostMessageId::KernelAbort as u16);
        assert_eq!(header.host_timestamp, 7);
        assert_eq!(header.device_timestamp, 99);
        assert!(n > 16);
    }
}
