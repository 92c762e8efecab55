// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire message layouts for the master<->worker cache-coherent mailbox
//! fabric.

use core::convert::TryFrom;
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// A 64-byte, cache-line-aligned message record exchanged over every channel
/// in the fabric (master->worker broadcast payload shape, unicast slot, and
/// worker->master slot all share this layout).
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C, align(64))]
pub struct Message {
    pub id: u64,
    pub data: [u64; 7],
}

impl Message {
    pub const fn new(id: u64, data: [u64; 7]) -> Self {
        Self { id, data }
    }

    pub const EMPTY: Self = Self::new(message_id::NONE, [0; 7]);
}

/// Master->worker broadcast and unicast message IDs (the two namespaces
/// share these: the same kinds of message can be sent either way).
pub mod message_id {
    pub const NONE: u64 = 0;
    pub const KERNEL_LAUNCH: u64 = 1;
    pub const KERNEL_ABORT: u64 = 2;
    pub const SET_LOG_LEVEL: u64 = 3;
    pub const TRACE_UPDATE_CONTROL: u64 = 4;
    pub const TRACE_BUFFER_RESET: u64 = 5;
    pub const TRACE_BUFFER_EVICT: u64 = 6;
    pub const PMC_CONFIGURE: u64 = 7;

    // Worker -> master namespace. Disjoint range so a stray cross-wiring bug
    // shows up immediately as an "unknown message" rather than silently
    // dispatching to the wrong handler.
    pub const LOG_WRITE: u64 = 0x1000;
    pub const KERNEL_COMPLETE: u64 = 0x1001;
    pub const EXCEPTION: u64 = 0x1002;
}

bitflags::bitflags! {
    /// Which hardware performance counters `PmcConfigure` turns on. The
    /// counters themselves are opaque to this crate; it only carries the
    /// selection word through to the external profiling collaborator.
    #[derive(Default)]
    pub struct PmcCounterMask: u32 {
        const CYCLES = 1 << 0;
        const INSTRUCTIONS_RETIRED = 1 << 1;
        const CACHE_MISSES = 1 << 2;
        const BRANCH_MISSES = 1 << 3;
    }
}

/// Messages the master broadcasts or unicasts to workers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MasterToWorker {
    KernelLaunch { kernel_id: u8, compute_pc: u64, kernel_params_ptr: u64 },
    KernelAbort,
    SetLogLevel { level: crate::LogLevel },
    TraceUpdateControl,
    TraceBufferReset,
    TraceBufferEvict,
    PmcConfigure { conf_buffer_addr: u64, counters: PmcCounterMask },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UnknownMessageId(pub u64);

impl TryFrom<Message> for MasterToWorker {
    type Error = UnknownMessageId;

    fn try_from(m: Message) -> Result<Self, Self::Error> {
        use message_id::*;
        Ok(match m.id {
            KERNEL_LAUNCH => MasterToWorker::KernelLaunch {
                kernel_id: m.data[2] as u8,
                compute_pc: m.data[0],
                kernel_params_ptr: m.data[1],
            },
            KERNEL_ABORT => MasterToWorker::KernelAbort,
            SET_LOG_LEVEL => MasterToWorker::SetLogLevel {
                level: crate::LogLevel::from_wire(m.data[0] as u8),
            },
            TRACE_UPDATE_CONTROL => MasterToWorker::TraceUpdateControl,
            TRACE_BUFFER_RESET => MasterToWorker::TraceBufferReset,
            TRACE_BUFFER_EVICT => MasterToWorker::TraceBufferEvict,
            PMC_CONFIGURE => MasterToWorker::PmcConfigure {
                conf_buffer_addr: m.data[0],
                counters: PmcCounterMask::from_bits_truncate(m.data[1] as u32),
            },
            other => return Err(UnknownMessageId(other)),
        })
    }
}

impl From<MasterToWorker> for Message {
    fn from(msg: MasterToWorker) -> Self {
        use message_id::*;
        match msg {
            MasterToWorker::KernelLaunch { kernel_id, compute_pc, kernel_params_ptr } => {
                Message::new(KERNEL_LAUNCH, [compute_pc, kernel_params_ptr, kernel_id as u64, 0, 0, 0, 0])
            }
            MasterToWorker::KernelAbort => Message::new(KERNEL_ABORT, [0; 7]),
            MasterToWorker::SetLogLevel { level } => {
                Message::new(SET_LOG_LEVEL, [level.to_wire() as u64, 0, 0, 0, 0, 0, 0])
            }
            MasterToWorker::TraceUpdateControl => Message::new(TRACE_UPDATE_CONTROL, [0; 7]),
            MasterToWorker::TraceBufferReset => Message::new(TRACE_BUFFER_RESET, [0; 7]),
            MasterToWorker::TraceBufferEvict => Message::new(TRACE_BUFFER_EVICT, [0; 7]),
            MasterToWorker::PmcConfigure { conf_buffer_addr, counters } => {
                Message::new(PMC_CONFIGURE, [conf_buffer_addr, counters.bits() as u64, 0, 0, 0, 0, 0])
            }
        }
    }
}

/// Messages a worker sends to the master.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WorkerToMaster {
    LogWrite { level: crate::LogLevel, word0: u64, word1: u64 },
    KernelComplete { kernel_id: u8, ok: bool },
    Exception { kernel_id: u8, fault_code: u64 },
}

impl TryFrom<Message> for WorkerToMaster {
    type Error = UnknownMessageId;

    fn try_from(m: Message) -> Result<Self, Self::Error> {
        use message_id::*;
        Ok(match m.id {
            LOG_WRITE => WorkerToMaster::LogWrite {
                level: crate::LogLevel::from_wire(m.data[0] as u8),
                word0: m.data[1],
                word1: m.data[2],
            },
            KERNEL_COMPLETE => WorkerToMaster::KernelComplete {
                kernel_id: m.data[0] as u8,
                ok: m.data[1] != 0,
            },
            EXCEPTION => WorkerToMaster::Exception {
                kernel_id: m.data[0] as u8,
                fault_code: m.data[1],
            },
            other => return Err(UnknownMessageId(other)),
        })
    }
}

impl From<WorkerToMaster> for Message {
    fn from(msg: WorkerToMaster) -> Self {
        use message_id::*;
        match msg {
            WorkerToMaster::LogWrite { level, word0, word1 } => {
                Message::new(LOG_WRITE, [level.to_wire() as u64, word0, word1, 0, 0, 0, 0])
            }
            WorkerToMaster::KernelComplete { kernel_id, ok } => {
                Message::new(KERNEL_COMPLETE, [kernel_id as u64, ok as u64, 0, 0, 0, 0, 0])
            }
            WorkerToMaster::Exception { kernel_id, fault_code } => {
                Message::new(EXCEPTION, [kernel_id as u64, fault_code, 0, 0, 0, 0, 0])
            }
        }
    }
}

/// Header of the single master->worker broadcast buffer. `number` is a
/// strictly increasing sequence; the first broadcast is numbered `1` so that
/// a worker's freshly booted `previous_broadcast_number = 0` never collides
/// with a legitimate message.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct BroadcastHeader {
    pub number: u32,
    pub id: u32,
}

/// The master->worker broadcast buffer: one cache line, shared by every
/// worker hart.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C, align(64))]
pub struct BroadcastBuffer {
    pub header: BroadcastHeader,
    pub payload: [u64; 6],
}

impl BroadcastBuffer {
    pub const EMPTY: Self = Self {
        header: BroadcastHeader { number: 0, id: message_id::NONE as u32 },
        payload: [0; 6],
    };
}

/// Destination cache level for an `evict`/`prefetch` cache operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CacheDest {
    L1,
    L2,
    L3,
    Mem,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_round_trips_kernel_launch() {
        let msg =
            MasterToWorker::KernelLaunch { kernel_id: 2, compute_pc: 0x1000, kernel_params_ptr: 0xdead };
        let wire: Message = msg.into();
        assert_eq!(wire.id, message_id::KERNEL_LAUNCH);
        let back = MasterToWorker::try_from(wire).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn unknown_id_rejected() {
        let wire = Message::new(0xffff, [0; 7]);
        assert!(MasterToWorker::try_from(wire).is_err());
        assert!(WorkerToMaster::try_from(wire).is_err());
    }

    #[test]
    fn message_is_one_cache_line() {
        assert_eq!(core::mem::size_of::<Message>(), 64);
        assert_eq!(core::mem::size_of::<BroadcastBuffer>(), 64);
    }
}
