//! Real-chip backend for [`super::Chip`].
//!
//! This is a stub: the workspace has no target toolchain or linker script
//! to build against, so every method is `unimplemented!()`. The real
//! backend would issue the M-mode syscall gate (`abi::syscall::Selector`)
//! for privileged operations (cache ops that reach set/way, IPI trigger,
//! PMC access) and touch the region-addressed statics directly for the
//! rest, per the chip's linker-provided memory map.

use abi::{BroadcastBuffer, HartId, Message, PublishedKernelSlot};

use super::{CacheDest, CacheRegion, Chip};

pub struct TargetChip;

impl TargetChip {
    pub const fn new() -> Self {
        Self
    }
}

macro_rules! stub {
    ($name:ident) => {
        unimplemented!(concat!(stringify!($name), ": no target backend in this workspace"))
    };
}

impl Chip for TargetChip {
    fn fence(&self) {
        stub!(fence)
    }
    fn evict(&self, _region: CacheRegion, _dest: CacheDest) {
        stub!(evict)
    }
    fn prefetch(&self, _region: CacheRegion, _dest: CacheDest) {
        stub!(prefetch)
    }
    fn wait_cacheops(&self) {
        stub!(wait_cacheops)
    }
    fn fcc_send(&self, _shire: u8, _thread_parity: u8, _fcc_id: u8, _mask: u32) {
        stub!(fcc_send)
    }
    fn fcc_wait(&self, _hart: HartId, _fcc_id: u8) -> u32 {
        stub!(fcc_wait)
    }
    fn fcc_read(&self, _hart: HartId, _fcc_id: u8) -> u32 {
        stub!(fcc_read)
    }
    fn flb_join(&self, _shire: u8, _barrier_id: u8, _expected: u32) -> bool {
        stub!(flb_join)
    }
    fn broadcast_ack_reset(&self) {
        stub!(broadcast_ack_reset)
    }
    fn broadcast_ack_incr(&self) -> u32 {
        stub!(broadcast_ack_incr)
    }
    fn broadcast_ack_read(&self) -> u32 {
        stub!(broadcast_ack_read)
    }
    fn ipi_trigger(&self, _shire: u8, _hart_mask: u64) {
        stub!(ipi_trigger)
    }
    fn flag_or(&self, _shire: u8, _bit: u8) -> u64 {
        stub!(flag_or)
    }
    fn flag_and(&self, _shire: u8, _mask: u64) -> u64 {
        stub!(flag_and)
    }
    fn flag_read(&self, _shire: u8) -> u64 {
        stub!(flag_read)
    }
    fn mtime(&self) -> u64 {
        stub!(mtime)
    }
    fn broadcast_lock_acquire(&self) {
        stub!(broadcast_lock_acquire)
    }
    fn broadcast_lock_release(&self) {
        stub!(broadcast_lock_release)
    }
    fn broadcast_seq_next(&self) -> u32 {
        stub!(broadcast_seq_next)
    }
    fn broadcast_write(&self, _buf: BroadcastBuffer) {
        stub!(broadcast_write)
    }
    fn broadcast_read(&self) -> BroadcastBuffer {
        stub!(broadcast_read)
    }
    fn unicast_write(&self, _hart: HartId, _msg: Message) {
        stub!(unicast_write)
    }
    fn unicast_read(&self, _hart: HartId) -> Message {
        stub!(unicast_read)
    }
    fn w2m_buffer_write(&self, _hart: HartId, _msg: Message) {
        stub!(w2m_buffer_write)
    }
    fn w2m_buffer_read(&self, _hart: HartId) -> Message {
        stub!(w2m_buffer_read)
    }
    fn kernel_slot_write(&self, _id: u8, _slot: PublishedKernelSlot) {
        stub!(kernel_slot_write)
    }
    fn kernel_slot_read(&self, _id: u8) -> PublishedKernelSlot {
        stub!(kernel_slot_read)
    }
}
