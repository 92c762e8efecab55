//! In-process simulation of [`super::Chip`], usable from ordinary
//! `#[test]` functions on the host. No real interrupts, MMIO, or cache
//! hierarchy: every primitive is backed by a plain atomic or a `Mutex`
//! over fixed-size storage, with the same observable semantics the real
//! chip guarantees (spin-and-wait, fence-per-iteration, flags cleared only
//! by the bit that was set).
//!
//! This backend treats `evict`/`prefetch`/`wait_cacheops` as no-ops beyond
//! bookkeeping: a single-process simulation has no incoherent caches to
//! drain. What it does enforce faithfully is the ordering contract each
//! region's readers/writers depend on (sequence numbers, ACK counts, flag
//! words), since those are what the test suite in `kern/tests/launch.rs`
//! actually exercises.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use abi::{BroadcastBuffer, HartId, Message, PublishedKernelSlot};

use super::{CacheDest, CacheRegion, Chip};

const FCC_COUNT: usize = 2;
const FLB_COUNT: usize = 32;

/// One shire's local barrier bank: 32 independently addressable [`Chip::flb_join`]
/// counters.
#[derive(Default)]
struct ShireBarriers {
    counters: [AtomicU32; FLB_COUNT],
}

impl ShireBarriers {
    fn new() -> Self {
        Self { counters: core::array::from_fn(|_| AtomicU32::new(0)) }
    }
}

/// A hart's two FCC banks.
struct HartFcc {
    counters: [AtomicU32; FCC_COUNT],
}

impl HartFcc {
    fn new() -> Self {
        Self { counters: core::array::from_fn(|_| AtomicU32::new(0)) }
    }
}

/// The simulated chip: every piece of state every [`Chip`] method touches,
/// sized for the full 33-shire, 2112-hart topology.
pub struct SimChip {
    broadcast_ack: AtomicU32,
    broadcast_lock: AtomicBool,
    broadcast_seq: AtomicU32,
    broadcast_buf: Mutex<BroadcastBuffer>,
    unicast_slots: Vec<Mutex<Message>>,
    w2m_flags: Vec<AtomicU64>,
    w2m_bufs: Vec<Mutex<Message>>,
    kernel_slots: Vec<Mutex<PublishedKernelSlot>>,
    flb: Vec<ShireBarriers>,
    fcc: Vec<HartFcc>,
    ipi_log: Mutex<Vec<(u8, u64)>>,
    mtime: AtomicU64,
}

impl SimChip {
    pub fn new() -> Self {
        let num_harts = abi::NUM_SHIRES * abi::HARTS_PER_SHIRE as usize;
        Self {
            broadcast_ack: AtomicU32::new(0),
            broadcast_lock: AtomicBool::new(false),
            broadcast_seq: AtomicU32::new(0),
            broadcast_buf: Mutex::new(BroadcastBuffer::EMPTY),
            unicast_slots: (0..num_harts).map(|_| Mutex::new(Message::EMPTY)).collect(),
            w2m_flags: (0..abi::NUM_SHIRES).map(|_| AtomicU64::new(0)).collect(),
            w2m_bufs: (0..num_harts).map(|_| Mutex::new(Message::EMPTY)).collect(),
            kernel_slots: (0..abi::MAX_SIMULTANEOUS_KERNELS)
                .map(|_| Mutex::new(PublishedKernelSlot::EMPTY))
                .collect(),
            flb: (0..abi::NUM_SHIRES).map(|_| ShireBarriers::new()).collect(),
            fcc: (0..num_harts).map(|_| HartFcc::new()).collect(),
            ipi_log: Mutex::new(Vec::new()),
            mtime: AtomicU64::new(0),
        }
    }

    fn hart_index(hart: HartId) -> usize {
        hart.shire_id() as usize * abi::HARTS_PER_SHIRE as usize + hart.hart_in_shire() as usize
    }

    /// Test hook: most recent IPIs issued, as `(shire, hart_mask)` pairs.
    /// Tests use this to assert a launch actually notified the shires it
    /// claimed, without needing a real interrupt controller.
    pub fn ipi_log(&self) -> Vec<(u8, u64)> {
        self.ipi_log.lock().unwrap().clone()
    }
}

impl Default for SimChip {
    fn default() -> Self {
        Self::new()
    }
}

impl Chip for SimChip {
    fn fence(&self) {
        std::sync::atomic::fence(Ordering::SeqCst);
    }

    fn evict(&self, _region: CacheRegion, _dest: CacheDest) {
        // No incoherent caches to drain in-process.
    }

    fn prefetch(&self, _region: CacheRegion, _dest: CacheDest) {}

    fn wait_cacheops(&self) {
        std::sync::atomic::fence(Ordering::SeqCst);
    }

    fn fcc_send(&self, shire: u8, thread_parity: u8, fcc_id: u8, mask: u32) {
        let base = shire as usize * abi::HARTS_PER_SHIRE as usize;
        for minion in 0..abi::MINIONS_PER_SHIRE as usize {
            if mask & (1 << minion) == 0 {
                continue;
            }
            let hart = base + minion * 2 + thread_parity as usize;
            self.fcc[hart].counters[fcc_id as usize].fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fcc_wait(&self, hart: HartId, fcc_id: u8) -> u32 {
        let idx = Self::hart_index(hart);
        loop {
            let cur = self.fcc[idx].counters[fcc_id as usize].load(Ordering::SeqCst);
            if cur > 0
                && self.fcc[idx].counters[fcc_id as usize]
                    .compare_exchange(cur, cur - 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                return cur;
            }
            std::sync::atomic::fence(Ordering::SeqCst);
            std::thread::yield_now();
        }
    }

    fn fcc_read(&self, hart: HartId, fcc_id: u8) -> u32 {
        self.fcc[Self::hart_index(hart)].counters[fcc_id as usize].load(Ordering::SeqCst)
    }

    fn flb_join(&self, shire: u8, barrier_id: u8, expected: u32) -> bool {
        let counter = &self.flb[shire as usize].counters[barrier_id as usize];
        let prior = counter.fetch_add(1, Ordering::SeqCst);
        if prior + 1 == expected {
            counter.store(0, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    fn broadcast_ack_reset(&self) {
        self.broadcast_ack.store(0, Ordering::SeqCst);
    }

    fn broadcast_ack_incr(&self) -> u32 {
        self.broadcast_ack.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn broadcast_ack_read(&self) -> u32 {
        self.broadcast_ack.load(Ordering::SeqCst)
    }

    fn ipi_trigger(&self, shire: u8, hart_mask: u64) {
        self.ipi_log.lock().unwrap().push((shire, hart_mask));
    }

    fn flag_or(&self, shire: u8, bit: u8) -> u64 {
        self.w2m_flags[shire as usize].fetch_or(1 << bit, Ordering::SeqCst)
    }

    fn flag_and(&self, shire: u8, mask: u64) -> u64 {
        self.w2m_flags[shire as usize].fetch_and(mask, Ordering::SeqCst)
    }

    fn flag_read(&self, shire: u8) -> u64 {
        self.w2m_flags[shire as usize].load(Ordering::SeqCst)
    }

    fn mtime(&self) -> u64 {
        self.mtime.fetch_add(1, Ordering::SeqCst)
    }

    fn broadcast_lock_acquire(&self) {
        while self
            .broadcast_lock
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            std::thread::yield_now();
        }
    }

    fn broadcast_lock_release(&self) {
        self.broadcast_lock.store(false, Ordering::SeqCst);
    }

    fn broadcast_seq_next(&self) -> u32 {
        self.broadcast_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn broadcast_write(&self, buf: BroadcastBuffer) {
        *self.broadcast_buf.lock().unwrap() = buf;
    }

    fn broadcast_read(&self) -> BroadcastBuffer {
        *self.broadcast_buf.lock().unwrap()
    }

    fn unicast_write(&self, hart: HartId, msg: Message) {
        *self.unicast_slots[Self::hart_index(hart) % self.unicast_slots.len()]
            .lock()
            .unwrap() = msg;
    }

    fn unicast_read(&self, hart: HartId) -> Message {
        *self.unicast_slots[Self::hart_index(hart) % self.unicast_slots.len()]
            .lock()
            .unwrap()
    }

    fn w2m_buffer_write(&self, hart: HartId, msg: Message) {
        *self.w2m_bufs[Self::hart_index(hart) % self.w2m_bufs.len()].lock().unwrap() = msg;
    }

    fn w2m_buffer_read(&self, hart: HartId) -> Message {
        *self.w2m_bufs[Self::hart_index(hart) % self.w2m_bufs.len()].lock().unwrap()
    }

    fn kernel_slot_write(&self, id: u8, slot: PublishedKernelSlot) {
        *self.kernel_slots[id as usize].lock().unwrap() = slot;
    }

    fn kernel_slot_read(&self, id: u8) -> PublishedKernelSlot {
        *self.kernel_slots[id as usize].lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flb_join_elects_exactly_one_last_arrival() {
        let chip = SimChip::new();
        assert!(!chip.flb_join(0, 0, 3));
        assert!(!chip.flb_join(0, 0, 3));
        assert!(chip.flb_join(0, 0, 3));
        // Barrier resets for the next round.
        assert!(!chip.flb_join(0, 0, 3));
    }

    #[test]
    fn fcc_send_then_wait_round_trips() {
        let chip = SimChip::new();
        let hart = HartId::from_parts(0, 0, 0);
        chip.fcc_send(0, hart.thread_id(), 1, 1 << hart.minion_id());
        assert_eq!(chip.fcc_read(hart, 1), 1);
        assert_eq!(chip.fcc_wait(hart, 1), 1);
        assert_eq!(chip.fcc_read(hart, 1), 0);
    }

    #[test]
    fn broadcast_ack_counts_distinct_shires() {
        let chip = SimChip::new();
        chip.broadcast_ack_reset();
        chip.broadcast_ack_incr();
        chip.broadcast_ack_incr();
        assert_eq!(chip.broadcast_ack_read(), 2);
    }

    #[test]
    fn flag_clear_mask_only_drops_one_bit() {
        let chip = SimChip::new();
        chip.flag_or(0, 2);
        chip.flag_or(0, 5);
        chip.flag_and(0, !(1u64 << 2));
        assert_eq!(chip.flag_read(0), 1 << 5);
    }
}
