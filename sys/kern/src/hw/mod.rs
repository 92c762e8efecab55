//! Typed access to the chip's hardware primitives: atomics, FCCs, FLBs,
//! cache ops, the broadcast ACK counter, and IPI trigger.
//!
//! The rest of the runtime is generic over [`Chip`] so it can run against
//! the in-process [`sim`] backend on the host (what every test in this
//! workspace does) or, on the real target, a backend built against the
//! chip's actual MMIO/CSR surface.

use abi::{BroadcastBuffer, HartId, Message};

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        mod target;
        pub use target::TargetChip as DefaultChip;
    } else {
        pub mod sim;
        pub use sim::SimChip as DefaultChip;
    }
}

/// Destination cache level for an evict/prefetch operation.
pub use abi::CacheDest;

/// Symbolic name for one of the runtime's statically reserved shared
/// regions. The real chip addresses these via the linker-provided memory
/// map; this runtime never computes addresses itself, so cache ops are
/// expressed against the region they target rather than a raw `u64`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CacheRegion {
    BroadcastSlot,
    UnicastSlot(HartId),
    KernelSlot(u8),
    WorkerToMasterFlags,
    WorkerToMasterBuffer(HartId),
}

/// The hardware primitives every higher layer of the runtime is built on.
///
/// Every method is non-blocking unless documented otherwise. `fcc_wait` and
/// `flb_join` are the runtime's only blocking primitives (besides the
/// busy-spin loops layered on top of the broadcast ACK counter and the
/// worker->master flag words), and both must be driven by a caller that
/// re-polls rather than sleeping: there is no OS scheduler to wake on.
pub trait Chip: Send + Sync {
    /// Orders this hart's prior stores before any subsequent cache op or
    /// atomic.
    fn fence(&self);

    /// Evicts `region` to `dest`'s point of coherence. Must be followed by
    /// [`Chip::wait_cacheops`] before any dependent load elsewhere observes
    /// the write.
    fn evict(&self, region: CacheRegion, dest: CacheDest);

    /// Prefetches `region` from `dest` into this hart's local cache.
    fn prefetch(&self, region: CacheRegion, dest: CacheDest);

    /// Blocks until all cache ops issued by this hart have drained.
    fn wait_cacheops(&self);

    /// Convenience composition of the fence/evict/wait sequence every
    /// publish-to-coherence-plane call site needs
    /// (`examples/original_source/.../message.c`'s `evict_message`).
    fn evict_and_wait(&self, region: CacheRegion, dest: CacheDest) {
        self.fence();
        self.evict(region, dest);
        self.wait_cacheops();
    }

    /// Sends a Fast Credit Counter signal: ORs `mask` into FCC `fcc_id` of
    /// every hart of the given thread parity in `shire`.
    fn fcc_send(&self, shire: u8, thread_parity: u8, fcc_id: u8, mask: u32);

    /// Blocks until `hart`'s FCC `fcc_id` is nonzero, then decrements it by
    /// one and returns the value observed before the decrement.
    fn fcc_wait(&self, hart: HartId, fcc_id: u8) -> u32;

    /// Non-destructively reads `hart`'s FCC `fcc_id`.
    fn fcc_read(&self, hart: HartId, fcc_id: u8) -> u32;

    /// Joins Fast Local Barrier `barrier_id` in `shire`. Returns `true`
    /// exactly once per `expected` joiners: for whichever caller's join
    /// brings the count to `expected`, after which the barrier resets for
    /// its next use.
    fn flb_join(&self, shire: u8, barrier_id: u8, expected: u32) -> bool;

    /// Zeros the broadcast ACK counter. Must happen before the IPI that
    /// announces the broadcast.
    fn broadcast_ack_reset(&self);

    /// Atomically increments the broadcast ACK counter, returning the value
    /// after the increment. Called once per receiving shire.
    fn broadcast_ack_incr(&self) -> u32;

    /// Non-destructively reads the broadcast ACK counter.
    fn broadcast_ack_read(&self) -> u32;

    /// Raises the harts selected by `hart_mask` within `shire`.
    fn ipi_trigger(&self, shire: u8, hart_mask: u64);

    /// Atomically ORs `bit` into the worker->master flag word for `shire`,
    /// returning the word's prior value.
    fn flag_or(&self, shire: u8, bit: u8) -> u64;

    /// Atomically ANDs `mask` into the worker->master flag word for
    /// `shire`, returning the word's prior value.
    fn flag_and(&self, shire: u8, mask: u64) -> u64;

    /// Non-destructively reads the worker->master flag word for `shire`.
    fn flag_read(&self, shire: u8) -> u64;

    /// Reads the chip's free-running cycle counter.
    fn mtime(&self) -> u64;

    // -- Region-addressed memory --------------------------------------
    //
    // On the real chip, every `CacheRegion` names a location in DRAM or a
    // shire's L3 slice reached through ordinary loads/stores; the cache-op
    // primitives above only manage *when* a write becomes visible, not how
    // it's stored. This runtime folds the storage for those regions into
    // the `Chip` implementation itself rather than threading a second
    // shared-memory handle through every caller: a region identifier is
    // both the cache-op argument and the key for reading/writing its
    // contents.

    /// Acquires the master-local spinlock serializing broadcast sends.
    /// Spins until available. Re-entrant acquisition from the holding hart
    /// is a programming error and will deadlock, matching
    /// the real spinlock's behavior.
    fn broadcast_lock_acquire(&self);

    /// Releases the master-local broadcast spinlock.
    fn broadcast_lock_release(&self);

    /// Allocates the next broadcast sequence number by atomic-add to the
    /// master-local counter. The first call returns `1`.
    fn broadcast_seq_next(&self) -> u32;

    /// Overwrites the shared master->worker broadcast buffer.
    fn broadcast_write(&self, buf: BroadcastBuffer);

    /// Reads the shared master->worker broadcast buffer.
    fn broadcast_read(&self) -> BroadcastBuffer;

    /// Overwrites `hart`'s master->worker unicast slot.
    fn unicast_write(&self, hart: HartId, msg: Message);

    /// Reads `hart`'s master->worker unicast slot.
    fn unicast_read(&self, hart: HartId) -> Message;

    /// Overwrites `hart`'s worker->master message slot.
    fn w2m_buffer_write(&self, hart: HartId, msg: Message);

    /// Reads `hart`'s worker->master message slot.
    fn w2m_buffer_read(&self, hart: HartId) -> Message;

    /// Overwrites kernel slot `id`'s published record.
    fn kernel_slot_write(&self, id: u8, slot: abi::PublishedKernelSlot);

    /// Reads kernel slot `id`'s published record.
    fn kernel_slot_read(&self, id: u8) -> abi::PublishedKernelSlot;
}

/// Lets a shared chip handle be used wherever an owned `C: Chip` is
/// expected, the same way `&mut R` forwards `std::io::Read`. Every real
/// `Chip` backend already represents shared hardware state reached through
/// `&self`, so the only thing a reference adds is letting more than one
/// [`crate::runtime::Runtime`]-shaped owner (in tests, one per worker hart)
/// hold on to the same chip at once.
impl<T: Chip + ?Sized> Chip for &T {
    fn fence(&self) {
        (**self).fence()
    }

    fn evict(&self, region: CacheRegion, dest: CacheDest) {
        (**self).evict(region, dest)
    }

    fn prefetch(&self, region: CacheRegion, dest: CacheDest) {
        (**self).prefetch(region, dest)
    }

    fn wait_cacheops(&self) {
        (**self).wait_cacheops()
    }

    fn fcc_send(&self, shire: u8, thread_parity: u8, fcc_id: u8, mask: u32) {
        (**self).fcc_send(shire, thread_parity, fcc_id, mask)
    }

    fn fcc_wait(&self, hart: HartId, fcc_id: u8) -> u32 {
        (**self).fcc_wait(hart, fcc_id)
    }

    fn fcc_read(&self, hart: HartId, fcc_id: u8) -> u32 {
        (**self).fcc_read(hart, fcc_id)
    }

    fn flb_join(&self, shire: u8, barrier_id: u8, expected: u32) -> bool {
        (**self).flb_join(shire, barrier_id, expected)
    }

    fn broadcast_ack_reset(&self) {
        (**self).broadcast_ack_reset()
    }

    fn broadcast_ack_incr(&self) -> u32 {
        (**self).broadcast_ack_incr()
    }

    fn broadcast_ack_read(&self) -> u32 {
        (**self).broadcast_ack_read()
    }

    fn ipi_trigger(&self, shire: u8, hart_mask: u64) {
        (**self).ipi_trigger(shire, hart_mask)
    }

    fn flag_or(&self, shire: u8, bit: u8) -> u64 {
        (**self).flag_or(shire, bit)
    }

    fn flag_and(&self, shire: u8, mask: u64) -> u64 {
        (**self).flag_and(shire, mask)
    }

    fn flag_read(&self, shire: u8) -> u64 {
        (**self).flag_read(shire)
    }

    fn mtime(&self) -> u64 {
        (**self).mtime()
    }

    fn broadcast_lock_acquire(&self) {
        (**self).broadcast_lock_acquire()
    }

    fn broadcast_lock_release(&self) {
        (**self).broadcast_lock_release()
    }

    fn broadcast_seq_next(&self) -> u32 {
        (**self).broadcast_seq_next()
    }

    fn broadcast_write(&self, buf: BroadcastBuffer) {
        (**self).broadcast_write(buf)
    }

    fn broadcast_read(&self) -> BroadcastBuffer {
        (**self).broadcast_read()
    }

    fn unicast_write(&self, hart: HartId, msg: Message) {
        (**self).unicast_write(hart, msg)
    }

    fn unicast_read(&self, hart: HartId) -> Message {
        (**self).unicast_read(hart)
    }

    fn w2m_buffer_write(&self, hart: HartId, msg: Message) {
        (**self).w2m_buffer_write(hart, msg)
    }

    fn w2m_buffer_read(&self, hart: HartId) -> Message {
        (**self).w2m_buffer_read(hart)
    }

    fn kernel_slot_write(&self, id: u8, slot: abi::PublishedKernelSlot) {
        (**self).kernel_slot_write(id, slot)
    }

    fn kernel_slot_read(&self, id: u8) -> abi::PublishedKernelSlot {
        (**self).kernel_slot_read(id)
    }
}
