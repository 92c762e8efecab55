// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Master-side half of the MM<->CM message fabric.
//!
//! The worker-side receive/send halves live in the `worker` crate
//! (`worker::mailbox`), built against the same [`crate::hw::Chip`] trait so
//! both sides of the fabric agree on wire layout without sharing code that
//! only makes sense on one side of the chip.

use abi::{BroadcastBuffer, BroadcastHeader, HartId, Message, ShireMask};

use crate::hw::{CacheDest, CacheRegion, Chip};

ringbuf::ringbuf!(FABRIC_RINGBUF, FabricEvent, 32, FabricEvent::Init);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FabricEvent {
    Init,
    BroadcastSent { number: u32, id: u64, shires: u64 },
    WorkerMessageSent { shire: u8, hart: u8, id: u64 },
}

/// A nonzero return from [`multicast_send`] -- the only failure this fabric
/// surfaces. Flows back to the caller as a launcher-level error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BroadcastFailed;

/// `MM_To_CM_Iface_Multicast_Send`.
///
/// Sends `msg` to every shire selected by `mask` (worker shires and the
/// master-local receiver range) and blocks until each has ACK'd. A
/// destination set of zero is legal and returns immediately.
///
/// Re-entrant calls from the holding hart are forbidden by the spinlock
/// discipline; this function does not protect against that, matching the
/// source's documented contract.
pub fn multicast_send<C: Chip>(chip: &C, mask: ShireMask, msg: Message) -> Result<(), BroadcastFailed> {
    if mask.is_empty() {
        return Ok(());
    }

    chip.broadcast_lock_acquire();

    let number = chip.broadcast_seq_next();
    let buf = BroadcastBuffer {
        header: BroadcastHeader { number, id: msg.id as u32 },
        payload: msg.data[..6].try_into().unwrap(),
    };
    chip.broadcast_write(buf);
    chip.evict_and_wait(CacheRegion::BroadcastSlot, CacheDest::L3);

    // Reset must precede the IPI: a worker that ACKs between an IPI and a
    // late reset would have its ACK wiped out from under it.
    chip.broadcast_ack_reset();

    let worker_mask = mask.worker_shires();
    if worker_mask != 0 {
        for shire in mask.worker_shires_iter() {
            chip.ipi_trigger(shire, u64::MAX);
        }
    }
    if mask.includes_master_shire() {
        // Upper 32 harts of shire 32 run worker firmware
        //.
        chip.ipi_trigger(abi::MASTER_SHIRE as u8, 0xffff_ffff_0000_0000);
    }

    ringbuf::ringbuf_entry!(
        FABRIC_RINGBUF,
        FabricEvent::BroadcastSent { number, id: msg.id, shires: mask.raw() }
    );

    let expected = mask.popcount();
    while chip.broadcast_ack_read() != expected {
        chip.fence();
        core::hint::spin_loop();
    }

    chip.broadcast_lock_release();
    Ok(())
}

/// Writes `msg` into `hart`'s unicast slot, spinning until the slot is
/// empty (`id == NONE`) first. Does not wait for the destination to
/// consume it.
pub fn unicast_send<C: Chip>(chip: &C, hart: HartId, msg: Message) {
    loop {
        let cur = chip.unicast_read(hart);
        if cur.id == abi::message::message_id::NONE {
            break;
        }
        chip.fence();
        core::hint::spin_loop();
    }
    chip.unicast_write(hart, msg);
    chip.evict_and_wait(CacheRegion::UnicastSlot(hart), CacheDest::L3);
}

/// Master-side receive: scans the worker->master flag words for a set bit,
/// reads that hart's message, clears the bit, and returns it.
///
/// Scans shires in ascending order and, within a shire, harts in ascending
/// order, so repeated calls drain a burst of messages deterministically
/// for tests; on real hardware no ordering across distinct senders is
/// guaranteed or needed.
pub fn poll_worker_messages<C: Chip>(chip: &C) -> Option<(HartId, Message)> {
    for shire in 0..abi::NUM_WORKER_SHIRES as u8 {
        if let Some(found) = poll_worker_messages_from_shire(chip, shire) {
            return Some(found);
        }
    }
    None
}

/// Same as [`poll_worker_messages`] but restricted to a single shire's flag
/// word. Lets a caller that already owns `shire`'s result (e.g. the launcher
/// closing out a kernel) check for and merge a second report from the same
/// shire without disturbing any other shire's pending flags.
pub fn poll_worker_messages_from_shire<C: Chip>(chip: &C, shire: u8) -> Option<(HartId, Message)> {
    let flags = chip.flag_read(shire);
    if flags == 0 {
        return None;
    }
    for hart_in_shire in 0..abi::HARTS_PER_SHIRE as u8 {
        if flags & (1 << hart_in_shire) == 0 {
            continue;
        }
        let hart = HartId::from_parts(shire, hart_in_shire >> 4, hart_in_shire & 0b1111);
        chip.evict_and_wait(CacheRegion::WorkerToMasterBuffer(hart), CacheDest::L3);
        let msg = chip.w2m_buffer_read(hart);
        // Clear only this hart's bit: a mask with every bit set except
        // this one, applied with a single AMO-AND, never clobbers a
        // sibling hart's pending flag.
        chip.flag_and(shire, !(1u64 << hart_in_shire));
        return Some((hart, msg));
    }
    None
}
