// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Worker-side half of the MM<->CM message fabric
//! (`examples/original_source/.../WorkerMinion/src/mm_iface.c`'s
//! `mm_iface_process`, and the worker half of
//! `examples/original_source/.../shared/src/message.c`).
//!
//! Built against [`kern::hw::Chip`] so both sides of the fabric agree on
//! wire layout by construction; the master-side half lives in
//! `kern::fabric`.

use abi::{HartId, Message};
use kern::hw::{CacheDest, CacheRegion, Chip};

/// Checks the master->worker broadcast slot for a new message, in every
/// hart's own remembered `previous_broadcast_number`.
///
/// Every worker hart in a shire independently observes and dispatches the
/// same broadcast buffer (it is one region shared by the whole chip), but
/// `spec.md` §3 specifies that the ACK counter is incremented by "exactly
/// one hart per shire". This crate designates
/// [`crate::config::BROADCAST_ACK_RECEIVER_HART_IN_SHIRE`] as that hart.
pub fn poll_broadcast<C: Chip>(chip: &C, hart: HartId, previous_number: &mut u32) -> Option<Message> {
    // Evict to invalidate this hart's possibly-stale L1 copy before
    // reading the header, per `spec.md` §4.B.
    chip.evict_and_wait(CacheRegion::BroadcastSlot, CacheDest::L3);
    let buf = chip.broadcast_read();
    if buf.header.number == *previous_number {
        return None;
    }
    *previous_number = buf.header.number;
    if hart.hart_in_shire() == crate::config::BROADCAST_ACK_RECEIVER_HART_IN_SHIRE {
        chip.broadcast_ack_incr();
    }
    Some(Message::new(buf.header.id as u64, [
        buf.payload[0],
        buf.payload[1],
        buf.payload[2],
        buf.payload[3],
        buf.payload[4],
        buf.payload[5],
        0,
    ]))
}

/// Checks `hart`'s per-hart unicast slot. A present message (`id != NONE`)
/// is consumed (slot reset to `NONE`) so the master's spin-until-empty
/// producer side can reuse it.
pub fn poll_unicast<C: Chip>(chip: &C, hart: HartId) -> Option<Message> {
    let msg = chip.unicast_read(hart);
    if msg.id == abi::message::message_id::NONE {
        return None;
    }
    chip.unicast_write(hart, Message::EMPTY);
    Some(msg)
}

/// `message_send_worker`: spins while this hart's own flag bit is set
/// (an outstanding message the master hasn't read yet), writes `msg` into
/// this hart's slot, evicts to L3, raises the flag bit, and IPIs the
/// master's designated receiver hart.
pub fn send_to_master<C: Chip>(chip: &C, hart: HartId, msg: Message) {
    let shire = hart.shire_id();
    let bit = hart.hart_in_shire();
    while chip.flag_read(shire) & (1u64 << bit) != 0 {
        chip.fence();
        core::hint::spin_loop();
    }
    chip.w2m_buffer_write(hart, msg);
    chip.evict_and_wait(CacheRegion::WorkerToMasterBuffer(hart), CacheDest::L3);
    chip.flag_or(shire, bit);
    chip.fence();
    chip.ipi_trigger(abi::MASTER_SHIRE as u8, 1u64 << kern::config::MASTER_RECEIVER_HART_IN_SHIRE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kern::hw::sim::SimChip;

    #[test]
    fn broadcast_not_observed_twice() {
        let chip = SimChip::new();
        let hart = HartId::from_parts(0, 0, 0);
        let mut prev = 0;
        assert!(poll_broadcast(&chip, hart, &mut prev).is_none());

        chip.broadcast_write(abi::BroadcastBuffer {
            header: abi::BroadcastHeader { number: 1, id: abi::message::message_id::KERNEL_ABORT as u32 },
            payload: [0; 6],
        });
        let msg = poll_broadcast(&chip, hart, &mut prev).unwrap();
        assert_eq!(msg.id, abi::message::message_id::KERNEL_ABORT);
        assert!(poll_broadcast(&chip, hart, &mut prev).is_none());
    }

    #[test]
    fn only_designated_hart_acks() {
        let chip = SimChip::new();
        chip.broadcast_write(abi::BroadcastBuffer {
            header: abi::BroadcastHeader { number: 1, id: 0 },
            payload: [0; 6],
        });
        let mut prev_a = 0;
        let mut prev_b = 0;
        poll_broadcast(&chip, HartId::from_parts(1, 0, 0), &mut prev_a);
        assert_eq!(chip.broadcast_ack_read(), 1);
        poll_broadcast(&chip, HartId::from_parts(1, 0, 1), &mut prev_b);
        assert_eq!(chip.broadcast_ack_read(), 1);
    }

    #[test]
    fn unicast_poll_clears_slot() {
        let chip = SimChip::new();
        let hart = HartId::from_parts(2, 0, 0);
        chip.unicast_write(hart, Message::new(5, [0; 7]));
        let msg = poll_unicast(&chip, hart).unwrap();
        assert_eq!(msg.id, 5);
        assert!(poll_unicast(&chip, hart).is_none());
    }

    #[test]
    fn send_to_master_sets_flag_and_ipis() {
        let chip = SimChip::new();
        let hart = HartId::from_parts(4, 1, 3);
        send_to_master(&chip, hart, Message::new(9, [0; 7]));
        assert_eq!(chip.flag_read(4), 1u64 << hart.hart_in_shire());
        assert_eq!(chip.w2m_buffer_read(hart).id, 9);
        assert_eq!(chip.ipi_log().len(), 1);
    }
}
