// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Worker-side constants. Topology itself lives in `abi`; this module
//! holds the per-hart addressing and barrier/receiver conventions that
//! are specific to how a worker hart participates in the fabric.

/// Hart-in-shire index designated to perform the broadcast ACK increment
/// on behalf of its shire. `spec.md` §3 specifies "exactly one hart per
/// shire" increments the shared ACK counter even though every hart in the
/// shire independently observes and dispatches the same broadcast buffer;
/// this crate designates hart 0 of each shire as that one hart, mirroring
/// the worker->master fabric's own `MASTER_RECEIVER_HART_IN_SHIRE`
/// convention on the other side of the chip. [OPEN-QUESTION: the source
/// does not name which hart this is; see `DESIGN.md`.]
pub const BROADCAST_ACK_RECEIVER_HART_IN_SHIRE: u8 = 0;

/// FLB id workers use to elect the hart that reports per-shire kernel
/// completion to the master. Must match `kern::config::SHIRE_COMPLETION_BARRIER`
/// on the master side's expectations (the master never joins this barrier
/// itself, but both sides need to agree on the id for it to mean anything
/// across a debugger inspecting both).
pub const SHIRE_COMPLETION_BARRIER: u8 = kern::config::SHIRE_COMPLETION_BARRIER;

/// FLB id workers use to elect the hart that reports "every hart in this
/// shire has entered the kernel" back to the kernel's sync thread, via
/// `kern::config::SYNC_FCC_READY`. Distinct from `SHIRE_COMPLETION_BARRIER`:
/// entry and completion are different points in a kernel's lifecycle and
/// must not share a counter.
pub const SHIRE_ENTRY_BARRIER: u8 = 1;

/// Base address of the per-hart user-mode kernel stack region. Symbolic:
/// the real chip's value comes from the linker script, which this crate
/// never relocates or recomputes (`spec.md` §6). Matches
/// `examples/original_source/.../mm_iface.c`'s
/// `KERNEL_UMODE_STACK_BASE - (hart * KERNEL_UMODE_STACK_SIZE)` derivation
/// in spirit, scaled down to values usable without a real address space.
pub const KERNEL_UMODE_STACK_BASE: u64 = 0x8000_0000;

/// Per-hart stack size reserved within the user-mode stack region.
pub const KERNEL_UMODE_STACK_SIZE: u64 = 0x1_0000;

/// Derives hart `hart`'s user-mode kernel stack base address.
pub const fn kernel_stack_base(hart_in_shire: u8) -> u64 {
    KERNEL_UMODE_STACK_BASE - (hart_in_shire as u64 * KERNEL_UMODE_STACK_SIZE)
}
