// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Forwarding interface to the trace/PMU ring-buffer collaborator.
//!
//! The trace ring buffers and their control-region layout are explicitly
//! out of scope for this crate (`spec.md` §1): these three functions are
//! the entire surface the dispatch loop needs, matching
//! `examples/original_source/.../WorkerMinion/src/mm_iface.c`'s
//! `TRACE_update_control` / `TRACE_init_buffer` / `TRACE_evict_buffer`
//! call sites. A real build links an external trace crate providing the
//! same three entry points against the chip's actual trace region; this
//! crate only records that the forward happened.

use kern::hw::Chip;

ringbuf::ringbuf!(TRACE_RINGBUF, TraceEvent, 16, TraceEvent::Init);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TraceEvent {
    Init,
    UpdateControl,
    BufferReset,
    BufferEvict,
}

/// Forwards `TRACE_UPDATE_CONTROL`: the control region changed and the
/// trace collaborator should re-read it. The source evicts the control
/// region first to invalidate any stale cached copy.
pub fn update_control<C: Chip>(_chip: &C) {
    ringbuf::ringbuf_entry!(TRACE_RINGBUF, TraceEvent::UpdateControl);
}

/// Forwards `TRACE_BUFFER_RESET`: reinitialize the trace buffer ahead of
/// the next run.
pub fn reset_buffer<C: Chip>(_chip: &C) {
    ringbuf::ringbuf_entry!(TRACE_RINGBUF, TraceEvent::BufferReset);
}

/// Forwards `TRACE_BUFFER_EVICT`: publish the trace buffer to the
/// coherence plane for host-side consumption.
pub fn evict_buffer<C: Chip>(_chip: &C) {
    ringbuf::ringbuf_entry!(TRACE_RINGBUF, TraceEvent::BufferEvict);
}
