// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Worker-side log write path.
//!
//! Grounded on `examples/original_source/.../shared/src/log.c`:
//! `log_write` checks the record's level against the current filter
//! *before* sending anything over the fabric, so a filtered-out record
//! never costs a worker->master message. The original packs a
//! `printf`-style format string into the message payload from user mode;
//! this crate's wire format (`abi::WorkerToMaster::LogWrite`) carries two
//! typed `u64` words instead; the string-formatting boundary is part of
//! the out-of-scope trace/logging collaborator (`spec.md` §1).

use abi::{HartId, LogLevel, WorkerToMaster};
use kern::hw::Chip;

use crate::mailbox;

/// Sends a log record to the master if `level` passes `filter`. Mirrors
/// `log_write`'s level check happening before the message is built at all.
pub fn log_write<C: Chip>(chip: &C, hart: HartId, filter: LogLevel, level: LogLevel, word0: u64, word1: u64) {
    if !level.passes(filter) {
        return;
    }
    mailbox::send_to_master(chip, hart, WorkerToMaster::LogWrite { level, word0, word1 }.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use kern::hw::sim::SimChip;

    #[test]
    fn filtered_record_sends_nothing() {
        let chip = SimChip::new();
        let hart = HartId::from_parts(0, 0, 0);
        log_write(&chip, hart, LogLevel::Warn, LogLevel::Debug, 0, 0);
        assert_eq!(chip.flag_read(0), 0);
    }

    #[test]
    fn passing_record_sends_a_message() {
        let chip = SimChip::new();
        let hart = HartId::from_parts(0, 0, 0);
        log_write(&chip, hart, LogLevel::Info, LogLevel::Error, 7, 8);
        assert_ne!(chip.flag_read(0), 0);
    }
}
