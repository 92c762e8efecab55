// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unconditional diagnostic logging for boot messages and panics.
//!
//! Everything that isn't unconditional -- launch decisions, shire
//! transitions, broadcast sends -- goes through a per-module ring buffer
//! instead (see [`crate::shire::SHIRE_RINGBUF`], [`crate::fabric`],
//! [`crate::launch::LAUNCH_RINGBUF`]), which costs no I/O and is read back
//! by a debugger rather than printed live.
//!
//! This chip has no ITM-equivalent trace peripheral and no semihosting
//! debug channel, so unlike a Cortex-M target there is only one real
//! target-side backend to gate: silence. `klog!` compiles to a no-op on
//! the real target and to `eprintln!` when built for the host, which is
//! what makes it usable from tests without pulling in a logging crate.

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        #[macro_export]
        macro_rules! klog {
            ($s:expr) => {};
            ($s:expr, $($tt:tt)*) => {};
        }
    } else {
        #[macro_export]
        macro_rules! klog {
            ($s:expr) => { ::std::eprintln!($s); };
            ($s:expr, $($tt:tt)*) => { ::std::eprintln!($s, $($tt)*); };
        }
    }
}
