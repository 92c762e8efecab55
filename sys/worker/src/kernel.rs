// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The call/return boundary between firmware and user-kernel code.
//!
//! Compute-kernel bodies themselves (tensor ops, test kernels) are user
//! code the runtime loads and jumps to; out of scope for this crate
//! (`spec.md` §1). What this crate models is only the boundary: a kernel
//! entry point is handed a [`crate::KernelContext`] and returns a
//! [`KernelOutcome`] describing how it left user-mode.

/// How a launched kernel body returned control to firmware.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KernelOutcome {
    /// Normal completion, via the `RETURN_FROM_KERNEL` syscall or falling
    /// off the end of the kernel function.
    Completed,
    /// The kernel unwound early because [`crate::KernelContext::abort_requested`]
    /// reported a pending `KERNEL_ABORT`.
    Aborted,
    /// A trap in user-mode code converted to an error report rather than
    /// propagating up through firmware.
    Exception { fault_code: u64 },
}
