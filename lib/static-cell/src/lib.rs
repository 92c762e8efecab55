// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![no_std]

//! A cell suitable for `static` storage that is only ever mutably borrowed
//! from a single hardware thread of execution at a time.
//!
//! This runtime has no OS-level scheduler: every hart is a single
//! preemption-free thread pinned to its hardware context, so a `static`
//! owned exclusively by one hart (or serialized by a spinlock, as the
//! master-side broadcast slot is) never sees concurrent `&mut` access. That
//! is the invariant this type assumes and does not check.

use core::cell::UnsafeCell;

/// Wraps a `T` for placement in a `static`, handing out `&mut T` on demand.
///
/// # Safety contract
///
/// Callers must ensure that no two live `&mut T` borrows exist
/// simultaneously. On this runtime that means: only the hart that owns the
/// region (or holds the governing spinlock) may call [`borrow_mut`].
///
/// [`borrow_mut`]: StaticCell::borrow_mut
pub struct StaticCell<T> {
    cell: UnsafeCell<T>,
}

// Safety: access is serialized by convention (single-writer regions or an
// explicit spinlock), never by the type itself.
unsafe impl<T> Sync for StaticCell<T> {}

impl<T> StaticCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            cell: UnsafeCell::new(value),
        }
    }

    /// Obtains a mutable reference to the wrapped value.
    ///
    /// # Safety
    ///
    /// The caller must not hold another live reference (mutable or shared)
    /// to this cell's contents at the same time.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn borrow_mut(&self) -> &mut T {
        unsafe { &mut *self.cell.get() }
    }
}
