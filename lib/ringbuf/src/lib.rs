// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring buffer for debugging the dispatch firmware and its worker-hart loop.
//!
//! A static ring buffer designed to be read back by an external debugger
//! (or, on the host, a test) rather than pushed anywhere at runtime: there is
//! no I/O in this crate. The only constraint on the payload type is that it
//! be `Copy + PartialEq`, so that repeated identical entries can be folded
//! into a single entry with a `count`.
//!
//! ```
//! ringbuf::ringbuf!(u32, 16, 0);
//! ringbuf::ringbuf_entry!(1234);
//! ```
//!
//! Give it a name to keep more than one in scope at a time:
//!
//! ```
//! ringbuf::ringbuf!(LAUNCH_RINGBUF, u32, 16, 0);
//! ringbuf::ringbuf_entry!(LAUNCH_RINGBUF, 1234);
//! ```

#![no_std]

pub use static_cell::StaticCell;

/// Declares a ring buffer in the current module or context.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a ring buffer named `NAME`,
/// containing entries of type `Type`, with room for `N` such entries, all
/// initialized to `expr`. The resulting static's type is
/// `StaticCell<Ringbuf<T, N>>`. Omit the name to default to `__RINGBUF` (one
/// per module).
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::StaticCell<$crate::Ringbuf<$t, $n>> =
            $crate::StaticCell::new($crate::Ringbuf {
                last: None,
                buffer: [$crate::RingbufEntry {
                    line: 0,
                    generation: 0,
                    count: 0,
                    payload: $init,
                }; $n],
            });
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {};
    ($t:ty, $n:expr, $init:expr) => {};
}

/// Inserts `expr` into the ring buffer named `NAME` (or `__RINGBUF` if
/// omitted).
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate both buf and payload before either can observe the
        // other's binding.
        let (p, buf) = ($payload, &$buf);
        $crate::Ringbuf::entry(
            unsafe { $crate::StaticCell::borrow_mut(buf) },
            line!() as u16,
            p,
        );
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {};
    ($payload:expr) => {};
}

/// A single ring buffer entry, carrying a payload of arbitrary type. An entry
/// generated with an identical `line` and `payload` to the most recent one
/// increments `count` instead of consuming a new slot.
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

/// A ring buffer of parameterized entry type and size. Usually instantiated
/// via the [`ringbuf!`] macro rather than directly.
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    pub fn entry(&mut self, line: u16, payload: T) {
        let ndx = match self.last {
            None => 0,
            Some(last) => {
                let ent = &mut self.buffer[last];
                if ent.line == line && ent.payload == payload {
                    if let Some(new_count) = ent.count.checked_add(1) {
                        ent.count = new_count;
                        return;
                    }
                }
                if last + 1 >= self.buffer.len() {
                    0
                } else {
                    last + 1
                }
            }
        };

        let ent = &mut self.buffer[ndx];
        ent.line = line;
        ent.payload = payload;
        ent.count = 1;
        ent.generation = ent.generation.wrapping_add(1);

        self.last = Some(ndx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_folds_repeats() {
        let mut rb: Ringbuf<u32, 4> = Ringbuf {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: 0,
            }; 4],
        };

        rb.entry(10, 1);
        rb.entry(10, 1);
        rb.entry(10, 1);
        assert_eq!(rb.last, Some(0));
        assert_eq!(rb.buffer[0].count, 3);

        rb.entry(20, 2);
        assert_eq!(rb.last, Some(1));
        assert_eq!(rb.buffer[1].count, 1);
    }

    #[test]
    fn wraps_around() {
        let mut rb: Ringbuf<u32, 2> = Ringbuf {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: 0,
            }; 2],
        };

        rb.entry(1, 100);
        rb.entry(2, 200);
        rb.entry(3, 300);
        assert_eq!(rb.last, Some(0));
        assert_eq!(rb.buffer[0].payload, 300);
        assert_eq!(rb.buffer[1].payload, 200);
    }
}
