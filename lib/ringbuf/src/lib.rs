// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A tiny ring buffer for recording trace events from interrupt-context or
//! task-context code without allocating or blocking.
//!
//! Each module that wants a ring buffer declares one with [`ringbuf!`],
//! giving it a name, an entry type, and a depth. Call sites then use
//! [`ringbuf_entry!`] to push a new entry. None of this allocates or can
//! fail: when the buffer is full, the oldest entry is silently
//! overwritten.

#![no_std]

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

pub use static_cell::StaticCell;

/// A single slot in a ring buffer: the payload plus how many times this
/// exact payload has repeated back-to-back, and a generation counter so
/// readers can detect wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingbufEntry<T> {
    pub payload: T,
    pub count: u32,
}

impl<T: Default> Default for RingbufEntry<T> {
    fn default() -> Self {
        Self {
            payload: T::default(),
            count: 0,
        }
    }
}

/// Trait implemented for any type that can be recorded into a ring buffer.
/// Provided so that generic code (and the macros below) don't need to know
/// the concrete entry type.
pub trait RecordEntry<T> {
    fn record(&self, payload: T);
}

/// A fixed-depth ring buffer of `N` entries of type `T`.
///
/// `Ringbuf` is `Sync` and intended to live in a `static`; all methods take
/// `&self` and use only atomics and a critical section, so it is safe to
/// call from interrupt context. Slots start empty (`None`) rather than a
/// zeroed `T`, since nothing here requires `T`'s all-zero bit pattern to be
/// a valid value.
pub struct Ringbuf<T, const N: usize> {
    last: AtomicU32,
    entries: [critical_section::Mutex<Cell<Option<RingbufEntry<T>>>>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    pub const fn new() -> Self {
        Self {
            last: AtomicU32::new(0),
            entries: [const { critical_section::Mutex::new(Cell::new(None)) }; N],
        }
    }
}

impl<T: Copy + PartialEq, const N: usize> Default for Ringbuf<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + PartialEq, const N: usize> RecordEntry<T> for Ringbuf<T, N> {
    fn record(&self, payload: T) {
        critical_section::with(|cs| {
            let last = self.last.load(Ordering::Relaxed) as usize % N;
            let cell = &self.entries[last];
            if let Some(prev) = cell.borrow(cs).get() {
                if prev.payload == payload && prev.count < u32::MAX {
                    cell.borrow(cs).set(Some(RingbufEntry {
                        payload,
                        count: prev.count + 1,
                    }));
                    return;
                }
            }
            let next = (last + 1) % N;
            self.entries[next]
                .borrow(cs)
                .set(Some(RingbufEntry { payload, count: 1 }));
            self.last.store(next as u32, Ordering::Relaxed);
        });
    }
}

/// Declares a static ring buffer in the current module.
///
/// ```ignore
/// ringbuf!(Trace, 16, Trace::None);
/// ```
///
/// declares `static TRACE_RINGBUF: Ringbuf<Trace, 16>` (name derived by
/// upper-casing and appending `_RINGBUF`) initialized with `Trace::None`
/// repeated. Use [`ringbuf_entry!`] to record into it.
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $type:ty, $depth:expr) => {
        $crate::paste_ringbuf!($name, $type, $depth);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! paste_ringbuf {
    ($name:ident, $type:ty, $depth:expr) => {
        #[allow(non_upper_case_globals)]
        static $name: $crate::Ringbuf<$type, $depth> = $crate::Ringbuf::new();
    };
}

/// Records `$payload` into the ring buffer declared as `$name`.
#[macro_export]
macro_rules! ringbuf_entry {
    ($name:expr, $payload:expr) => {
        $crate::RecordEntry::record(&$name, $payload)
    };
}

/// Like [`ringbuf_entry!`], but for the common case of a single
/// module-level buffer named `RINGBUF` declared with [`ringbuf_entry_root!`]'s
/// companion declaration `ringbuf!(RINGBUF, ..)`.
#[macro_export]
macro_rules! ringbuf_entry_root {
    ($payload:expr) => {
        $crate::ringbuf_entry!(RINGBUF, $payload)
    };
}
