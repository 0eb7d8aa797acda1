// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pre-sized, DMA-aligned fixed-size buffer pools.
//!
//! Separate pools back TX buffers, RX buffers, and transaction descriptors,
//! mirroring the three `hosted_mempool` instances the reference firmware
//! creates up front instead of calling into a general allocator from
//! interrupt-reachable paths.

use critical_section::Mutex;
use heapless::Vec;

use crate::error::PoolError;

/// A buffer slot: a DMA-aligned, fixed-size, owned byte array.
///
/// `N` is the pool's slot size (`BUF_SIZE`), fixed for the lifetime of the
/// pool; `CAP` bounds the pool's slot storage (a `const` generic rather than
/// a runtime-checked array, since pool sizing is a build-time property per
/// SPEC_FULL §4.1).
#[repr(align(4))]
#[derive(Clone)]
pub struct Slot<const N: usize>(pub [u8; N]);

impl<const N: usize> Slot<N> {
    pub const fn zeroed() -> Self {
        Self([0u8; N])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// A fixed-capacity free list of pre-allocated, equally sized slots.
///
/// Safe to call from interrupt context: `alloc`/`free` take a short
/// `critical_section`, never block, and never touch a heap allocator.
pub struct Pool<const N: usize, const CAP: usize> {
    free: Mutex<core::cell::RefCell<Vec<Slot<N>, CAP>>>,
}

impl<const N: usize, const CAP: usize> Pool<N, CAP> {
    /// Builds a pool with all `CAP` slots pre-filled and zeroed.
    pub fn new() -> Self {
        let mut free: Vec<Slot<N>, CAP> = Vec::new();
        for _ in 0..CAP {
            // CAP is the pool's own capacity; this can never overflow.
            let _ = free.push(Slot::zeroed());
        }
        Self {
            free: Mutex::new(core::cell::RefCell::new(free)),
        }
    }

    /// Takes a slot from the pool. If `zero_fill` is false the slot's
    /// contents are whatever the previous owner left behind.
    pub fn alloc(&self, zero_fill: bool) -> Result<Slot<N>, PoolError> {
        critical_section::with(|cs| {
            let mut free = self.free.borrow(cs).borrow_mut();
            let mut slot = free.pop().ok_or(PoolError::OutOfBuffers)?;
            if zero_fill {
                for b in slot.as_mut_slice() {
                    *b = 0;
                }
            }
            Ok(slot)
        })
    }

    /// Returns a slot to the pool. Panics if the pool is already at
    /// capacity (a logic error: it means a slot was freed twice, or a slot
    /// not drawn from this pool was freed into it).
    pub fn free(&self, slot: Slot<N>) {
        critical_section::with(|cs| {
            let mut free = self.free.borrow(cs).borrow_mut();
            free.push(slot)
                .unwrap_or_else(|_| panic!("pool free-list overflow: double free?"));
        })
    }

    pub fn capacity(&self) -> usize {
        CAP
    }
}

impl<const N: usize, const CAP: usize> Default for Pool<N, CAP> {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the TX pool size for the given per-class queue depths and
/// hardware queue depth: `Σ depths + hardware_depth + 1`.
pub const fn tx_pool_size(total_tx_depth: usize, hardware_depth: usize) -> usize {
    total_tx_depth + hardware_depth + 1
}

/// Computes the RX pool size: `Σ depths + 2 × hardware_depth`.
pub const fn rx_pool_size(total_rx_depth: usize, hardware_depth: usize) -> usize {
    total_rx_depth + 2 * hardware_depth
}
