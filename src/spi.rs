// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The SPI-slave hardware transaction queue abstraction.
//!
//! No `embedded-hal` trait models SPI *slave* transaction queueing (the
//! ecosystem trait set is master-oriented, as seen in the pack's own
//! `SpiServer`/`SpiDevice` controller traits). This trait is this crate's
//! equivalent seam: a real board driver implements it against the
//! peripheral's own `post_setup_cb`/`post_trans_cb`/completion-queue API.

use crate::error::TransportError;
use crate::pool::Slot;

/// One armed SPI slave transaction: a fixed-size TX buffer, a fixed-size RX
/// buffer, and the bit length clocked (always `BUF_SIZE * 8`).
pub struct Transaction<const N: usize> {
    pub tx: Slot<N>,
    pub rx: Slot<N>,
    pub bit_len: usize,
}

impl<const N: usize> Transaction<N> {
    pub fn new(tx: Slot<N>, rx: Slot<N>) -> Self {
        Self {
            tx,
            rx,
            bit_len: N * 8,
        }
    }
}

/// A completed transaction, handed back with its RX half filled in by the
/// peripheral.
pub struct Completed<const N: usize> {
    pub tx: Slot<N>,
    pub rx: Slot<N>,
}

/// The hardware-queue seam the transaction pump drives.
///
/// Implementations own the actual SPI peripheral. `queue` and `wait_result`
/// are async because both may suspend: `queue` when the peripheral's own
/// hardware queue (bounded, depth [`crate::config::HARDWARE_QUEUE_DEPTH`])
/// is full, `wait_result` until the master has clocked a transaction
/// through.
pub trait SpiSlaveQueue<const N: usize> {
    /// Submits a transaction to the peripheral's hardware queue, suspending
    /// if that queue is already full.
    async fn queue(&mut self, trans: Transaction<N>) -> Result<(), TransportError>;

    /// Suspends until the oldest queued transaction completes, returning
    /// its buffers.
    async fn wait_result(&mut self) -> Result<Completed<N>, TransportError>;

    /// Releases and re-acquires the SPI bus, discarding any in-flight
    /// transaction. Does not affect buffer pools or queues.
    async fn reset(&mut self) -> Result<(), TransportError>;

    /// Tears down the peripheral. The handle must not be used afterward.
    async fn deinit(&mut self) -> Result<(), TransportError>;
}
