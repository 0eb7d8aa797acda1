// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The public transport API: `init`, `write`, `read`, `reset`, `deinit`
//! (SPEC_FULL §4.6), plus the one-shot startup-event emitter (§4.5.5).
//!
//! Grounded on the reference firmware's `esp_spi_write`/`esp_spi_read`/
//! `esp_spi_reset`/`esp_spi_deinit`/`generate_startup_event`; the "release
//! hook" the spec describes for a received buffer becomes a `Drop` impl on
//! [`RxFrame`] rather than a function pointer the caller must remember to
//! invoke, the idiomatic Rust shape for the same obligation.

use core::cell::Cell;

use crate::config::Config;
use crate::error::TransportError;
use crate::frame::{self, IfType};
use crate::pool::{Pool, Slot};
use crate::pump::{self, IsrState, PumpResources};
use crate::queue::{Class, QueueItem};
use crate::spi::SpiSlaveQueue;

/// TLV tags used by the startup event (SPEC_FULL §4.5.5 / S6).
mod startup_tlv {
    pub const CHIP_ID: u8 = 1;
    pub const CAPABILITY: u8 = 2;
    pub const TEST_RAW_TP: u8 = 3;
    pub const FW_DATA: u8 = 4;
}

/// A received frame, borrowed from an RX pool slot. Dropping it returns the
/// slot to the pool; callers that need the bytes past that point must copy
/// them out first.
pub struct RxFrame<'a, const N: usize, const RXCAP: usize> {
    item: Option<QueueItem<N>>,
    rx_pool: &'a Pool<N, RXCAP>,
}

impl<'a, const N: usize, const RXCAP: usize> RxFrame<'a, N, RXCAP> {
    pub fn if_type(&self) -> u8 {
        self.item.as_ref().expect("item present until drop").if_type
    }

    pub fn if_num(&self) -> u8 {
        self.item.as_ref().expect("item present until drop").if_num
    }

    pub fn payload(&self) -> &[u8] {
        let item = self.item.as_ref().expect("item present until drop");
        &item.slot.as_slice()[..item.payload_len]
    }
}

impl<'a, const N: usize, const RXCAP: usize> Drop for RxFrame<'a, N, RXCAP> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.rx_pool.free(item.slot);
        }
    }
}

/// The transport handle. Cheap to clone by re-borrowing: every field is a
/// shared reference into the `'static` resources `init` set up, so multiple
/// producers can hold their own `Transport` and call `write` concurrently.
pub struct Transport<'a, const N: usize, const TXCAP: usize, const RXCAP: usize, HS, DR, Q> {
    config: Config,
    resources: &'a PumpResources<N, TXCAP, RXCAP>,
    isr: &'a IsrState<HS, DR>,
    spi: Q,
    seq_num: critical_section::Mutex<Cell<u16>>,
}

impl<'a, const N: usize, const TXCAP: usize, const RXCAP: usize, HS, DR, Q>
    Transport<'a, N, TXCAP, RXCAP, HS, DR, Q>
where
    HS: embedded_hal::digital::OutputPin,
    DR: embedded_hal::digital::OutputPin,
    Q: SpiSlaveQueue<N>,
{
    /// Validates `config`, wires up a transport handle over already
    /// constructed resources/ISR state/hardware queue, and emits the
    /// startup event once.
    ///
    /// `resources` and `isr` are expected to live in `'static` storage (a
    /// `static_cell::StaticCell`, as real firmware places its mempools);
    /// the caller is responsible for spawning [`pump::run`] as a separate
    /// async task over the same `resources`/`isr` and its own `Q` handle
    /// before calling `init`, so the pump is ready to drain the startup
    /// event this call queues.
    pub async fn init(
        config: Config,
        resources: &'a PumpResources<N, TXCAP, RXCAP>,
        isr: &'a IsrState<HS, DR>,
        mut spi: Q,
    ) -> Result<Self, TransportError> {
        config.validate()?;

        let mut transport = Self {
            config,
            resources,
            isr,
            spi,
            seq_num: critical_section::Mutex::new(Cell::new(0)),
        };

        transport.emit_startup_event().await?;
        Ok(transport)
    }

    fn next_seq_num(&self) -> u16 {
        critical_section::with(|cs| {
            let cell = self.seq_num.borrow(cs);
            let seq = cell.get();
            cell.set(seq.wrapping_add(1));
            seq
        })
    }

    /// Encodes and enqueues `payload`, classifying it by `if_type`
    /// (SPEC_FULL §4.3, §4.4), then asserts DATA_READY.
    pub async fn write(
        &self,
        if_type: u8,
        if_num: u8,
        flags: u8,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if payload.is_empty() {
            return Err(TransportError::InvalidArg);
        }

        let mut slot = self.resources.tx_pool.alloc(false)?;
        let seq_num = self.next_seq_num();
        frame::encode(
            slot.as_mut_slice(),
            if_type,
            if_num,
            flags,
            seq_num,
            payload,
            self.config.checksum_enabled,
        )?;

        let payload_len = frame::dma_align(frame::HEADER_SIZE + payload.len());
        let item = QueueItem {
            slot,
            if_type,
            if_num,
            payload_len,
        };
        let class = Class::of_if_type(if_type);
        self.resources.tx_queues.enqueue(class, item).await;
        self.isr.assert_data_ready();
        Ok(())
    }

    /// Suspends until a frame is available on any RX priority queue
    /// (serial, then bluetooth, then others), and returns it.
    pub async fn read(&self) -> RxFrame<'a, N, RXCAP> {
        let item = self.resources.rx_queues.dequeue().await;
        RxFrame {
            item: Some(item),
            rx_pool: &self.resources.rx_pool,
        }
    }

    /// Releases and re-acquires the underlying SPI bus. Queued frames and
    /// pool contents are unaffected.
    pub async fn reset(&mut self) -> Result<(), TransportError> {
        self.spi.reset().await
    }

    /// Tears down the underlying SPI peripheral. The transport handle must
    /// not be used for `write`/`read` afterward.
    pub async fn deinit(mut self) -> Result<(), TransportError> {
        self.spi.deinit().await
    }

    /// Synthesizes the one-shot startup-event frame (SPEC_FULL §4.5.5),
    /// enqueues it on the lowest-priority TX queue, asserts DATA_READY, and
    /// primes the pump by arming the first transaction explicitly.
    async fn emit_startup_event(&mut self) -> Result<(), TransportError> {
        let mut slot = self.resources.tx_pool.alloc(true)?;
        let buf = slot.as_mut_slice();

        let mut tlv = [0u8; 16];
        let mut len = 0usize;

        tlv[len] = startup_tlv::CHIP_ID;
        tlv[len + 1] = 1;
        tlv[len + 2] = self.config.chip_id;
        len += 3;

        tlv[len] = startup_tlv::CAPABILITY;
        tlv[len + 1] = 1;
        tlv[len + 2] = self.config.capabilities;
        len += 3;

        tlv[len] = startup_tlv::TEST_RAW_TP;
        tlv[len + 1] = 1;
        tlv[len + 2] = self.config.raw_tp_capability;
        len += 3;

        let fw_bytes = zerocopy::AsBytes::as_bytes(&self.config.firmware_version);
        tlv[len] = startup_tlv::FW_DATA;
        tlv[len + 1] = fw_bytes.len() as u8;
        tlv[len + 2..len + 2 + fw_bytes.len()].copy_from_slice(fw_bytes);
        len += 2 + fw_bytes.len();

        let seq_num = self.next_seq_num();
        frame::encode(
            buf,
            IfType::Priv as u8,
            0,
            0,
            seq_num,
            &tlv[..len],
            self.config.checksum_enabled,
        )?;

        let payload_len = frame::dma_align(frame::HEADER_SIZE + len);
        let item = QueueItem {
            slot,
            if_type: IfType::Priv as u8,
            if_num: 0,
            payload_len,
        };
        self.resources.tx_queues.enqueue(Class::Others, item).await;
        self.isr.assert_data_ready();

        pump::trace_startup_event_sent();
        pump::queue_next_transaction(&mut self.spi, self.resources, self.isr).await
    }
}
