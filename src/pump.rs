// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The transaction pump: keeps the SPI slave hardware queue supplied with
//! exactly one ready transaction, drains and validates completed RX
//! buffers, and implements the two HANDSHAKE-deassert policies.
//!
//! Grounded directly on `queue_next_transaction`, `get_next_tx_buffer`,
//! `spi_post_setup_cb`, `spi_post_trans_cb`, and
//! `gpio_disable_hs_isr_handler` in the reference firmware; `Trace`/
//! `ringbuf_entry!` usage follows the tracing idiom of the pack's own
//! SPI drivers.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::error::TransportError;
use crate::frame::{self, IfType};
use crate::pool::{Pool, Slot};
use crate::queue::{Class, PriorityQueues, QueueItem};
use crate::signals::SignalLines;
use crate::spi::{SpiSlaveQueue, Transaction};

ringbuf::ringbuf!(RINGBUF, Trace, 32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trace {
    #[default]
    None,
    Armed {
        class: Option<Class>,
        len: usize,
    },
    Completed,
    Dropped(DropReason),
    PowerSave {
        sleeping: bool,
    },
    StartupEventSent,
    PoolExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Dummy,
    OffsetTooSmall,
    OutOfBounds,
    ChecksumMismatch,
}

fn drop_reason(err: crate::error::FrameError) -> DropReason {
    use crate::error::FrameError::*;
    match err {
        Dummy => DropReason::Dummy,
        OffsetTooSmall(_) => DropReason::OffsetTooSmall,
        OutOfBounds { .. } => DropReason::OutOfBounds,
        ChecksumMismatch { .. } => DropReason::ChecksumMismatch,
        EmptyPayload | PayloadTooLarge(..) => DropReason::OutOfBounds,
    }
}

/// Whichever of the two mutually exclusive deassert policies this build
/// selects. Chosen at build time via the `deassert-on-cs-edge` feature
/// (SPEC_FULL §4.5.4); kept as a runtime value here only so a single test
/// binary can exercise both code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsEdgePolicy {
    DeassertOnCompletion,
    DeassertOnCsEdge,
}

impl CsEdgePolicy {
    pub const fn from_feature() -> Self {
        if cfg!(feature = "deassert-on-cs-edge") {
            CsEdgePolicy::DeassertOnCsEdge
        } else {
            CsEdgePolicy::DeassertOnCompletion
        }
    }
}

/// ISR-safe signal posted by the CS-edge handler once the master has
/// released CS, unblocking the pump so it can re-arm.
pub type CsDeassertSignal = Signal<CriticalSectionRawMutex, ()>;

/// Shared state reachable from interrupt context: the signal lines and the
/// CS-deassert ticket. Interrupt callbacks touch only this, never the
/// pools or queues.
pub struct IsrState<HS, DR> {
    pub lines: critical_section::Mutex<core::cell::RefCell<SignalLines<HS, DR>>>,
    pub cs_deassert: CsDeassertSignal,
    pub policy: CsEdgePolicy,
}

impl<HS, DR> IsrState<HS, DR>
where
    HS: embedded_hal::digital::OutputPin,
    DR: embedded_hal::digital::OutputPin,
{
    pub fn new(lines: SignalLines<HS, DR>, policy: CsEdgePolicy) -> Self {
        Self {
            lines: critical_section::Mutex::new(core::cell::RefCell::new(lines)),
            cs_deassert: Signal::new(),
            policy,
        }
    }

    /// Post-setup callback: the transaction is armed and DMA is ready.
    /// Runs in interrupt context.
    pub fn on_post_setup(&self) {
        critical_section::with(|cs| {
            self.lines.borrow(cs).borrow_mut().assert_handshake();
        });
    }

    /// Post-transaction callback: the transaction has been fully clocked.
    /// Runs in interrupt context.
    pub fn on_post_transaction(&self) {
        if self.policy == CsEdgePolicy::DeassertOnCompletion {
            critical_section::with(|cs| {
                self.lines.borrow(cs).borrow_mut().deassert_handshake();
            });
        }
    }

    /// CS-edge interrupt handler. `cs_is_high` reflects the electrical
    /// level read directly from the pin at interrupt time. Runs in
    /// interrupt context; only used when `policy == DeassertOnCsEdge`.
    pub fn on_cs_edge(&self, cs_is_high: bool) {
        if self.policy != CsEdgePolicy::DeassertOnCsEdge {
            return;
        }
        if cs_is_high {
            self.cs_deassert.signal(());
        } else {
            critical_section::with(|cs| {
                self.lines.borrow(cs).borrow_mut().deassert_handshake();
            });
        }
    }

    /// Asserts DATA_READY. Called by `write` after enqueueing a frame, and
    /// by the startup-event emitter.
    pub(crate) fn assert_data_ready(&self) {
        critical_section::with(|cs| {
            self.lines.borrow(cs).borrow_mut().assert_data_ready();
        });
    }

    fn deassert_data_ready(&self) {
        critical_section::with(|cs| {
            self.lines.borrow(cs).borrow_mut().deassert_data_ready();
        });
    }
}

/// The pools, queues, and dummy buffer the pump and the public API share.
/// `Transport::init` places one of these in a `static_cell::StaticCell` and
/// hands out the resulting `&'static` to both the spawned pump task and
/// itself, the same way the pack's own drivers give `embassy_executor`
/// tasks `'static` access to board state without an owning struct that
/// borrows from itself.
pub struct PumpResources<const N: usize, const TXCAP: usize, const RXCAP: usize> {
    pub tx_pool: Pool<N, TXCAP>,
    pub rx_pool: Pool<N, RXCAP>,
    pub tx_queues: PriorityQueues<N, TXCAP>,
    pub rx_queues: PriorityQueues<N, RXCAP>,
    pub dummy: Slot<N>,
}

impl<const N: usize, const TXCAP: usize, const RXCAP: usize> PumpResources<N, TXCAP, RXCAP> {
    pub fn new() -> Self {
        let mut dummy = Slot::zeroed();
        frame::stamp_dummy(dummy.as_mut_slice());
        Self {
            tx_pool: Pool::new(),
            rx_pool: Pool::new(),
            tx_queues: PriorityQueues::new(),
            rx_queues: PriorityQueues::new(),
            dummy,
        }
    }
}

impl<const N: usize, const TXCAP: usize, const RXCAP: usize> Default
    for PumpResources<N, TXCAP, RXCAP>
{
    fn default() -> Self {
        Self::new()
    }
}

/// Picks the next TX buffer: the highest-priority queued real frame, or
/// the dummy buffer if every TX queue is empty. Deasserts DATA_READY in
/// the dummy case (SPEC_FULL §4.5.1, step 1).
fn next_tx_buffer<const N: usize, const TXCAP: usize, const RXCAP: usize, HS, DR>(
    resources: &PumpResources<N, TXCAP, RXCAP>,
    isr: &IsrState<HS, DR>,
) -> (Slot<N>, Option<Class>)
where
    HS: embedded_hal::digital::OutputPin,
    DR: embedded_hal::digital::OutputPin,
{
    if let Some(item) = resources.tx_queues.try_dequeue() {
        let class = Class::of_if_type(item.if_type);
        return (item.slot, Some(class));
    }
    isr.deassert_data_ready();
    (resources.dummy.clone(), None)
}

/// Arms the next transaction against the hardware queue (SPEC_FULL
/// §4.5.1).
pub async fn queue_next_transaction<const N: usize, const TXCAP: usize, const RXCAP: usize, HS, DR, Q>(
    spi: &mut Q,
    resources: &PumpResources<N, TXCAP, RXCAP>,
    isr: &IsrState<HS, DR>,
) -> Result<(), TransportError>
where
    HS: embedded_hal::digital::OutputPin,
    DR: embedded_hal::digital::OutputPin,
    Q: SpiSlaveQueue<N>,
{
    let (tx_slot, class) = next_tx_buffer(resources, isr);
    let rx_slot = match resources.rx_pool.alloc(true) {
        Ok(slot) => slot,
        Err(_) => {
            ringbuf::ringbuf_entry!(RINGBUF, Trace::PoolExhausted);
            return Err(TransportError::Pool(crate::error::PoolError::OutOfBuffers));
        }
    };
    ringbuf::ringbuf_entry!(
        RINGBUF,
        Trace::Armed {
            class,
            len: tx_slot.as_slice().len(),
        }
    );
    let trans = Transaction::new(tx_slot, rx_slot);
    spi.queue(trans).await
}

/// One iteration of the completion loop (SPEC_FULL §4.5.2): await a
/// completed transaction, re-arm immediately, then validate and route (or
/// drop) the received buffer.
#[allow(clippy::too_many_arguments)]
pub async fn run_once<const N: usize, const TXCAP: usize, const RXCAP: usize, HS, DR, Q>(
    spi: &mut Q,
    resources: &PumpResources<N, TXCAP, RXCAP>,
    isr: &IsrState<HS, DR>,
    checksum_enabled: bool,
    event_hook: Option<fn(crate::event::PowerSaveEvent)>,
) -> Result<(), TransportError>
where
    HS: embedded_hal::digital::OutputPin,
    DR: embedded_hal::digital::OutputPin,
    Q: SpiSlaveQueue<N>,
{
    let completed = spi.wait_result().await?;
    ringbuf::ringbuf_entry!(RINGBUF, Trace::Completed);

    if isr.policy == CsEdgePolicy::DeassertOnCsEdge {
        isr.cs_deassert.wait().await;
    }

    // Re-arm immediately to minimize dead time, before processing the
    // buffer just received.
    let _ = queue_next_transaction(spi, resources, isr).await;

    // Content rather than identity comparison: slots are owned byte arrays
    // with no pointer to compare, but `encode` never produces a real frame
    // with `len == 0`, so only the true dummy (if_type = MAX, len = 0, rest
    // zeroed) can match the dummy's bytes exactly.
    let was_dummy = completed.tx.as_slice() == resources.dummy.as_slice();

    match frame::decode(completed.rx.as_slice(), checksum_enabled) {
        Ok(decoded) => {
            if decoded.flags & frame::flags::POWER_SAVE_STARTED != 0 {
                ringbuf::ringbuf_entry!(RINGBUF, Trace::PowerSave { sleeping: true });
                if let Some(hook) = event_hook {
                    hook(crate::event::PowerSaveEvent::Started);
                }
            } else if decoded.flags & frame::flags::POWER_SAVE_STOPPED != 0 {
                ringbuf::ringbuf_entry!(RINGBUF, Trace::PowerSave { sleeping: false });
                if let Some(hook) = event_hook {
                    hook(crate::event::PowerSaveEvent::Stopped);
                }
            }

            let item = QueueItem {
                slot: completed.rx,
                if_type: decoded.if_type,
                if_num: decoded.if_num,
                payload_len: decoded.offset as usize + decoded.len as usize,
            };
            let class = Class::of_if_type(decoded.if_type);
            resources.rx_queues.enqueue(class, item).await;
        }
        Err(err) => {
            ringbuf::ringbuf_entry!(RINGBUF, Trace::Dropped(drop_reason(err)));
            resources.rx_pool.free(completed.rx);
        }
    }

    if !was_dummy {
        resources.tx_pool.free(completed.tx);
    }

    Ok(())
}

/// Records that the one-shot startup event was enqueued. Called from
/// [`crate::transport::Transport::init`], which has no other access to the
/// pump's ring buffer.
pub(crate) fn trace_startup_event_sent() {
    ringbuf::ringbuf_entry!(RINGBUF, Trace::StartupEventSent);
}

/// Drives `run_once` forever. Intended to be the body of the dedicated
/// pump task spawned by `embassy_executor` (SPEC_FULL §5); a single
/// `TransportError` from one iteration is not fatal (it is already traced
/// via the ring buffer by `run_once`) so the loop continues.
pub async fn run<const N: usize, const TXCAP: usize, const RXCAP: usize, HS, DR, Q>(
    mut spi: Q,
    resources: &PumpResources<N, TXCAP, RXCAP>,
    isr: &IsrState<HS, DR>,
    checksum_enabled: bool,
    event_hook: Option<fn(crate::event::PowerSaveEvent)>,
) -> !
where
    HS: embedded_hal::digital::OutputPin,
    DR: embedded_hal::digital::OutputPin,
    Q: SpiSlaveQueue<N>,
{
    loop {
        let _ = run_once(&mut spi, resources, isr, checksum_enabled, event_hook).await;
    }
}
