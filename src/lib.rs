// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Full-duplex SPI-slave transport core for a host-CPU/co-processor link.
//!
//! This crate owns exactly the hard part of that link: the transaction pump
//! that keeps a DMA-backed SPI-slave peripheral perpetually armed, the
//! HANDSHAKE/DATA_READY out-of-band signaling protocol, per-class priority
//! queueing over a fixed-size buffer pool, and the little-endian packet
//! header every transaction is framed with. Wi-Fi/BT/HCI/serial protocol
//! handling, configuration loading beyond [`config::Config`], and chip
//! bring-up live above this layer and are reached only through
//! [`transport::Transport::write`]/[`transport::Transport::read`] and the
//! [`event::PowerSaveEvent`] hook.
//!
//! `cfg(test)` unit tests run against `std` (they drive async code with
//! `futures::executor::block_on`); the crate itself stays `no_std` in every
//! other build.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod pool;
pub mod pump;
pub mod queue;
pub mod signals;
pub mod spi;
pub mod transport;

pub use config::Config;
pub use error::TransportError;
pub use event::PowerSaveEvent;
pub use frame::IfType;
pub use pump::{CsEdgePolicy, IsrState, PumpResources};
pub use signals::SignalLines;
pub use spi::{Completed, SpiSlaveQueue, Transaction};
pub use transport::Transport;

/// Re-exported so callers placing [`PumpResources`]/[`IsrState`] in `'static`
/// storage for a spawned pump task don't need their own direct dependency on
/// `static-cell`.
pub use static_cell::StaticCell;
