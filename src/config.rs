// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build-time (and init-time) configuration surface.
//!
//! Pin assignment and queue depths are the things the reference firmware
//! expresses as `sdkconfig` defines; here they are plain `Config` fields
//! validated once in [`crate::transport::Transport::init`]. The choice
//! between the "deassert HANDSHAKE on completion" and "deassert on CS edge"
//! policies changes which interrupt handler exists at all, so it stays a
//! Cargo feature (`deassert-on-cs-edge`) rather than a runtime field.

use crate::error::ConfigError;
use crate::queue::Class;

/// SPI clock phase/polarity. Mode 0 is electrically unsupported by the
/// slave peripheral this core targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiMode {
    Mode1,
    Mode2,
    Mode3,
}

/// Per-class bounded queue depths, independently configurable for TX and RX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueDepths {
    pub serial: usize,
    pub bluetooth: usize,
    pub others: usize,
}

impl QueueDepths {
    pub const fn total(&self) -> usize {
        self.serial + self.bluetooth + self.others
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.serial == 0 {
            return Err(ConfigError::ZeroQueueDepth(Class::Serial));
        }
        if self.bluetooth == 0 {
            return Err(ConfigError::ZeroQueueDepth(Class::Bluetooth));
        }
        if self.others == 0 {
            return Err(ConfigError::ZeroQueueDepth(Class::Others));
        }
        Ok(())
    }
}

impl Default for QueueDepths {
    fn default() -> Self {
        // Matches the reference firmware's Kconfig defaults.
        Self {
            serial: 5,
            bluetooth: 20,
            others: 20,
        }
    }
}

/// Depth of the SPI peripheral's own hardware transaction queue.
pub const HARDWARE_QUEUE_DEPTH: usize = 3;

/// Runtime configuration consumed by [`crate::transport::Transport::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub spi_mode: SpiMode,
    pub tx_depths: QueueDepths,
    pub rx_depths: QueueDepths,
    pub checksum_enabled: bool,
    /// Firmware capability byte advertised in the startup event.
    pub capabilities: u8,
    /// Raw-throughput test capability advertised in the startup event.
    pub raw_tp_capability: u8,
    pub chip_id: u8,
    pub firmware_version: FirmwareVersion,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spi_mode: SpiMode::Mode1,
            tx_depths: QueueDepths::default(),
            rx_depths: QueueDepths::default(),
            checksum_enabled: true,
            capabilities: 0,
            raw_tp_capability: 0,
            chip_id: 0,
            firmware_version: FirmwareVersion::default(),
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.tx_depths.validate()?;
        self.rx_depths.validate()?;
        Ok(())
    }
}

/// Fixed-size firmware version blob, copied verbatim into the startup event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, zerocopy::AsBytes, zerocopy::FromBytes)]
#[repr(C)]
pub struct FirmwareVersion {
    pub major1: u8,
    pub major2: u8,
    pub minor: u8,
    pub revision_patch_1: u8,
    pub revision_patch_2: u8,
}
