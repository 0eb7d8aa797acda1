// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error taxonomy for the transport core.

/// Errors raised by the fixed-size buffer pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PoolError {
    #[error("buffer pool exhausted")]
    OutOfBuffers,
}

/// Errors raised while encoding or decoding a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    #[error("payload is empty")]
    EmptyPayload,
    #[error("payload of {0} bytes does not fit in a {1}-byte buffer")]
    PayloadTooLarge(usize, usize),
    #[error("frame offset {0} is smaller than the header size")]
    OffsetTooSmall(u16),
    #[error("frame offset {offset} + len {len} exceeds buffer size {buf_size}")]
    OutOfBounds {
        offset: u16,
        len: u16,
        buf_size: usize,
    },
    #[error("checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },
    #[error("frame is a dummy (zero-length) frame")]
    Dummy,
}

/// Configuration errors, returned from `init` and fatal to the caller.
///
/// SPI mode 0 (unsupported in slave mode on this peripheral family) has no
/// variant here: [`crate::config::SpiMode`] simply has no `Mode0` member, so
/// that configuration error is rejected at the type level instead of at
/// `validate()` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("queue depth for class {0:?} must be non-zero")]
    ZeroQueueDepth(crate::queue::Class),
}

/// Top-level error type returned from the public transport API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    #[error("invalid argument")]
    InvalidArg,
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("underlying SPI peripheral reported an error")]
    Hardware,
}
