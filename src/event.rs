// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The single synchronous power-save/lifecycle callback (SPEC_FULL §4.7).
//!
//! Grounded on the reference firmware's `context.event_handler`, invoked
//! from `process_spi_rx` before the frame is queued for normal `read`.

/// The two events this core ever raises. The hook must return quickly and
/// must not call back into `write`/`read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSaveEvent {
    /// The host informed the slave it is entering power-save.
    Started,
    /// The host informed the slave it has woken back up.
    Stopped,
}
