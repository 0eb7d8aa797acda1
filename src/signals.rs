// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The two slave-driven output lines (HANDSHAKE, DATA_READY) plus the
//! CS-edge input, expressed over `embedded-hal` digital traits so the core
//! stays portable across target boards rather than tied to one PAC.

use embedded_hal::digital::{InputPin, OutputPin};

/// The two GPIO output lines the slave drives to signal the master.
///
/// Both start deasserted; pull resistors must be configured by the caller
/// before the SPI peripheral is enabled, to avoid spurious pulses while no
/// master is attached.
pub struct SignalLines<HS, DR> {
    handshake: HS,
    data_ready: DR,
}

impl<HS, DR> SignalLines<HS, DR>
where
    HS: OutputPin,
    DR: OutputPin,
{
    /// Takes ownership of the two already-configured output pins and drives
    /// both low.
    pub fn new(mut handshake: HS, mut data_ready: DR) -> Result<Self, HS::Error>
    where
        HS::Error: From<DR::Error>,
    {
        handshake.set_low()?;
        data_ready.set_low().map_err(HS::Error::from)?;
        Ok(Self {
            handshake,
            data_ready,
        })
    }

    /// Asserts HANDSHAKE high. Called from the post-setup interrupt
    /// callback; must not allocate or block.
    pub fn assert_handshake(&mut self) {
        let _ = self.handshake.set_high();
    }

    /// Deasserts HANDSHAKE. Called either from the post-transaction
    /// callback (deassert-on-completion policy) or from the CS-edge
    /// handler (deassert-on-CS-edge policy).
    pub fn deassert_handshake(&mut self) {
        let _ = self.handshake.set_low();
    }

    /// Asserts DATA_READY high: at least one real frame is queued for TX.
    pub fn assert_data_ready(&mut self) {
        let _ = self.data_ready.set_high();
    }

    /// Deasserts DATA_READY: the pump found every TX queue empty.
    pub fn deassert_data_ready(&mut self) {
        let _ = self.data_ready.set_low();
    }
}

/// The chip-select edge input, read from the CS-edge interrupt handler to
/// implement the "deassert on CS edge" policy.
pub struct CsEdge<CS> {
    cs: CS,
}

impl<CS: InputPin> CsEdge<CS> {
    pub fn new(cs: CS) -> Self {
        Self { cs }
    }

    /// True while the master holds CS asserted (electrically low).
    pub fn is_asserted(&mut self) -> bool {
        self.cs.is_low().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct FakePin {
        high: bool,
    }

    impl embedded_hal::digital::ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            Ok(())
        }
    }

    impl InputPin for FakePin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.high)
        }
        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.high)
        }
    }

    #[test]
    fn lines_start_deasserted_and_toggle() {
        let hs = FakePin { high: true };
        let dr = FakePin { high: true };
        let mut lines = SignalLines::new(hs, dr).unwrap();
        lines.assert_handshake();
        lines.assert_data_ready();
        lines.deassert_handshake();
        lines.deassert_data_ready();
    }

    #[test]
    fn cs_edge_reads_level() {
        let mut edge = CsEdge::new(FakePin { high: false });
        assert!(edge.is_asserted());
    }
}
