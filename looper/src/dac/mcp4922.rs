//! MCP4922 dual 12-bit SPI DAC driver.
//!
//! Each write is one 16-bit frame, MSB first:
//!
//! | Bit | Name | Meaning |
//! |-----|------|---------|
//! | 15 | A/B | 0 = channel A, 1 = channel B |
//! | 14 | BUF | reference input buffered |
//! | 13 | GA | 1 = 1x gain, 0 = 2x gain |
//! | 12 | SHDN | 1 = output active, 0 = output shut down |
//! | 11–0 | D | output code |
//!
//! The driver is generic over any [`embedded_hal::spi::SpiDevice`], which
//! owns chip select. One driver instance drives one channel; two drivers on
//! the same bus (via a bus-sharing `SpiDevice`) cover both outputs.

use embedded_hal::spi::SpiDevice;

use crate::constants::DAC_MAX;
use crate::hal::DacWriter;

const CHANNEL_B: u16 = 1 << 15;
const BUFFERED: u16 = 1 << 14;
const GAIN_1X: u16 = 1 << 13;
const ACTIVE: u16 = 1 << 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DacChannel {
    A,
    B,
}

/// Output amplifier gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gain {
    #[default]
    X1,
    X2,
}

pub struct Mcp4922<SPI> {
    spi: SPI,
    channel: DacChannel,
    buffered: bool,
    gain: Gain,
    active: bool,
    /// Failed writes through the infallible [`DacWriter`] path.
    errors: u32,
}

impl<SPI: SpiDevice> Mcp4922<SPI> {
    /// Unbuffered reference, 1x gain, output active.
    pub fn new(spi: SPI, channel: DacChannel) -> Self {
        Mcp4922 {
            spi,
            channel,
            buffered: false,
            gain: Gain::X1,
            active: true,
            errors: 0,
        }
    }

    pub fn with_buffered(mut self, buffered: bool) -> Self {
        self.buffered = buffered;
        self
    }

    pub fn with_gain(mut self, gain: Gain) -> Self {
        self.gain = gain;
        self
    }

    /// Command frame for `code` with the current settings.
    pub fn frame(&self, code: u16) -> u16 {
        let mut frame = code.min(DAC_MAX);
        if self.channel == DacChannel::B {
            frame |= CHANNEL_B;
        }
        if self.buffered {
            frame |= BUFFERED;
        }
        if self.gain == Gain::X1 {
            frame |= GAIN_1X;
        }
        if self.active {
            frame |= ACTIVE;
        }
        frame
    }

    /// Set the output to `code` (clamped to 4095).
    pub fn write_code(&mut self, code: u16) -> Result<(), SPI::Error> {
        let frame = self.frame(code);
        self.spi.write(&frame.to_be_bytes())
    }

    /// Put the output into its high-impedance shutdown state.
    pub fn shutdown(&mut self) -> Result<(), SPI::Error> {
        self.active = false;
        self.write_code(0)
    }

    /// Leave shutdown. The output stays at `code`.
    pub fn wake(&mut self, code: u16) -> Result<(), SPI::Error> {
        self.active = true;
        self.write_code(code)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn error_count(&self) -> u32 {
        self.errors
    }

    /// Release the SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> DacWriter for Mcp4922<SPI> {
    #[inline]
    fn write(&mut self, value: u16) {
        if self.write_code(value).is_err() {
            self.errors = self.errors.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::spi::{self, ErrorType, Operation};
    use std::vec::Vec;

    // ── Mock SPI device recording frames ──────────────────────────────

    #[derive(Debug)]
    struct MockError;

    impl spi::Error for MockError {
        fn kind(&self) -> spi::ErrorKind {
            spi::ErrorKind::Other
        }
    }

    #[derive(Default)]
    struct MockSpi {
        frames: Vec<u16>,
        fail: bool,
    }

    impl ErrorType for MockSpi {
        type Error = MockError;
    }

    impl SpiDevice for MockSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), MockError> {
            if self.fail {
                return Err(MockError);
            }
            for op in operations.iter() {
                if let Operation::Write(bytes) = op {
                    assert_eq!(bytes.len(), 2);
                    self.frames.push(u16::from_be_bytes([bytes[0], bytes[1]]));
                }
            }
            Ok(())
        }
    }

    #[test]
    fn channel_a_default_frame() {
        let mut dac = Mcp4922::new(MockSpi::default(), DacChannel::A);
        dac.write_code(0x0ABC).unwrap();
        let spi = dac.release();
        assert_eq!(spi.frames, [0x3ABC]);
    }

    #[test]
    fn channel_b_buffered_double_gain() {
        let mut dac = Mcp4922::new(MockSpi::default(), DacChannel::B)
            .with_buffered(true)
            .with_gain(Gain::X2);
        dac.write_code(4095).unwrap();
        assert_eq!(dac.release().frames, [0xDFFF]);
    }

    #[test]
    fn codes_clamp_to_twelve_bits() {
        let mut dac = Mcp4922::new(MockSpi::default(), DacChannel::A);
        dac.write_code(0xFFFF).unwrap();
        assert_eq!(dac.frame(5000) & 0x0FFF, 0x0FFF);
        assert_eq!(dac.release().frames, [0x3FFF]);
    }

    #[test]
    fn shutdown_and_wake() {
        let mut dac = Mcp4922::new(MockSpi::default(), DacChannel::A);
        dac.shutdown().unwrap();
        assert!(!dac.is_active());
        dac.wake(2048).unwrap();
        assert!(dac.is_active());
        assert_eq!(dac.release().frames, [0x2000, 0x3800]);
    }

    #[test]
    fn dac_writer_counts_errors() {
        let spi = MockSpi {
            fail: true,
            ..MockSpi::default()
        };
        let mut dac = Mcp4922::new(spi, DacChannel::A);
        DacWriter::write(&mut dac, 100);
        DacWriter::write(&mut dac, 200);
        assert_eq!(dac.error_count(), 2);
        assert!(dac.release().frames.is_empty());
    }
}
