//! Hardware seams.
//!
//! The engine never touches registers itself. Boards implement these traits
//! (or use the provided blanket impls over `embedded-hal`) and hand the
//! implementations to a channel at construction.

use embedded_hal::digital::InputPin;

/// A 12-bit DAC channel written once per sample tick.
///
/// Called from the sample-rate interrupt, so implementations must not block
/// and cannot report errors; drivers that can fail should count failures.
pub trait DacWriter {
    /// Write a code in `0..=4095`.
    fn write(&mut self, value: u16);
}

/// An analog control input.
pub trait AnalogInput {
    /// Read the raw 12-bit conversion.
    ///
    /// Inputs are bipolar: 0 V reads as 2048 and +5 V as 4095. See
    /// [`control::analog`](crate::control::analog) for the remapping helpers.
    fn read_raw(&mut self) -> u16;
}

/// A digital trigger or gate input.
pub trait TriggerInput {
    /// `true` while the input is high.
    fn is_triggered(&mut self) -> bool;
}

impl<P: InputPin> TriggerInput for P {
    /// Read errors count as low so a flaky pin can never latch a trigger.
    fn is_triggered(&mut self) -> bool {
        InputPin::is_high(self).unwrap_or(false)
    }
}

/// Hardware timer identifier driving one channel's sample interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(pub u8);

/// Arms a periodic hardware timer whose interrupt calls
/// [`LooperVoice::interrupt_tick`](crate::channel::LooperVoice::interrupt_tick).
pub trait SampleClock {
    /// Start `timer` firing at `hz` interrupts per second.
    fn arm(&mut self, timer: TimerId, hz: u32);
}
