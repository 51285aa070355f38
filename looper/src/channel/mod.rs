//! Output channels.
//!
//! A channel owns its loops and one DAC output. Each channel is split into a
//! cooperative half, driven once per millisecond through [`Channel`], and an
//! interrupt half that produces one DAC sample per hardware timer tick.

mod envelope;
mod looper;

pub use envelope::{EnvelopeFollower, EnvelopeInputs};
pub use looper::{ChannelOutput, Looper, LooperInputs, LooperShared, LooperVoice};

/// Cooperative processing for a channel.
pub trait Channel {
    /// Run control-rate work for millisecond `t`.
    ///
    /// Called at least once per millisecond from the main loop. This is the
    /// only place storage reads happen, so it may block.
    fn timer_tick(&mut self, t: u32);
}
