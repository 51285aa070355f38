//! Channel configuration.
//!
//! Patch parsing lives outside this crate; a patch loader fills these plain
//! structs. Mode and rate names are matched case-sensitively and unknown
//! names fall back to the defaults, so a typo in a patch degrades to a
//! playable channel instead of an error.

use crate::constants::MAX_LOOPS;
use crate::dsp::MixMode;
use crate::hal::TimerId;
use crate::storage::LoopPath;

/// Board digital input identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DigitalPin(pub u8);

/// Board analog input identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalogPin(pub u8);

/// Audio-rate DAC outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioOut {
    Dac0,
    Dac1,
}

/// Channel sample rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleRate {
    Hz10000,
    Hz12000,
    #[default]
    Hz24000,
    Hz44100,
    Hz48000,
}

impl SampleRate {
    pub fn from_name(name: &str) -> Self {
        match name {
            "10000" => SampleRate::Hz10000,
            "12000" => SampleRate::Hz12000,
            "24000" => SampleRate::Hz24000,
            "44100" => SampleRate::Hz44100,
            "48000" => SampleRate::Hz48000,
            _ => SampleRate::default(),
        }
    }

    pub const fn hz(self) -> u32 {
        match self {
            SampleRate::Hz10000 => 10_000,
            SampleRate::Hz12000 => 12_000,
            SampleRate::Hz24000 => 24_000,
            SampleRate::Hz44100 => 44_100,
            SampleRate::Hz48000 => 48_000,
        }
    }
}

/// How the reverse input is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReverseMode {
    /// Play backwards while the input is high.
    Gate,
    /// Each rising edge flips the direction.
    #[default]
    Trigger,
}

impl ReverseMode {
    pub fn from_name(name: &str) -> Self {
        match name {
            "gate" => ReverseMode::Gate,
            "trigger" => ReverseMode::Trigger,
            _ => ReverseMode::default(),
        }
    }
}

/// What a loop does while it is not audible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Catch up to the channel position when it becomes audible again.
    #[default]
    Continuous,
    /// Resume where it left off.
    Pause,
}

impl SyncMode {
    pub fn from_name(name: &str) -> Self {
        match name {
            "continuous" => SyncMode::Continuous,
            "pause" => SyncMode::Pause,
            _ => SyncMode::default(),
        }
    }
}

/// Optional input bindings of a looper. `None` disables the feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LooperPins {
    pub glitch: Option<DigitalPin>,
    pub reverse: Option<DigitalPin>,
    pub mix_trigger: Option<DigitalPin>,
    pub reset: Option<DigitalPin>,
    pub density: Option<AnalogPin>,
    pub mix_control: Option<AnalogPin>,
    pub bit_control: Option<AnalogPin>,
    pub length_control: Option<AnalogPin>,
    pub fine_length_control: Option<AnalogPin>,
    pub start_control: Option<AnalogPin>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LooperConfig<'a> {
    pub loops: heapless::Vec<LoopPath<'a>, MAX_LOOPS>,
    pub sample_rate: SampleRate,
    pub output: AudioOut,
    pub pins: LooperPins,
    pub mix_mode: MixMode,
    pub reverse_mode: ReverseMode,
    pub sync_mode: SyncMode,
}

impl<'a> LooperConfig<'a> {
    /// A channel with no loops and every mode at its default.
    pub fn new(output: AudioOut) -> Self {
        LooperConfig {
            loops: heapless::Vec::new(),
            sample_rate: SampleRate::default(),
            output,
            pins: LooperPins::default(),
            mix_mode: MixMode::default(),
            reverse_mode: ReverseMode::default(),
            sync_mode: SyncMode::default(),
        }
    }

    /// A channel playing one loop.
    pub fn single(output: AudioOut, path: LoopPath<'a>) -> Self {
        let mut config = Self::new(output);
        // Capacity is at least one.
        let _ = config.loops.push(path);
        config
    }

    /// Append a loop. Returns the path back when the bank is full.
    pub fn add_loop(&mut self, path: LoopPath<'a>) -> Result<(), LoopPath<'a>> {
        self.loops.push(path)
    }

    /// Apply mode names from a patch.
    pub fn with_mode_names(mut self, mix: &str, reverse: &str, sync: &str) -> Self {
        self.mix_mode = MixMode::from_name(mix);
        self.reverse_mode = ReverseMode::from_name(reverse);
        self.sync_mode = SyncMode::from_name(sync);
        self
    }
}

/// Which hardware timer drives which output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBinding {
    pub output: AudioOut,
    pub timer: TimerId,
}

/// Find the timer bound to `output`.
pub fn timer_for(bindings: &[ChannelBinding], output: AudioOut) -> Option<TimerId> {
    bindings
        .iter()
        .find(|binding| binding.output == output)
        .map(|binding| binding.timer)
}

/// Envelope follower configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeConfig<'a> {
    pub path: LoopPath<'a>,
    pub window_size: Option<AnalogPin>,
    pub scale: Option<AnalogPin>,
    pub threshold: Option<AnalogPin>,
}

impl<'a> EnvelopeConfig<'a> {
    pub fn new(path: LoopPath<'a>) -> Self {
        EnvelopeConfig {
            path,
            window_size: None,
            scale: None,
            threshold: None,
        }
    }

    /// Bind a control by its patch name (`windowsize`, `scale`, `threshold`).
    /// Returns `false` for an unknown name.
    pub fn bind(&mut self, name: &str, pin: AnalogPin) -> bool {
        let slot = match name {
            "windowsize" => &mut self.window_size,
            "scale" => &mut self.scale,
            "threshold" => &mut self.threshold,
            _ => return false,
        };
        *slot = Some(pin);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_names() {
        assert_eq!(SampleRate::from_name("44100").hz(), 44_100);
        assert_eq!(SampleRate::from_name("10000"), SampleRate::Hz10000);
        assert_eq!(SampleRate::from_name("22050"), SampleRate::Hz24000);
        assert_eq!(SampleRate::default().hz(), 24_000);
    }

    #[test]
    fn mode_names_fall_back_to_defaults() {
        let config = LooperConfig::new(AudioOut::Dac0).with_mode_names("xor", "gate", "pause");
        assert_eq!(config.mix_mode, MixMode::Xor);
        assert_eq!(config.reverse_mode, ReverseMode::Gate);
        assert_eq!(config.sync_mode, SyncMode::Pause);

        let config = LooperConfig::new(AudioOut::Dac0).with_mode_names("XOR", "", "sync");
        assert_eq!(config.mix_mode, MixMode::None);
        assert_eq!(config.reverse_mode, ReverseMode::Trigger);
        assert_eq!(config.sync_mode, SyncMode::Continuous);
    }

    #[test]
    fn loop_bank_is_bounded() {
        let path = LoopPath::new("bank", "a.raw");
        let mut config = LooperConfig::single(AudioOut::Dac1, path);
        for _ in 1..MAX_LOOPS {
            assert!(config.add_loop(path).is_ok());
        }
        assert_eq!(config.add_loop(path), Err(path));
        assert_eq!(config.loops.len(), MAX_LOOPS);
    }

    #[test]
    fn bindings_lookup() {
        let bindings = [
            ChannelBinding {
                output: AudioOut::Dac0,
                timer: TimerId(4),
            },
            ChannelBinding {
                output: AudioOut::Dac1,
                timer: TimerId(5),
            },
        ];
        assert_eq!(timer_for(&bindings, AudioOut::Dac1), Some(TimerId(5)));
        assert_eq!(timer_for(&bindings[..1], AudioOut::Dac1), None);
    }

    #[test]
    fn envelope_bind_by_name() {
        let mut config = EnvelopeConfig::new(LoopPath::new("env", "kick.raw"));
        assert!(config.bind("windowsize", AnalogPin(1)));
        assert!(config.bind("threshold", AnalogPin(3)));
        assert!(!config.bind("gain", AnalogPin(4)));
        assert_eq!(config.window_size, Some(AnalogPin(1)));
        assert_eq!(config.scale, None);
        assert_eq!(config.threshold, Some(AnalogPin(3)));
    }
}
