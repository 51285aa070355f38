//! Envelope follower channel.
//!
//! Streams one looping file and emits a control voltage proportional to the
//! rectified average of the signal over a sliding window, instead of the swing
//! of the audio itself. All work happens at control rate, so both halves of
//! the stream buffer live in this channel.

use crate::config::{AnalogPin, EnvelopeConfig};
use crate::constants::{DAC_MAX, ENVELOPE_CONTROL_RATE_MS};
use crate::control::analog::millivolts;
use crate::hal::{AnalogInput, DacWriter};
use crate::source::{BankReader, PingPongBuffer, StreamingSource};
use crate::storage::{LoopFile, Storage};

use super::Channel;

/// Analog controls of an envelope follower. Unbound controls read as 0 V.
pub struct EnvelopeInputs<A> {
    pub window_size: Option<A>,
    pub scale: Option<A>,
    pub threshold: Option<A>,
}

impl<A> EnvelopeInputs<A> {
    pub const fn none() -> Self {
        EnvelopeInputs {
            window_size: None,
            scale: None,
            threshold: None,
        }
    }

    pub fn resolve(config: &EnvelopeConfig<'_>, mut analog: impl FnMut(AnalogPin) -> A) -> Self {
        EnvelopeInputs {
            window_size: config.window_size.map(&mut analog),
            scale: config.scale.map(&mut analog),
            threshold: config.threshold.map(&mut analog),
        }
    }
}

pub struct EnvelopeFollower<'a, F: LoopFile, A, D> {
    stream: StreamingSource<'a, F>,
    reader: BankReader<'a>,
    inputs: EnvelopeInputs<A>,
    dac: D,
    window_size: u32,
    scale: u32,
    threshold: u32,
    last_output: u16,
}

impl<'a, F, A, D> EnvelopeFollower<'a, F, A, D>
where
    F: LoopFile,
    A: AnalogInput,
    D: DacWriter,
{
    pub fn create<S>(
        config: &EnvelopeConfig<'_>,
        storage: &mut S,
        buffer: &'a mut PingPongBuffer,
        inputs: EnvelopeInputs<A>,
        dac: D,
    ) -> Self
    where
        S: Storage<File = F>,
    {
        let (stream, reader) = StreamingSource::open(storage, &config.path, buffer, true);
        let mut follower = EnvelopeFollower {
            stream,
            reader,
            inputs,
            dac,
            window_size: 1,
            scale: 0,
            threshold: 0,
            last_output: 0,
        };
        follower.sample_controls();
        log::info!(
            "envelope follower on {}/{}: window {}, scale {}, threshold {}",
            config.path.subfolder,
            config.path.filename,
            follower.window_size,
            follower.scale,
            follower.threshold
        );
        follower
    }

    /// Samples averaged per tick.
    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Code written to the DAC on the last tick.
    pub fn last_output(&self) -> u16 {
        self.last_output
    }

    pub fn stream(&self) -> &StreamingSource<'a, F> {
        &self.stream
    }

    /// Close the loop file and give back the DAC.
    pub fn release(mut self) -> D {
        self.stream.close();
        self.dac
    }

    fn sample_controls(&mut self) {
        let window_mv = read_mv(&mut self.inputs.window_size);
        self.window_size = (window_mv / 10).max(1);
        self.threshold = read_mv(&mut self.inputs.threshold) / 2;
        self.scale = read_mv(&mut self.inputs.scale) / 2;
    }
}

impl<F, A, D> Channel for EnvelopeFollower<'_, F, A, D>
where
    F: LoopFile,
    A: AnalogInput,
    D: DacWriter,
{
    fn timer_tick(&mut self, t: u32) {
        if t % ENVELOPE_CONTROL_RATE_MS == 0 {
            self.sample_controls();
        }

        let mut sum: u32 = 0;
        for _ in 0..self.window_size {
            sum += self.reader.next_sample().unsigned_abs() as u32;
        }
        if sum < self.threshold {
            sum = 0;
        }

        let scaled = sum as u64 * self.scale as u64 / (self.window_size as u64 * 100);
        let code = scaled.min(DAC_MAX as u64) as u16;
        self.dac.write(code);
        self.last_output = code;

        if self.stream.is_ready_for_refresh() {
            self.stream.refresh();
        }
    }
}

fn read_mv<A: AnalogInput>(input: &mut Option<A>) -> u32 {
    input.as_mut().map_or(0, |pin| millivolts(pin.read_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LoopPath;
    use crate::testutil::{MockAnalog, MockDac, MockFile, MockStorage};
    use std::vec::Vec;

    type TestFollower<'a> = EnvelopeFollower<'a, MockFile, MockAnalog, MockDac>;

    fn path() -> LoopPath<'static> {
        LoopPath::new("env", "pulse.raw")
    }

    struct Knobs {
        window: MockAnalog,
        scale: MockAnalog,
        threshold: MockAnalog,
    }

    impl Knobs {
        fn new(window: u16, scale: u16, threshold: u16) -> Self {
            let knobs = Knobs {
                window: MockAnalog::default(),
                scale: MockAnalog::default(),
                threshold: MockAnalog::default(),
            };
            knobs.window.set_unipolar(window);
            knobs.scale.set_unipolar(scale);
            knobs.threshold.set_unipolar(threshold);
            knobs
        }

        fn inputs(&self) -> EnvelopeInputs<MockAnalog> {
            EnvelopeInputs {
                window_size: Some(self.window.clone()),
                scale: Some(self.scale.clone()),
                threshold: Some(self.threshold.clone()),
            }
        }
    }

    fn follower<'a>(
        storage: &mut MockStorage,
        buffer: &'a mut PingPongBuffer,
        inputs: EnvelopeInputs<MockAnalog>,
        dac: &MockDac,
    ) -> TestFollower<'a> {
        let config = EnvelopeConfig::new(path());
        EnvelopeFollower::create(&config, storage, buffer, inputs, dac.clone())
    }

    #[test]
    fn controls_read_at_construction() {
        let data: Vec<i16> = [1000, -1000].repeat(2500);
        let mut storage = MockStorage::with_file(&path(), &data);
        let mut buffer = PingPongBuffer::new();
        // 82 -> 100 mV, 164 -> 200 mV
        let knobs = Knobs::new(82, 164, 0);
        let dac = MockDac::default();
        let follower = follower(&mut storage, &mut buffer, knobs.inputs(), &dac);

        assert_eq!(follower.window_size(), 10);
        assert_eq!(follower.scale(), 100);
        assert_eq!(follower.threshold(), 0);
    }

    #[test]
    fn rectified_average_is_scaled() {
        let data: Vec<i16> = [1000, -1000].repeat(2500);
        let mut storage = MockStorage::with_file(&path(), &data);
        let mut buffer = PingPongBuffer::new();
        let knobs = Knobs::new(82, 164, 0);
        let dac = MockDac::default();
        let mut follower = follower(&mut storage, &mut buffer, knobs.inputs(), &dac);

        // 10 * 1000 * 100 / (10 * 100)
        follower.timer_tick(1);
        assert_eq!(follower.last_output(), 1000);
        assert_eq!(dac.writes(), [1000]);
    }

    #[test]
    fn output_clamps_at_dac_max() {
        let data: Vec<i16> = [i16::MIN, i16::MAX].repeat(100);
        let mut storage = MockStorage::with_file(&path(), &data);
        let mut buffer = PingPongBuffer::new();
        let knobs = Knobs::new(82, 4094, 0);
        let dac = MockDac::default();
        let mut follower = follower(&mut storage, &mut buffer, knobs.inputs(), &dac);

        follower.timer_tick(1);
        assert_eq!(follower.last_output(), DAC_MAX);
    }

    #[test]
    fn quiet_signal_below_threshold_is_zeroed() {
        let data: Vec<i16> = [100, -100].repeat(100);
        let mut storage = MockStorage::with_file(&path(), &data);
        let mut buffer = PingPongBuffer::new();
        let knobs = Knobs::new(82, 4094, 4094);
        let dac = MockDac::default();
        let mut follower = follower(&mut storage, &mut buffer, knobs.inputs(), &dac);

        follower.timer_tick(1);
        assert_eq!(follower.last_output(), 0);
    }

    #[test]
    fn unbound_window_is_one_sample() {
        let data: Vec<i16> = [500, -900].repeat(100);
        let mut storage = MockStorage::with_file(&path(), &data);
        let mut buffer = PingPongBuffer::new();
        let scale = MockAnalog::default();
        // 164 -> 200 mV -> scale 100
        scale.set_unipolar(164);
        let inputs = EnvelopeInputs {
            scale: Some(scale),
            ..EnvelopeInputs::none()
        };
        let dac = MockDac::default();
        let mut follower = follower(&mut storage, &mut buffer, inputs, &dac);

        assert_eq!(follower.window_size(), 1);
        follower.timer_tick(1);
        follower.timer_tick(2);
        assert_eq!(dac.writes(), [500, 900]);
    }

    #[test]
    fn controls_resampled_every_hundred_ms() {
        let data: Vec<i16> = [1000, -1000].repeat(2500);
        let mut storage = MockStorage::with_file(&path(), &data);
        let mut buffer = PingPongBuffer::new();
        let knobs = Knobs::new(82, 164, 0);
        let dac = MockDac::default();
        let mut follower = follower(&mut storage, &mut buffer, knobs.inputs(), &dac);

        knobs.window.set_unipolar(164);
        for t in 1..100 {
            follower.timer_tick(t);
        }
        assert_eq!(follower.window_size(), 10);
        follower.timer_tick(100);
        assert_eq!(follower.window_size(), 20);
    }

    #[test]
    fn release_closes_the_loop_file() {
        let data: Vec<i16> = [1000, -1000].repeat(100);
        let mut storage = MockStorage::with_file(&path(), &data);
        let mut buffer = PingPongBuffer::new();
        let knobs = Knobs::new(82, 164, 0);
        let dac = MockDac::default();
        let mut follower = follower(&mut storage, &mut buffer, knobs.inputs(), &dac);

        follower.timer_tick(1);
        let dac = follower.release();
        assert_eq!(storage.closed(), 1);
        assert_eq!(dac.writes(), [1000]);
    }

    #[test]
    fn stream_keeps_refilling() {
        let data: Vec<i16> = [1000, -1000].repeat(5000);
        let mut storage = MockStorage::with_file(&path(), &data);
        let mut buffer = PingPongBuffer::new();
        let knobs = Knobs::new(82, 164, 0);
        let dac = MockDac::default();
        let mut follower = follower(&mut storage, &mut buffer, knobs.inputs(), &dac);

        // 10 samples per tick, 10_000 sample file: wraps after 1000 ticks.
        for t in 1..=2500 {
            follower.timer_tick(t);
        }
        assert!(dac.writes().iter().all(|&code| code == 1000));
        assert!(follower.stream().refill_count() > 5);
    }
}
