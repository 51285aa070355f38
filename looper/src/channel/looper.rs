//! Multi-loop audio channel.
//!
//! ```text
//!           timer_tick (1 kHz, cooperative)            interrupt_tick (sample rate)
//!  triggers ─► Debouncer ─┐                         ┌─► VoiceSource[active1] ─┐
//!  controls ─► Hysteresis ┼─► LooperShared atomics ─┤                         ├─► Mixer ─► crush ─► DAC
//!  storage ◄── SourceHandle::refresh                └─► VoiceSource[active2] ─┘
//! ```
//!
//! [`Looper`] holds the control half of every loop plus all inputs.
//! [`LooperVoice`] holds the interrupt half and the DAC. The two only meet in
//! [`LooperShared`] and in the stream buffers.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use rand::{Rng, RngCore, SeedableRng};

use crate::config::{timer_for, AnalogPin, ChannelBinding, DigitalPin, LooperConfig, LooperPins};
use crate::config::{ReverseMode, SampleRate, SyncMode};
use crate::constants::{CONTROL_RATE_MS, DENSITY_RANGE, FACTOR_MAX, MAX_LOOPS};
use crate::control::analog::unipolar;
use crate::control::{Debouncer, Hysteresis};
use crate::dsp::helpers::{crush, crush_mask_for, to_dac};
use crate::dsp::{MixMode, Mixer};
use crate::error::ConfigError;
use crate::hal::{AnalogInput, DacWriter, SampleClock, TimerId, TriggerInput};
use crate::source::{SourceHandle, SourcePair, VoiceSource};
use crate::storage::LoopFile;

use super::Channel;

/// Parameters written by the control half and read by the interrupt.
///
/// Lives in a `static` (or any place outliving both halves).
pub struct LooperShared {
    muted: AtomicBool,
    mix_factor: AtomicU16,
    bit_mask: AtomicU16,
    /// `first | second << 8`
    active: AtomicU16,
    sample_count: AtomicU32,
}

impl LooperShared {
    pub const fn new() -> Self {
        LooperShared {
            muted: AtomicBool::new(false),
            mix_factor: AtomicU16::new(2048),
            bit_mask: AtomicU16::new(0xFFFF),
            active: AtomicU16::new(0),
            sample_count: AtomicU32::new(0),
        }
    }

    fn reset(&self, count: usize) {
        self.muted.store(false, Ordering::Relaxed);
        self.mix_factor.store(2048, Ordering::Relaxed);
        self.bit_mask.store(0xFFFF, Ordering::Relaxed);
        self.set_active(0, 1 % count.max(1));
        self.sample_count.store(0, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn mix_factor(&self) -> u16 {
        self.mix_factor.load(Ordering::Relaxed)
    }

    pub fn bit_mask(&self) -> u16 {
        self.bit_mask.load(Ordering::Relaxed)
    }

    /// Indices of the first and second audible loops.
    pub fn active(&self) -> (usize, usize) {
        let packed = self.active.load(Ordering::Relaxed);
        ((packed & 0xFF) as usize, (packed >> 8) as usize)
    }

    /// Samples written since creation or the last reset trigger.
    pub fn sample_count(&self) -> u32 {
        self.sample_count.load(Ordering::Relaxed)
    }

    fn set_active(&self, first: usize, second: usize) {
        // Both halves change together so the interrupt never pairs an old
        // first index with a new second one.
        self.active
            .store((first as u16 & 0xFF) | ((second as u16) << 8), Ordering::Relaxed);
    }
}

impl Default for LooperShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Board inputs bound to a looper. Every input is optional.
pub struct LooperInputs<T, A> {
    pub glitch: Option<T>,
    pub reverse: Option<T>,
    pub mix_trigger: Option<T>,
    pub reset: Option<T>,
    pub density: Option<A>,
    pub mix_control: Option<A>,
    pub bit_control: Option<A>,
    pub length_control: Option<A>,
    pub fine_length_control: Option<A>,
    pub start_control: Option<A>,
}

impl<T, A> LooperInputs<T, A> {
    pub const fn none() -> Self {
        LooperInputs {
            glitch: None,
            reverse: None,
            mix_trigger: None,
            reset: None,
            density: None,
            mix_control: None,
            bit_control: None,
            length_control: None,
            fine_length_control: None,
            start_control: None,
        }
    }

    /// Build the inputs named in `pins` using the board's pin constructors.
    pub fn resolve(
        pins: &LooperPins,
        mut digital: impl FnMut(DigitalPin) -> T,
        mut analog: impl FnMut(AnalogPin) -> A,
    ) -> Self {
        LooperInputs {
            glitch: pins.glitch.map(&mut digital),
            reverse: pins.reverse.map(&mut digital),
            mix_trigger: pins.mix_trigger.map(&mut digital),
            reset: pins.reset.map(&mut digital),
            density: pins.density.map(&mut analog),
            mix_control: pins.mix_control.map(&mut analog),
            bit_control: pins.bit_control.map(&mut analog),
            length_control: pins.length_control.map(&mut analog),
            fine_length_control: pins.fine_length_control.map(&mut analog),
            start_control: pins.start_control.map(&mut analog),
        }
    }
}

impl<T, A> Default for LooperInputs<T, A> {
    fn default() -> Self {
        Self::none()
    }
}

/// Hardware a channel is bound to at creation.
pub struct ChannelOutput<'c, C, D> {
    /// Output to timer table of the board.
    pub bindings: &'c [ChannelBinding],
    pub clock: &'c mut C,
    pub dac: D,
}

/// Cooperative half of a looper channel.
pub struct Looper<'a, F: LoopFile, T, A, R> {
    sources: heapless::Vec<SourceHandle<'a, F>, MAX_LOOPS>,
    shared: &'a LooperShared,
    inputs: LooperInputs<T, A>,
    mix_mode: MixMode,
    reverse_mode: ReverseMode,
    sync_mode: SyncMode,
    sample_rate: SampleRate,
    timer: TimerId,
    reversed: bool,
    glitch_edge: Debouncer,
    mix_edge: Debouncer,
    reverse_edge: Debouncer,
    reset_edge: Debouncer,
    start_filter: Hysteresis,
    length_filter: Hysteresis,
    fine_length_filter: Hysteresis,
    rng: R,
}

/// Interrupt half of a looper channel.
pub struct LooperVoice<'a, D, R> {
    sources: heapless::Vec<VoiceSource<'a>, MAX_LOOPS>,
    shared: &'a LooperShared,
    mixer: Mixer,
    dac: D,
    rng: R,
}

impl<'a, F, T, A, R> Looper<'a, F, T, A, R>
where
    F: LoopFile,
    T: TriggerInput,
    A: AnalogInput,
    R: RngCore,
{
    /// Bind a channel to its output and arm the sample clock.
    ///
    /// The voice gets its own generator, seeded from `rng`.
    pub fn create<C, D>(
        config: &LooperConfig<'_>,
        sources: heapless::Vec<SourcePair<'a, F>, MAX_LOOPS>,
        shared: &'a LooperShared,
        inputs: LooperInputs<T, A>,
        output: ChannelOutput<'_, C, D>,
        mut rng: R,
    ) -> Result<(Self, LooperVoice<'a, D, R>), ConfigError>
    where
        C: SampleClock,
        D: DacWriter,
        R: SeedableRng,
    {
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        let timer = timer_for(output.bindings, config.output)
            .ok_or(ConfigError::UnmappedOutput(config.output))?;

        let count = sources.len();
        shared.reset(count);

        let (controls, voices): (heapless::Vec<_, MAX_LOOPS>, heapless::Vec<_, MAX_LOOPS>) = sources
            .into_iter()
            .map(|pair| (pair.control, pair.voice))
            .unzip();

        let voice = LooperVoice {
            sources: voices,
            shared,
            mixer: Mixer::new(config.mix_mode),
            dac: output.dac,
            rng: R::seed_from_u64(rng.next_u64()),
        };

        let looper = Looper {
            sources: controls,
            shared,
            inputs,
            mix_mode: config.mix_mode,
            reverse_mode: config.reverse_mode,
            sync_mode: config.sync_mode,
            sample_rate: config.sample_rate,
            timer,
            reversed: false,
            glitch_edge: Debouncer::new(),
            mix_edge: Debouncer::new(),
            reverse_edge: Debouncer::new(),
            reset_edge: Debouncer::new(),
            start_filter: Hysteresis::for_start(),
            length_filter: Hysteresis::new(),
            fine_length_filter: Hysteresis::new(),
            rng,
        };

        output.clock.arm(timer, config.sample_rate.hz());
        log::info!(
            "looper on {:?} (timer {}): {} loops at {} Hz, mix {:?}, reverse {:?}, sync {:?}",
            config.output,
            timer.0,
            count,
            config.sample_rate.hz(),
            config.mix_mode,
            config.reverse_mode,
            config.sync_mode
        );

        Ok((looper, voice))
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source(&self, index: usize) -> Option<&SourceHandle<'a, F>> {
        self.sources.get(index)
    }

    pub fn shared(&self) -> &'a LooperShared {
        self.shared
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn mix_mode(&self) -> MixMode {
        self.mix_mode
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn timer(&self) -> TimerId {
        self.timer
    }

    /// Close every streamed loop and give back the board inputs.
    ///
    /// The voice plays silence from the streamed loops afterwards.
    pub fn release(mut self) -> LooperInputs<T, A> {
        for source in self.sources.iter_mut() {
            source.close();
        }
        log::info!("looper on timer {} released", self.timer.0);
        self.inputs
    }

    fn update_reverse(&mut self, t: u32) {
        match self.reverse_mode {
            ReverseMode::Trigger => {
                if rising_edge(&mut self.inputs.reverse, &mut self.reverse_edge, t) {
                    self.toggle_reverse();
                }
            }
            ReverseMode::Gate => {
                let level = match self.inputs.reverse.as_mut() {
                    Some(pin) => pin.is_triggered(),
                    None => return,
                };
                if level != self.reversed {
                    self.toggle_reverse();
                }
            }
        }
    }

    fn toggle_reverse(&mut self) {
        self.reversed = !self.reversed;
        for source in self.sources.iter_mut() {
            source.reverse();
        }
        log::debug!("looper reversed={}", self.reversed);
    }

    fn sample_controls(&mut self) {
        let count = self.sources.len() as u32;

        if let Some(raw) = read(&mut self.inputs.mix_control) {
            let cv = unipolar(raw) as u32;
            let range = (FACTOR_MAX as u32 / count).max(1);
            let first = (cv / range).min(count - 1);
            let factor = (FACTOR_MAX as u32 * (cv - first * range) / range).min(FACTOR_MAX as u32);
            self.shared
                .set_active(first as usize, ((first + 1) % count) as usize);
            self.shared.mix_factor.store(factor as u16, Ordering::Relaxed);
        }

        if let Some(raw) = read(&mut self.inputs.bit_control) {
            self.shared
                .bit_mask
                .store(crush_mask_for(unipolar(raw)), Ordering::Relaxed);
        }

        if let Some(start) = read(&mut self.inputs.start_control)
            .and_then(|raw| self.start_filter.update(unipolar(raw)))
        {
            for source in self.sources.iter_mut() {
                source.set_start_factor(start);
            }
        }

        if let Some(length) = read(&mut self.inputs.length_control)
            .and_then(|raw| self.length_filter.update(unipolar(raw)))
        {
            for source in self.sources.iter_mut() {
                source.set_end_factor(length);
            }
        }

        if let Some(fine) = read(&mut self.inputs.fine_length_control)
            .and_then(|raw| self.fine_length_filter.update(unipolar(raw)))
        {
            for source in self.sources.iter_mut() {
                source.set_fine_end_factor(fine);
            }
        }
    }

    /// Jump the audible loops to random positions and redraw the density mute.
    fn glitch(&mut self) {
        let (first, second) = self.shared.active();
        if let Some(source) = self.sources.get_mut(first) {
            source.seek_random(&mut self.rng);
        }
        if self.sources.len() > 1 {
            if let Some(source) = self.sources.get_mut(second) {
                source.seek_random(&mut self.rng);
            }
        }

        if let Some(raw) = read(&mut self.inputs.density) {
            let draw = self.rng.gen_range(1..=DENSITY_RANGE);
            let muted = draw > raw as u32;
            self.shared.muted.store(muted, Ordering::Relaxed);
        }
    }

    /// Advance both active loops by one position through the bank.
    fn step_mix(&mut self) {
        let count = self.sources.len();
        let (first, second) = self.shared.active();
        let (first, second) = ((first + 1) % count, (second + 1) % count);
        self.shared.set_active(first, second);

        if count > 1 && self.sync_mode == SyncMode::Continuous {
            let newly_audible = if self.mix_mode.uses_second() {
                second
            } else {
                first
            };
            let position = self.shared.sample_count();
            if let Some(source) = self.sources.get_mut(newly_audible) {
                source.seek_mod_position(position);
            }
        }
        log::debug!("looper active loops {} and {}", first, second);
    }

    fn reset(&mut self) {
        for source in self.sources.iter_mut() {
            source.reset();
        }
        self.shared.sample_count.store(0, Ordering::Relaxed);
        log::debug!("looper reset");
    }

    fn refresh_active(&mut self) {
        let (first, second) = self.shared.active();
        if let Some(source) = self.sources.get_mut(first) {
            if source.is_ready_for_refresh() {
                source.refresh();
            }
        }
        if second != first {
            if let Some(source) = self.sources.get_mut(second) {
                if source.is_ready_for_refresh() {
                    source.refresh();
                }
            }
        }
    }
}

impl<F, T, A, R> Channel for Looper<'_, F, T, A, R>
where
    F: LoopFile,
    T: TriggerInput,
    A: AnalogInput,
    R: RngCore,
{
    fn timer_tick(&mut self, t: u32) {
        self.update_reverse(t);

        if t % CONTROL_RATE_MS == 0 {
            self.sample_controls();
        }

        if rising_edge(&mut self.inputs.glitch, &mut self.glitch_edge, t) {
            self.glitch();
        }

        let mix_edge = rising_edge(&mut self.inputs.mix_trigger, &mut self.mix_edge, t);
        if mix_edge && self.mix_mode.steps_on_trigger() {
            self.step_mix();
        }

        if rising_edge(&mut self.inputs.reset, &mut self.reset_edge, t) {
            self.reset();
        }

        self.refresh_active();
    }
}

impl<D: DacWriter, R: RngCore> LooperVoice<'_, D, R> {
    /// Produce one output sample. Call from the channel's timer interrupt.
    #[inline]
    pub fn interrupt_tick(&mut self) {
        let shared = self.shared;
        if shared.is_muted() {
            return;
        }

        let sample = if self.sources.len() == 1 {
            self.sources[0].next_sample()
        } else {
            let (first, second) = shared.active();
            let a = self.sources.get_mut(first).map_or(0, |s| s.next_sample());
            if self.mixer.mode().uses_second() {
                let b = self.sources.get_mut(second).map_or(0, |s| s.next_sample());
                let dither = self.mixer.mode() == MixMode::Blend && self.rng.next_u32() & 1 == 1;
                self.mixer.mix(a, b, shared.mix_factor(), dither)
            } else {
                a
            }
        };

        self.dac.write(to_dac(crush(sample, shared.bit_mask())));
        shared.sample_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dac(&self) -> &D {
        &self.dac
    }

    /// Give back the DAC, ending the channel.
    pub fn release(self) -> D {
        self.dac
    }
}

fn rising_edge<T: TriggerInput>(input: &mut Option<T>, debouncer: &mut Debouncer, t: u32) -> bool {
    match input {
        Some(pin) => debouncer.update(pin.is_triggered(), t),
        None => false,
    }
}

fn read<A: AnalogInput>(input: &mut Option<A>) -> Option<u16> {
    input.as_mut().map(|pin| pin.read_raw())
}
