//! Sample sources.
//!
//! Every loop a channel plays is split into two halves:
//!
//! | Half | Context | Type | Job |
//! |------|---------|------|-----|
//! | control | cooperative | [`SourceHandle`] | storage reads, seeks, window, reverse |
//! | voice | sample interrupt | [`VoiceSource`] | one sample per tick, O(1) |
//!
//! Both halves are tagged variants with match dispatch. There is no vtable on
//! the interrupt path.

pub mod array;
pub mod ping_pong;
pub mod stream;

pub use array::ArraySource;
pub use ping_pong::{BankReader, BankWriter, BufferState, PingPongBuffer};
pub use stream::{Block, StreamingSource, Window};

use rand::RngCore;

use crate::constants::MAX_LOOPS;
use crate::error::ConfigError;
use crate::storage::{LoopFile, LoopPath, Storage};

/// Interrupt-side sample producer.
pub enum Source<'a> {
    Array(&'a ArraySource<'a>),
    Stream(BankReader<'a>),
}

impl Source<'_> {
    #[inline(always)]
    pub fn next_sample(&mut self) -> i16 {
        match self {
            Source::Array(array) => array.next_sample(),
            Source::Stream(reader) => reader.next_sample(),
        }
    }
}

/// A [`Source`] with sample-rate division.
///
/// With a divisor of `n` each source sample is emitted for `n` ticks, playing
/// the loop `n` times slower than the channel rate.
pub struct VoiceSource<'a> {
    source: Source<'a>,
    divisor: u8,
    phase: u8,
    held: i16,
}

impl<'a> VoiceSource<'a> {
    pub fn new(source: Source<'a>) -> Self {
        VoiceSource {
            source,
            divisor: 1,
            phase: 0,
            held: 0,
        }
    }

    /// Hold each sample for `divisor` ticks. Zero is treated as one.
    pub fn set_divisor(&mut self, divisor: u8) {
        self.divisor = divisor.max(1);
        self.phase = 0;
    }

    pub fn divisor(&self) -> u8 {
        self.divisor
    }

    #[inline(always)]
    pub fn next_sample(&mut self) -> i16 {
        if self.phase == 0 {
            self.held = self.source.next_sample();
        }
        self.phase += 1;
        if self.phase >= self.divisor {
            self.phase = 0;
        }
        self.held
    }
}

/// Cooperative-side control of one loop.
pub enum SourceHandle<'a, F: LoopFile> {
    Array(&'a ArraySource<'a>),
    Stream(StreamingSource<'a, F>),
}

impl<F: LoopFile> SourceHandle<'_, F> {
    pub fn is_ready_for_refresh(&self) -> bool {
        match self {
            SourceHandle::Array(_) => false,
            SourceHandle::Stream(stream) => stream.is_ready_for_refresh(),
        }
    }

    pub fn refresh(&mut self) {
        if let SourceHandle::Stream(stream) = self {
            stream.refresh();
        }
    }

    pub fn reverse(&mut self) {
        match self {
            SourceHandle::Array(array) => array.reverse(),
            SourceHandle::Stream(stream) => stream.reverse(),
        }
    }

    pub fn is_reversed(&self) -> bool {
        match self {
            SourceHandle::Array(array) => array.is_reversed(),
            SourceHandle::Stream(stream) => stream.is_reversed(),
        }
    }

    pub fn seek_random<R: RngCore>(&mut self, rng: &mut R) {
        match self {
            SourceHandle::Array(array) => array.seek_random(rng),
            SourceHandle::Stream(stream) => stream.seek_random(rng),
        }
    }

    pub fn seek_mod_position(&mut self, count: u32) {
        match self {
            SourceHandle::Array(array) => array.seek_mod_position(count),
            SourceHandle::Stream(stream) => stream.seek_mod_position(count),
        }
    }

    pub fn reset(&mut self) {
        match self {
            SourceHandle::Array(array) => array.reset(),
            SourceHandle::Stream(stream) => stream.reset(),
        }
    }

    pub fn set_start_factor(&mut self, factor: u16) {
        match self {
            SourceHandle::Array(array) => array.set_start_factor(factor),
            SourceHandle::Stream(stream) => stream.set_start_factor(factor),
        }
    }

    pub fn set_end_factor(&mut self, factor: u16) {
        match self {
            SourceHandle::Array(array) => array.set_end_factor(factor),
            SourceHandle::Stream(stream) => stream.set_end_factor(factor),
        }
    }

    pub fn set_fine_end_factor(&mut self, factor: u16) {
        match self {
            SourceHandle::Array(array) => array.set_fine_end_factor(factor),
            SourceHandle::Stream(stream) => stream.set_fine_end_factor(factor),
        }
    }

    /// First file sample of the playback window.
    pub fn window_start(&self) -> u32 {
        match self {
            SourceHandle::Array(array) => array.window_start(),
            SourceHandle::Stream(stream) => stream.window().start,
        }
    }

    /// Length of the playback window in samples.
    pub fn window_len(&self) -> u32 {
        match self {
            SourceHandle::Array(array) => array.window_len(),
            SourceHandle::Stream(stream) => stream.window().len(),
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            SourceHandle::Array(_) => true,
            SourceHandle::Stream(stream) => stream.is_available(),
        }
    }

    /// Close the backing file of a streamed loop.
    pub fn close(&mut self) {
        if let SourceHandle::Stream(stream) = self {
            stream.close();
        }
    }
}

/// Both halves of one loop, ready to hand to a channel.
pub struct SourcePair<'a, F: LoopFile> {
    pub control: SourceHandle<'a, F>,
    pub voice: VoiceSource<'a>,
}

impl<'a, F: LoopFile> SourcePair<'a, F> {
    pub fn array(source: &'a ArraySource<'a>) -> Self {
        SourcePair {
            control: SourceHandle::Array(source),
            voice: VoiceSource::new(Source::Array(source)),
        }
    }

    /// Open a streaming loop on `buffer`. See [`StreamingSource::open`].
    pub fn stream<S>(
        storage: &mut S,
        path: &LoopPath<'_>,
        buffer: &'a mut PingPongBuffer,
        looping: bool,
    ) -> Self
    where
        S: Storage<File = F>,
    {
        let (stream, reader) = StreamingSource::open(storage, path, buffer, looping);
        SourcePair {
            control: SourceHandle::Stream(stream),
            voice: VoiceSource::new(Source::Stream(reader)),
        }
    }

    pub fn with_divisor(mut self, divisor: u8) -> Self {
        self.voice.set_divisor(divisor);
        self
    }
}

/// Open every loop of a bank, one [`PingPongBuffer`] each.
///
/// Files that fail to open still produce a (silent) pair so loop indices stay
/// aligned with the patch.
pub fn open_loops<'a, S>(
    storage: &mut S,
    loops: &[LoopPath<'_>],
    buffers: &'a mut [PingPongBuffer],
    looping: bool,
) -> Result<heapless::Vec<SourcePair<'a, S::File>, MAX_LOOPS>, ConfigError>
where
    S: Storage,
{
    if loops.is_empty() {
        return Err(ConfigError::NoSources);
    }
    if loops.len() > MAX_LOOPS {
        return Err(ConfigError::TooManySources {
            requested: loops.len(),
        });
    }
    if buffers.len() < loops.len() {
        return Err(ConfigError::NotEnoughBuffers {
            needed: loops.len(),
            available: buffers.len(),
        });
    }

    let mut pairs = heapless::Vec::new();
    for (path, buffer) in loops.iter().zip(buffers.iter_mut()) {
        let pair = SourcePair::stream(storage, path, buffer, looping);
        if pairs.push(pair).is_err() {
            return Err(ConfigError::TooManySources {
                requested: loops.len(),
            });
        }
    }
    Ok(pairs)
}
