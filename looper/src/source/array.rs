//! In-memory sample source.
//!
//! Wavetables and short loops kept in flash. The whole table is always
//! resident, so there is no buffering: the interrupt and the cooperative
//! controls share one `ArraySource` through `&` and coordinate through
//! atomics.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use rand::{Rng, RngCore};

use crate::constants::{FACTOR_MAX, MIN_WINDOW_SAMPLES};

/// A looping or one-shot source over a static sample table.
pub struct ArraySource<'a> {
    data: &'a [i16],
    looping: bool,
    pos: AtomicU32,
    reversed: AtomicBool,
    start: AtomicU32,
    end: AtomicU32,
    start_factor: AtomicU16,
    end_factor: AtomicU16,
    fine_end_factor: AtomicU16,
}

impl<'a> ArraySource<'a> {
    pub const fn new(data: &'a [i16], looping: bool) -> Self {
        ArraySource {
            data,
            looping,
            pos: AtomicU32::new(0),
            reversed: AtomicBool::new(false),
            start: AtomicU32::new(0),
            end: AtomicU32::new(data.len() as u32),
            start_factor: AtomicU16::new(0),
            end_factor: AtomicU16::new(FACTOR_MAX),
            fine_end_factor: AtomicU16::new(0),
        }
    }

    /// Return the sample at the play position and advance it.
    ///
    /// Runs in the sample interrupt. A one-shot source holds its final sample
    /// once the window is exhausted.
    #[inline]
    pub fn next_sample(&self) -> i16 {
        let start = self.start.load(Ordering::Relaxed);
        let end = self.end.load(Ordering::Relaxed);
        if end <= start {
            return 0;
        }
        let reversed = self.reversed.load(Ordering::Relaxed);

        let pos = self.pos.load(Ordering::Relaxed).clamp(start, end - 1);
        let sample = self.data.get(pos as usize).copied().unwrap_or(0);

        let next = if reversed {
            if pos > start {
                pos - 1
            } else if self.looping {
                end - 1
            } else {
                pos
            }
        } else if pos + 1 < end {
            pos + 1
        } else if self.looping {
            start
        } else {
            pos
        };
        // Lose the race against a seek rather than overwrite it.
        let _ = self
            .pos
            .compare_exchange(pos, next, Ordering::Relaxed, Ordering::Relaxed);
        sample
    }

    /// Flip direction. The sample just played is played again first.
    pub fn reverse(&self) {
        let was_reversed = self.reversed.fetch_xor(true, Ordering::Relaxed);
        let start = self.start.load(Ordering::Relaxed);
        let end = self.end.load(Ordering::Relaxed);
        if end <= start {
            return;
        }
        let pos = self.pos.load(Ordering::Relaxed).clamp(start, end - 1);
        let back = if was_reversed {
            (pos + 1).min(end - 1)
        } else {
            pos.saturating_sub(1).max(start)
        };
        self.pos.store(back, Ordering::Relaxed);
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed.load(Ordering::Relaxed)
    }

    pub fn seek_random<R: RngCore>(&self, rng: &mut R) {
        let len = self.window_len();
        if len > 0 {
            let offset = rng.gen_range(0..len);
            self.pos
                .store(self.start.load(Ordering::Relaxed) + offset, Ordering::Relaxed);
        }
    }

    pub fn seek_mod_position(&self, count: u32) {
        let len = self.window_len();
        if len > 0 {
            self.pos.store(
                self.start.load(Ordering::Relaxed) + count % len,
                Ordering::Relaxed,
            );
        }
    }

    /// Jump to the window start, or its last sample when reversed.
    pub fn reset(&self) {
        let position = if self.is_reversed() {
            self.end.load(Ordering::Relaxed).saturating_sub(1)
        } else {
            self.start.load(Ordering::Relaxed)
        };
        self.pos.store(position, Ordering::Relaxed);
    }

    pub fn set_start_factor(&self, factor: u16) {
        self.start_factor.store(factor.min(FACTOR_MAX), Ordering::Relaxed);
        self.update_window();
    }

    pub fn set_end_factor(&self, factor: u16) {
        self.end_factor.store(factor.min(FACTOR_MAX), Ordering::Relaxed);
        self.update_window();
    }

    pub fn set_fine_end_factor(&self, factor: u16) {
        self.fine_end_factor
            .store(factor.min(FACTOR_MAX), Ordering::Relaxed);
        self.update_window();
    }

    pub fn window_start(&self) -> u32 {
        self.start.load(Ordering::Relaxed)
    }

    pub fn window_len(&self) -> u32 {
        self.end
            .load(Ordering::Relaxed)
            .saturating_sub(self.start.load(Ordering::Relaxed))
    }

    pub fn position(&self) -> u32 {
        self.pos.load(Ordering::Relaxed)
    }

    pub fn total_samples(&self) -> u32 {
        self.data.len() as u32
    }

    fn update_window(&self) {
        let total = self.data.len() as u64;
        let start_factor = self.start_factor.load(Ordering::Relaxed) as u64;
        let end_factor = self.end_factor.load(Ordering::Relaxed) as u64;
        let fine = self.fine_end_factor.load(Ordering::Relaxed) as u64;

        let start = (total * start_factor / 4096) as u32;
        let span = total as u32 - start;
        let coarse = (span as u64 * (end_factor + 1)) >> 12;
        let fine = (span as u64 * fine) >> 16;
        let len = ((coarse + fine).min(span as u64) as u32).max(MIN_WINDOW_SAMPLES.min(span));

        self.end.store(start + len, Ordering::Relaxed);
        self.start.store(start, Ordering::Relaxed);
    }
}
