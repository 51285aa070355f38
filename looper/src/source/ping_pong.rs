//! Two-bank stream buffer shared between the sample ISR and the refill loop.
//!
//! One bank is drained sample-by-sample by the interrupt while the other is
//! refilled from storage by cooperative code. Everything the two sides need to
//! agree on lives in one packed state word:
//!
//! ```text
//!  31        30        29          15..0
//! ┌─────────┬─────────┬───────────┬────────┐
//! │ read    │ reversed│ write     │ cursor │
//! │ bank    │         │ ready     │        │
//! └─────────┴─────────┴───────────┴────────┘
//! ```
//!
//! so a bank swap, a direction change or a seek is a single compare-and-swap
//! and the interrupt always observes either the old or the new bank.
//!
//! # Safety Contract
//!
//! - Only the [`BankReader`] (the "consumer") reads bank data and advances the cursor.
//! - Only the [`BankWriter`] (the "producer") writes bank data, and only into
//!   the bank that is not being read while `write ready` is clear.
//! - The consumer runs at higher priority than the producer on the same core
//!   (a timer ISR preempting the main loop), so a consumer step is never
//!   interleaved with a producer step.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::constants::BANK_SIZE;

const CURSOR_MASK: u32 = 0xFFFF;
const WRITE_READY: u32 = 1 << 29;
const REVERSED: u32 = 1 << 30;
const READ_BANK: u32 = 1 << 31;

/// Decoded view of the packed buffer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferState(u32);

impl BufferState {
    /// Bank currently drained by the consumer.
    pub fn read_bank(self) -> usize {
        (self.0 & READ_BANK != 0) as usize
    }

    /// Bank owned by the producer.
    pub fn write_bank(self) -> usize {
        1 - self.read_bank()
    }

    /// Samples consumed from the read bank.
    pub fn cursor(self) -> u32 {
        self.0 & CURSOR_MASK
    }

    pub fn is_reversed(self) -> bool {
        self.0 & REVERSED != 0
    }

    /// The write bank holds a published block waiting to be swapped in.
    pub fn is_write_ready(self) -> bool {
        self.0 & WRITE_READY != 0
    }
}

/// Double-buffered sample storage for one streaming source.
///
/// Declare one per streaming loop, typically in a `static`, and hand out the
/// two roles with [`split()`](Self::split).
pub struct PingPongBuffer {
    banks: [UnsafeCell<[i16; BANK_SIZE]>; 2],
    /// Valid samples per bank. Written by the producer before publishing.
    lens: [AtomicU16; 2],
    state: AtomicU32,
    available: AtomicBool,
}

// SAFETY: Bank data is only written through `BankWriter` into the bank that
// the consumer cannot reach (write-ready clear, not the read bank), and only
// read through `BankReader` from the read bank. All coordination goes through
// the atomic state word.
unsafe impl Sync for PingPongBuffer {}

impl PingPongBuffer {
    /// Create an empty buffer. Both banks hold zero valid samples.
    pub const fn new() -> Self {
        PingPongBuffer {
            banks: [
                UnsafeCell::new([0; BANK_SIZE]),
                UnsafeCell::new([0; BANK_SIZE]),
            ],
            lens: [AtomicU16::new(0), AtomicU16::new(0)],
            state: AtomicU32::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Reset the buffer and split it into its consumer and producer halves.
    pub fn split(&mut self) -> (BankReader<'_>, BankWriter<'_>) {
        *self.state.get_mut() = 0;
        *self.lens[0].get_mut() = 0;
        *self.lens[1].get_mut() = 0;
        *self.available.get_mut() = true;

        let buf: &PingPongBuffer = self;
        (BankReader { buf }, BankWriter { buf })
    }

    fn load_state(&self) -> BufferState {
        BufferState(self.state.load(Ordering::Acquire))
    }

    fn len_of(&self, bank: usize) -> u32 {
        self.lens[bank].load(Ordering::Acquire) as u32
    }

    /// Read one sample of `bank`.
    ///
    /// # Safety
    /// `bank` must be the read bank of a state observed by the consumer.
    #[inline(always)]
    unsafe fn sample(&self, bank: usize, index: u32) -> i16 {
        let data = self.banks[bank].get() as *const i16;
        // SAFETY: callers clamp `index` below the bank's valid length, which
        // never exceeds BANK_SIZE.
        unsafe { *data.add(index as usize) }
    }
}

impl Default for PingPongBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a cursor to a bank index, walking down from the end when reversed.
#[inline(always)]
fn bank_index(cursor: u32, len: u32, reversed: bool) -> u32 {
    if reversed {
        len - 1 - cursor
    } else {
        cursor
    }
}

/// Consumer half, used from the sample interrupt.
pub struct BankReader<'a> {
    buf: &'a PingPongBuffer,
}

impl BankReader<'_> {
    /// Return the next sample and advance the cursor.
    ///
    /// When the read bank is exhausted and the producer has published the other
    /// bank, the banks are swapped in place. Without a published bank the last
    /// valid sample is held. An unavailable stream yields silence.
    #[inline]
    pub fn next_sample(&mut self) -> i16 {
        let buf = self.buf;
        if !buf.available.load(Ordering::Relaxed) {
            return 0;
        }

        let mut raw = buf.state.load(Ordering::Acquire);
        loop {
            let state = BufferState(raw);
            let bank = state.read_bank();
            let len = buf.len_of(bank);
            let cursor = state.cursor();

            if cursor >= len {
                if state.is_write_ready() {
                    let swapped = (raw ^ READ_BANK) & !(WRITE_READY | CURSOR_MASK);
                    match buf.state.compare_exchange(
                        raw,
                        swapped,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => raw = swapped,
                        Err(current) => raw = current,
                    }
                    continue;
                }
                if len == 0 {
                    return 0;
                }
                // Underrun: hold the last sample played.
                let index = bank_index(len - 1, len, state.is_reversed());
                // SAFETY: `bank` is the read bank of `state`; `index < len`.
                return unsafe { buf.sample(bank, index) };
            }

            let index = bank_index(cursor, len, state.is_reversed());
            // SAFETY: `bank` is the read bank of `state`; `index < len`.
            let sample = unsafe { buf.sample(bank, index) };
            match buf.state.compare_exchange(
                raw,
                raw + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return sample,
                // The producer swapped or reversed under us; retry on the new state.
                Err(current) => raw = current,
            }
        }
    }

    pub fn state(&self) -> BufferState {
        self.buf.load_state()
    }

    pub fn is_available(&self) -> bool {
        self.buf.available.load(Ordering::Relaxed)
    }
}

/// Producer half, used from cooperative code.
pub struct BankWriter<'a> {
    buf: &'a PingPongBuffer,
}

impl BankWriter<'_> {
    pub fn state(&self) -> BufferState {
        self.buf.load_state()
    }

    /// Valid sample count of `bank`.
    pub fn valid_len(&self, bank: usize) -> u32 {
        self.buf.len_of(bank)
    }

    /// The read bank has been fully consumed.
    pub fn is_exhausted(&self) -> bool {
        let state = self.state();
        state.cursor() >= self.valid_len(state.read_bank())
    }

    pub fn is_available(&self) -> bool {
        self.buf.available.load(Ordering::Relaxed)
    }

    /// Mark the backing file as lost (or recovered).
    pub fn set_available(&mut self, available: bool) {
        self.buf.available.store(available, Ordering::Relaxed);
    }

    /// Fill the write bank and publish it.
    ///
    /// `fill` receives the whole bank and returns how many samples it wrote.
    /// Nothing is published when it writes zero samples or fails. Returns
    /// `Ok(0)` without calling `fill` if a block is already published.
    pub fn fill<E, F>(&mut self, fill: F) -> Result<usize, E>
    where
        F: FnOnce(&mut [i16; BANK_SIZE]) -> Result<usize, E>,
    {
        let state = self.state();
        if state.is_write_ready() {
            return Ok(0);
        }
        let bank = state.write_bank();

        // SAFETY: write-ready is clear, so the consumer will not swap into
        // `bank`, and `bank` is not the read bank. We are the sole producer and
        // `&mut self` rules out a second live borrow.
        let data = unsafe { &mut *self.buf.banks[bank].get() };
        let written = fill(data)?.min(BANK_SIZE);

        if written > 0 {
            self.buf.lens[bank].store(written as u16, Ordering::Release);
            // Release ordering makes the bank contents and length visible
            // before the consumer can observe write-ready.
            self.buf.state.fetch_or(WRITE_READY, Ordering::Release);
        }
        Ok(written)
    }

    /// Swap in the published bank if the read bank has run dry.
    pub fn swap_if_exhausted(&mut self) -> bool {
        let buf = self.buf;
        buf.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let state = BufferState(raw);
                let exhausted = state.cursor() >= buf.len_of(state.read_bank());
                (exhausted && state.is_write_ready())
                    .then(|| (raw ^ READ_BANK) & !(WRITE_READY | CURSOR_MASK))
            })
            .is_ok()
    }

    /// Swap in the published bank immediately, abandoning the rest of the read bank.
    pub fn swap_now(&mut self) -> bool {
        self.buf
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                BufferState(raw)
                    .is_write_ready()
                    .then(|| (raw ^ READ_BANK) & !(WRITE_READY | CURSOR_MASK))
            })
            .is_ok()
    }

    /// Drop a published but not yet swapped block.
    pub fn discard_prefetch(&mut self) {
        self.buf.state.fetch_and(!WRITE_READY, Ordering::AcqRel);
    }

    /// Flip the read direction.
    ///
    /// The cursor is mirrored so playback continues from the sample just
    /// played, and any published block is discarded because it was fetched
    /// for the old direction. Returns the new direction.
    pub fn reverse(&mut self) -> bool {
        let buf = self.buf;
        let previous = buf
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let state = BufferState(raw);
                let len = buf.len_of(state.read_bank());
                let cursor = state.cursor().min(len);
                Some(((raw ^ REVERSED) & !(WRITE_READY | CURSOR_MASK)) | (len - cursor))
            })
            .unwrap_or_else(|raw| raw);
        !BufferState(previous).is_reversed()
    }
}
