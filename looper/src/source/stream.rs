//! Streaming sample source backed by block storage.
//!
//! [`StreamingSource`] is the producer side of a [`PingPongBuffer`]: it owns the
//! open file, decides which block of the playback window to fetch next and
//! performs the blocking reads. It must only be driven from cooperative code.
//!
//! ## Playback window
//!
//! The window is expressed as 0–4095 fractions of the file:
//!
//! - start: `total * start / 4096`
//! - length: `span * (end + 1) / 4096 + span * fine / 65536`, where
//!   `span = total - start`, clamped to `[MIN_WINDOW_SAMPLES, span]`
//!
//! Window changes take effect at the next block boundary. Seeks take effect
//! immediately: the rest of the read bank is abandoned.

use rand::{Rng, RngCore};

use crate::constants::{BANK_SIZE, FACTOR_MAX, LOOP_ROOT, MIN_WINDOW_SAMPLES, SECTOR_BYTES};
use crate::storage::{LoopFile, LoopPath, Storage};

use super::ping_pong::{BankReader, BankWriter, PingPongBuffer};

/// A contiguous run of file samples held by one bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Block {
    pub start: u32,
    pub len: u32,
}

impl Block {
    pub fn end(&self) -> u32 {
        self.start + self.len
    }
}

/// Playback window in file samples, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u32,
    pub end: u32,
}

impl Window {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Producer half of a streaming loop.
pub struct StreamingSource<'a, F: LoopFile> {
    writer: BankWriter<'a>,
    file: Option<F>,
    total: u32,
    looping: bool,
    start_factor: u16,
    end_factor: u16,
    fine_end_factor: u16,
    window: Window,
    /// What each physical bank currently holds.
    blocks: [Block; 2],
    pending_seek: Option<u32>,
    refills: u32,
}

impl<'a, F: LoopFile> StreamingSource<'a, F> {
    /// Open `loops/<subfolder>/<filename>` and load its first block.
    ///
    /// Returns the producer half plus the reader for the sample interrupt. If
    /// the file cannot be opened or is empty the source is created
    /// unavailable and plays silence.
    pub fn open<S>(
        storage: &mut S,
        path: &LoopPath<'_>,
        buffer: &'a mut PingPongBuffer,
        looping: bool,
    ) -> (Self, BankReader<'a>)
    where
        S: Storage<File = F>,
    {
        let (reader, writer) = buffer.split();
        let mut source = StreamingSource {
            writer,
            file: None,
            total: 0,
            looping,
            start_factor: 0,
            end_factor: FACTOR_MAX,
            fine_end_factor: 0,
            window: Window { start: 0, end: 0 },
            blocks: [Block::default(); 2],
            pending_seek: None,
            refills: 0,
        };

        match storage.open(LOOP_ROOT, path) {
            Ok(file) => {
                let total = file.size_bytes() / 2;
                if total == 0 {
                    log::warn!("{}/{}: empty loop file", path.subfolder, path.filename);
                    source.writer.set_available(false);
                    file.close();
                } else {
                    log::info!(
                        "{}/{}: {} samples, looping={}",
                        path.subfolder,
                        path.filename,
                        total,
                        looping
                    );
                    source.file = Some(file);
                    source.total = total;
                    source.update_window();
                    source.pending_seek = Some(source.window.start);
                    source.refresh();
                }
            }
            Err(e) => {
                log::warn!("{}/{}: open failed: {:?}", path.subfolder, path.filename, e);
                source.writer.set_available(false);
            }
        }

        (source, reader)
    }

    /// Whether [`refresh()`](Self::refresh) has work to do.
    ///
    /// True when a seek is pending, when the inactive bank is empty and there
    /// is more data to prefetch, or when the read bank has run dry with a
    /// published bank waiting.
    pub fn is_ready_for_refresh(&self) -> bool {
        if !self.is_available() {
            return false;
        }
        if self.pending_seek.is_some() {
            return true;
        }
        let state = self.writer.state();
        if state.is_write_ready() {
            self.writer.is_exhausted()
        } else {
            self.next_block().is_some()
        }
    }

    /// Perform pending storage work. Blocking; never call from an interrupt.
    pub fn refresh(&mut self) {
        if !self.is_available() {
            return;
        }

        if let Some(position) = self.pending_seek.take() {
            self.writer.discard_prefetch();
            let block = self.seek_block(position);
            if !self.load(block) {
                return;
            }
            self.writer.swap_now();
        } else {
            self.writer.swap_if_exhausted();
        }

        if !self.writer.state().is_write_ready() {
            if let Some(block) = self.next_block() {
                self.load(block);
            }
        }
    }

    /// Flip the playback direction.
    pub fn reverse(&mut self) {
        let reversed = self.writer.reverse();
        log::debug!("stream reversed={}", reversed);
    }

    pub fn is_reversed(&self) -> bool {
        self.writer.state().is_reversed()
    }

    /// Jump to a uniformly random position inside the window.
    pub fn seek_random<R: RngCore>(&mut self, rng: &mut R) {
        if self.window.is_empty() {
            return;
        }
        let offset = rng.gen_range(0..self.window.len());
        self.seek_to(self.window.start + offset);
    }

    /// Jump to `count` samples into the window, wrapping at the window length.
    pub fn seek_mod_position(&mut self, count: u32) {
        if self.window.is_empty() {
            return;
        }
        self.seek_to(self.window.start + count % self.window.len());
    }

    /// Restart from the beginning of the window (its end when reversed).
    pub fn reset(&mut self) {
        if self.window.is_empty() {
            return;
        }
        let position = if self.is_reversed() {
            self.window.end - 1
        } else {
            self.window.start
        };
        self.seek_to(position);
    }

    pub fn set_start_factor(&mut self, factor: u16) {
        self.start_factor = factor.min(FACTOR_MAX);
        self.update_window();
    }

    pub fn set_end_factor(&mut self, factor: u16) {
        self.end_factor = factor.min(FACTOR_MAX);
        self.update_window();
    }

    pub fn set_fine_end_factor(&mut self, factor: u16) {
        self.fine_end_factor = factor.min(FACTOR_MAX);
        self.update_window();
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Total samples in the file.
    pub fn total_samples(&self) -> u32 {
        self.total
    }

    pub fn is_available(&self) -> bool {
        self.file.is_some() && self.writer.is_available()
    }

    /// Number of blocks read from storage since opening.
    pub fn refill_count(&self) -> u32 {
        self.refills
    }

    /// Block held by the bank the interrupt is reading.
    pub fn current_block(&self) -> Block {
        self.blocks[self.writer.state().read_bank()]
    }

    /// Block waiting in the write bank, if one is published.
    pub fn prefetched_block(&self) -> Option<Block> {
        let state = self.writer.state();
        state
            .is_write_ready()
            .then(|| self.blocks[state.write_bank()])
    }

    /// File position of the next sample the interrupt will read.
    pub fn position(&self) -> u32 {
        let state = self.writer.state();
        let block = self.blocks[state.read_bank()];
        let cursor = state.cursor().min(block.len);
        if state.is_reversed() {
            (block.end() - cursor).saturating_sub(1).max(block.start)
        } else {
            block.start + cursor
        }
    }

    /// Close the file. The source plays silence afterwards.
    ///
    /// Also runs when the source is dropped.
    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            log::debug!("stream closed after {} refills", self.refills);
            file.close();
        }
        self.writer.set_available(false);
    }

    fn seek_to(&mut self, position: u32) {
        log::debug!("stream seek to {}", position);
        self.pending_seek = Some(position);
    }

    fn update_window(&mut self) {
        let total = self.total as u64;
        let start = (total * self.start_factor as u64 / 4096) as u32;
        let span = self.total - start;
        let coarse = (span as u64 * (self.end_factor as u64 + 1)) >> 12;
        let fine = (span as u64 * self.fine_end_factor as u64) >> 16;
        let len = ((coarse + fine).min(span as u64) as u32).max(MIN_WINDOW_SAMPLES.min(span));

        self.window = Window {
            start,
            end: start + len,
        };
        // A prefetched block may lie outside the new window.
        self.writer.discard_prefetch();
    }

    /// Block to load for a seek to `position`; it becomes the read bank at once.
    fn seek_block(&self, position: u32) -> Block {
        let w = self.window;
        let position = position.clamp(w.start, w.end - 1);
        if self.is_reversed() {
            let end = position + 1;
            let start = end.saturating_sub(BANK_SIZE as u32).max(w.start);
            Block {
                start,
                len: end - start,
            }
        } else {
            Block {
                start: position,
                len: (w.end - position).min(BANK_SIZE as u32),
            }
        }
    }

    /// Block that follows the read bank in the current direction.
    fn next_block(&self) -> Option<Block> {
        let w = self.window;
        if w.is_empty() {
            return None;
        }
        let current = self.current_block();

        if self.is_reversed() {
            let mut end = current.start.min(w.end);
            if end <= w.start {
                if !self.looping {
                    return None;
                }
                end = w.end;
            }
            let start = end.saturating_sub(BANK_SIZE as u32).max(w.start);
            Some(Block {
                start,
                len: end - start,
            })
        } else {
            let mut start = current.end().max(w.start);
            if start >= w.end {
                if !self.looping {
                    return None;
                }
                start = w.start;
            }
            Some(Block {
                start,
                len: (w.end - start).min(BANK_SIZE as u32),
            })
        }
    }

    /// Read `block` into the write bank and publish it.
    fn load(&mut self, block: Block) -> bool {
        let Some(file) = self.file.as_mut() else {
            return false;
        };
        let bank = self.writer.state().write_bank();
        let result = self
            .writer
            .fill(|data| read_samples(file, block.start, &mut data[..block.len as usize]));

        match result {
            Ok(0) => {
                log::warn!("short read at sample {}", block.start);
                false
            }
            Ok(n) => {
                self.blocks[bank] = Block {
                    start: block.start,
                    len: n as u32,
                };
                self.refills += 1;
                log::trace!("bank {} <- {}+{}", bank, block.start, n);
                true
            }
            Err(e) => {
                log::warn!("storage read failed at sample {}: {:?}", block.start, e);
                self.writer.set_available(false);
                false
            }
        }
    }
}

impl<F: LoopFile> Drop for StreamingSource<'_, F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read little-endian `i16` samples starting at sample `start`, one sector at a time.
fn read_samples<F: LoopFile>(file: &mut F, start: u32, out: &mut [i16]) -> Result<usize, F::Error> {
    file.seek(start * 2)?;

    let mut scratch = [0u8; SECTOR_BYTES];
    let mut filled = 0;
    while filled < out.len() {
        let want = ((out.len() - filled) * 2).min(SECTOR_BYTES);
        let got = file.read_block(&mut scratch[..want])?;
        let samples = got / 2;
        for (dst, bytes) in out[filled..filled + samples]
            .iter_mut()
            .zip(scratch[..samples * 2].chunks_exact(2))
        {
            *dst = i16::from_le_bytes([bytes[0], bytes[1]]);
        }
        filled += samples;
        // End of file, or an odd trailing byte.
        if got < want {
            break;
        }
    }
    Ok(filled)
}
