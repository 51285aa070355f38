//! Host-side stand-ins for the hardware and storage seams.
//!
//! Mocks hand out cheap clones sharing one state cell, so a test keeps a
//! handle to inspect or drive a device after moving it into a channel.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::format;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType, InputPin};

use crate::hal::{AnalogInput, DacWriter, SampleClock, TimerId};
use crate::storage::{LoopFile, LoopPath, Storage};

/// `0, 1, 2, ...` as samples; easy to tell apart by position.
pub fn ramp(len: usize) -> Vec<i16> {
    (0..len).map(|i| i as i16).collect()
}

// ── Storage ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStorageError {
    NotFound,
    Io,
}

#[derive(Default)]
struct StorageLog {
    seeks: Vec<u32>,
    reads: Vec<usize>,
    closes: usize,
}

/// In-memory loop directory.
#[derive(Default)]
pub struct MockStorage {
    files: Vec<(String, Rc<Vec<u8>>)>,
    log: Rc<RefCell<StorageLog>>,
    fail: Rc<Cell<bool>>,
}

impl MockStorage {
    pub fn with_file(path: &LoopPath<'_>, samples: &[i16]) -> Self {
        let mut storage = Self::default();
        storage.add_file(path, samples);
        storage
    }

    pub fn add_file(&mut self, path: &LoopPath<'_>, samples: &[i16]) {
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.files
            .push((key(crate::constants::LOOP_ROOT, path), Rc::new(bytes)));
    }

    /// Make every seek and read on open files fail (or recover).
    pub fn fail_reads(&self, fail: bool) {
        self.fail.set(fail);
    }

    /// How many times a file was positioned at sample `sample`.
    pub fn reads_at(&self, sample: u32) -> usize {
        self.log
            .borrow()
            .seeks
            .iter()
            .filter(|&&offset| offset == sample * 2)
            .count()
    }

    /// Number of files closed so far.
    pub fn closed(&self) -> usize {
        self.log.borrow().closes
    }

    /// Byte counts of every read issued so far.
    pub fn read_sizes(&self) -> Vec<usize> {
        self.log.borrow().reads.clone()
    }
}

fn key(root: &str, path: &LoopPath<'_>) -> String {
    format!("{}/{}/{}", root, path.subfolder, path.filename)
}

impl Storage for MockStorage {
    type File = MockFile;
    type Error = MockStorageError;

    fn open(&mut self, root: &str, path: &LoopPath<'_>) -> Result<MockFile, MockStorageError> {
        let wanted = key(root, path);
        let (_, data) = self
            .files
            .iter()
            .find(|(name, _)| *name == wanted)
            .ok_or(MockStorageError::NotFound)?;
        Ok(MockFile {
            data: data.clone(),
            pos: 0,
            log: self.log.clone(),
            fail: self.fail.clone(),
        })
    }
}

pub struct MockFile {
    data: Rc<Vec<u8>>,
    pos: usize,
    log: Rc<RefCell<StorageLog>>,
    fail: Rc<Cell<bool>>,
}

impl LoopFile for MockFile {
    type Error = MockStorageError;

    fn size_bytes(&self) -> u32 {
        self.data.len() as u32
    }

    fn seek(&mut self, offset: u32) -> Result<(), MockStorageError> {
        if self.fail.get() {
            return Err(MockStorageError::Io);
        }
        self.log.borrow_mut().seeks.push(offset);
        self.pos = (offset as usize).min(self.data.len());
        Ok(())
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, MockStorageError> {
        if self.fail.get() {
            return Err(MockStorageError::Io);
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        self.log.borrow_mut().reads.push(n);
        Ok(n)
    }

    fn close(self) {
        self.log.borrow_mut().closes += 1;
    }
}

// ── DAC ──

/// Records every code written.
#[derive(Clone, Default)]
pub struct MockDac {
    writes: Rc<RefCell<Vec<u16>>>,
}

impl MockDac {
    pub fn writes(&self) -> Vec<u16> {
        self.writes.borrow().clone()
    }
}

impl DacWriter for MockDac {
    fn write(&mut self, value: u16) {
        self.writes.borrow_mut().push(value);
    }
}

// ── Inputs ──

/// Digital input driven by the test through `embedded-hal`.
#[derive(Clone, Default)]
pub struct MockTrigger {
    level: Rc<Cell<bool>>,
}

impl MockTrigger {
    pub fn set(&self, high: bool) {
        self.level.set(high);
    }
}

impl ErrorType for MockTrigger {
    type Error = Infallible;
}

impl InputPin for MockTrigger {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.level.get())
    }
}

/// Raw bipolar ADC reading set by the test. Reads 0 V by default.
#[derive(Clone)]
pub struct MockAnalog {
    raw: Rc<Cell<u16>>,
}

impl Default for MockAnalog {
    fn default() -> Self {
        MockAnalog {
            raw: Rc::new(Cell::new(2048)),
        }
    }
}

impl MockAnalog {
    pub fn set_raw(&self, raw: u16) {
        self.raw.set(raw);
    }

    /// Set the reading that remaps to `value` on the 0–4095 scale. Odd values
    /// round down.
    pub fn set_unipolar(&self, value: u16) {
        self.raw.set(2048 + value / 2);
    }
}

impl AnalogInput for MockAnalog {
    fn read_raw(&mut self) -> u16 {
        self.raw.get()
    }
}

// ── Clock ──

#[derive(Default)]
pub struct MockClock {
    pub armed: Vec<(TimerId, u32)>,
}

impl SampleClock for MockClock {
    fn arm(&mut self, timer: TimerId, hz: u32) {
        self.armed.push((timer, hz));
    }
}
