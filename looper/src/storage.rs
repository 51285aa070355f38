//! Block storage collaborator.
//!
//! Loop files are raw little-endian signed 16-bit samples stored under
//! `loops/<subfolder>/<filename>`. The engine only needs to open a file, learn
//! its size, seek to a byte offset and read blocks of bytes.

use core::convert::Infallible;
use core::fmt::Debug;

/// Location of one loop file below [`LOOP_ROOT`](crate::constants::LOOP_ROOT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPath<'a> {
    pub subfolder: &'a str,
    pub filename: &'a str,
}

impl<'a> LoopPath<'a> {
    pub const fn new(subfolder: &'a str, filename: &'a str) -> Self {
        LoopPath {
            subfolder,
            filename,
        }
    }
}

/// A filesystem able to open loop files.
pub trait Storage {
    type File: LoopFile;
    type Error: Debug;

    /// Open `root/<path.subfolder>/<path.filename>` for reading.
    fn open(&mut self, root: &str, path: &LoopPath<'_>) -> Result<Self::File, Self::Error>;
}

/// An open loop file.
pub trait LoopFile {
    type Error: Debug;

    /// Total file size in bytes.
    fn size_bytes(&self) -> u32;

    /// Move the read position to `offset` bytes from the start of the file.
    fn seek(&mut self, offset: u32) -> Result<(), Self::Error>;

    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// Returns `Ok(0)` at end of file.
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Release the file handle.
    fn close(self)
    where
        Self: Sized,
    {
    }
}

/// Uninhabited file type for channels that only use in-memory sources.
impl LoopFile for Infallible {
    type Error = Infallible;

    fn size_bytes(&self) -> u32 {
        match *self {}
    }

    fn seek(&mut self, _offset: u32) -> Result<(), Self::Error> {
        match *self {}
    }

    fn read_block(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        match *self {}
    }
}
