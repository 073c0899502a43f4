//! Seekable views over the bytes of a single archive entry.
//!
//! Every backend keeps its own logical cursor in `[0, size]` and borrows the archive handle only
//! for the duration of a call, repositioning it before each use. Positions requested outside of
//! the entry are clamped rather than rejected, and reading at the end returns zero bytes.

pub mod deflate;
pub mod lzss;
pub mod plain;

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::Result;

pub use deflate::DeflateFile;
pub use lzss::LzssBlockFile;
pub use plain::PlainFile;

/// Uniform read and seek contract shared by every storage encoding
pub trait VirtualFile {
    /// Read up to `buf.len()` decoded bytes, returning `0` at the end of the entry
    fn read<R: Read + Seek>(&mut self, source: &mut R, buf: &mut [u8]) -> Result<usize>;

    /// Move the cursor and return the new absolute position
    fn seek<R: Read + Seek>(&mut self, source: &mut R, pos: SeekFrom) -> Result<u64>;

    /// Current absolute position
    fn tell(&self) -> u64;

    /// Size of the entry once decoded
    ///
    /// Starts at the size recorded in the archive and is lowered if the data ends early.
    fn size(&self) -> u64;

    /// Whether the cursor has reached the end of the entry
    fn eof(&self) -> bool {
        self.tell() >= self.size()
    }
}

/// Resolve a seek request against the current position, clamped to `[0, size]`
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, size: u64) -> u64 {
    let target = match pos {
        SeekFrom::Start(n) => i128::from(n),
        SeekFrom::Current(delta) => i128::from(current) + i128::from(delta),
        SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
    };
    target.clamp(0, i128::from(size)) as u64
}

/// Fill as much of `buf` as the source allows, stopping early only at end of input
pub(crate) fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match source.read(&mut buf[done..]) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(done)
}

/// Position `source` at `offset`, leaving it alone when it is already there
///
/// A buffered archive handle drops its buffer on every absolute seek, so sequential reads skip
/// the call.
pub(crate) fn seek_to<R: Seek>(source: &mut R, offset: u64) -> io::Result<()> {
    if source.stream_position()? != offset {
        source.seek(SeekFrom::Start(offset))?;
    }
    Ok(())
}

/// Size of the scratch buffer used to skip forward through decoded data
pub(crate) const SKIP_CHUNK: usize = 0x1000;
