//! Entries stored as a zlib stream.
//!
//! The inflater and its input buffer are created on first read, so opening an entry only to ask
//! for its size costs nothing. Seeking backwards restarts the stream, seeking forwards inflates
//! and discards.

use std::fmt::{self, Debug};
use std::io::{Read, Seek, SeekFrom};

use flate2::{Decompress, FlushDecompress, Status};
use tracing::{instrument, trace, warn};

use super::{read_full, resolve_seek, seek_to, VirtualFile, SKIP_CHUNK};
use crate::error::{Error, Result};

/// A zlib compressed entry inflated on demand
pub struct DeflateFile {
    begin: u64,
    packed_size: u64,
    real_size: u64,
    pos: u64,

    // compressed bytes already pulled from the archive
    fed: u64,
    chunk_size: usize,
    input: Vec<u8>,
    in_start: usize,
    in_end: usize,

    inflater: Option<Decompress>,
    finished: bool,
}

impl Debug for DeflateFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DeflateFile")
            .field("begin", &self.begin)
            .field("packed_size", &self.packed_size)
            .field("real_size", &self.real_size)
            .field("pos", &self.pos)
            .field("fed", &self.fed)
            .field("finished", &self.finished)
            .finish()
    }
}

impl DeflateFile {
    /// View a zlib stream of `packed_size` bytes at `begin` that inflates to `real_size` bytes.
    ///
    /// Compressed data is pulled from the archive `chunk_size` bytes at a time.
    pub fn new(begin: u64, packed_size: u64, real_size: u64, chunk_size: usize) -> Self {
        Self {
            begin,
            packed_size,
            real_size,
            pos: 0,
            fed: 0,
            chunk_size: chunk_size.max(1),
            input: Vec::new(),
            in_start: 0,
            in_end: 0,
            inflater: None,
            finished: false,
        }
    }

    /// Size of the compressed stream inside the archive
    pub fn packed_size(&self) -> u64 {
        self.packed_size
    }

    fn refill<R: Read + Seek>(&mut self, source: &mut R) -> Result<()> {
        if self.input.is_empty() {
            let cap = usize::try_from(self.packed_size)
                .unwrap_or(usize::MAX)
                .min(self.chunk_size);
            self.input
                .try_reserve_exact(cap)
                .map_err(|_| Error::AllocFailed(cap))?;
            self.input.resize(cap, 0);
        }

        let want = (self.packed_size - self.fed).min(self.input.len() as u64) as usize;
        seek_to(source, self.begin + self.fed)?;
        let n = read_full(source, &mut self.input[..want])?;

        if n == 0 {
            warn!(
                fed = self.fed,
                packed_size = self.packed_size,
                "compressed entry runs past the end of the archive"
            );
            self.fed = self.packed_size;
        } else {
            self.fed += n as u64;
        }

        self.in_start = 0;
        self.in_end = n;
        Ok(())
    }

    fn reset(&mut self) {
        if let Some(inflater) = self.inflater.as_mut() {
            inflater.reset(true);
        }
        self.fed = 0;
        self.in_start = 0;
        self.in_end = 0;
        self.pos = 0;
        self.finished = false;
    }

    fn skip<R: Read + Seek>(&mut self, source: &mut R, mut n: u64) -> Result<()> {
        let mut scratch = [0u8; SKIP_CHUNK];
        while n > 0 {
            let step = n.min(SKIP_CHUNK as u64) as usize;
            let read = self.read(source, &mut scratch[..step])?;
            if read == 0 {
                break;
            }
            n -= read as u64;
        }
        Ok(())
    }
}

impl VirtualFile for DeflateFile {
    #[instrument(level = "trace", skip(self, source, buf), fields(len = buf.len()), err)]
    fn read<R: Read + Seek>(&mut self, source: &mut R, buf: &mut [u8]) -> Result<usize> {
        let want = (self.real_size - self.pos).min(buf.len() as u64) as usize;
        if want == 0 {
            return Ok(0);
        }

        let mut produced = 0;
        while produced < want && !self.finished {
            if self.in_start == self.in_end && self.fed < self.packed_size {
                self.refill(source)?;
            }

            let inflater = self.inflater.get_or_insert_with(|| Decompress::new(true));
            let (before_in, before_out) = (inflater.total_in(), inflater.total_out());
            let status = inflater.decompress(
                &self.input[self.in_start..self.in_end],
                &mut buf[produced..want],
                FlushDecompress::None,
            )?;
            let consumed = (inflater.total_in() - before_in) as usize;
            let written = (inflater.total_out() - before_out) as usize;

            self.in_start += consumed;
            produced += written;

            if status == Status::StreamEnd {
                self.finished = true;
                break;
            }

            if consumed == 0 && written == 0 {
                if self.in_start == self.in_end {
                    // compressed data ran out before the stream end
                    break;
                }
                return Err(Error::DecodeError(format!(
                    "inflater stalled after {} bytes",
                    self.pos + produced as u64
                )));
            }
        }

        self.pos += produced as u64;

        if self.pos < self.real_size && (produced == 0 || self.finished) {
            warn!(
                declared = self.real_size,
                actual = self.pos,
                "compressed entry ended early, correcting its size"
            );
            self.real_size = self.pos;
        }

        trace!(produced, pos = self.pos, "inflated");
        Ok(produced)
    }

    #[instrument(level = "trace", skip(self, source), err)]
    fn seek<R: Read + Seek>(&mut self, source: &mut R, pos: SeekFrom) -> Result<u64> {
        let target = resolve_seek(pos, self.pos, self.real_size);
        if target < self.pos {
            self.reset();
        }
        self.skip(source, target - self.pos)?;
        Ok(self.pos)
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.real_size
    }
}
