//! Entries stored without compression.

use std::io::{Read, Seek, SeekFrom};

use tracing::{instrument, warn};

use super::{read_full, resolve_seek, seek_to, VirtualFile};
use crate::error::Result;

/// A slice of the archive read as is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainFile {
    begin: u64,
    size: u64,
    pos: u64,
}

impl PlainFile {
    /// View `size` bytes starting at `begin`
    pub fn new(begin: u64, size: u64) -> Self {
        Self {
            begin,
            size,
            pos: 0,
        }
    }

    /// Offset of the first byte within the archive
    pub fn begin(&self) -> u64 {
        self.begin
    }
}

impl VirtualFile for PlainFile {
    #[instrument(level = "trace", skip(self, source, buf), fields(len = buf.len()), err)]
    fn read<R: Read + Seek>(&mut self, source: &mut R, buf: &mut [u8]) -> Result<usize> {
        let want = (self.size - self.pos).min(buf.len() as u64) as usize;
        if want == 0 {
            return Ok(0);
        }

        seek_to(source, self.begin + self.pos)?;
        let n = read_full(source, &mut buf[..want])?;
        self.pos += n as u64;

        if n == 0 {
            warn!(
                declared = self.size,
                actual = self.pos,
                "stored entry ended early, correcting its size"
            );
            self.size = self.pos;
        }

        Ok(n)
    }

    #[instrument(level = "trace", skip(self, source), err)]
    fn seek<R: Read + Seek>(&mut self, source: &mut R, pos: SeekFrom) -> Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.size);
        seek_to(source, self.begin + self.pos)?;
        Ok(self.pos)
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, Cursor, Read, Seek, SeekFrom};

    use pretty_assertions::assert_eq;

    use super::PlainFile;
    use crate::error::Result;
    use crate::file::VirtualFile;

    #[test]
    fn reads_are_bounded_by_the_entry() -> Result<()> {
        let mut source = Cursor::new(b"xxHello Worldyy".to_vec());
        let mut file = PlainFile::new(2, 11);

        let mut buf = [0u8; 32];
        let n = file.read(&mut source, &mut buf)?;
        assert_eq!(&buf[..n], b"Hello World");
        assert!(file.eof());
        assert_eq!(file.read(&mut source, &mut buf)?, 0);

        Ok(())
    }

    #[test]
    fn seek_then_read() -> Result<()> {
        let mut source = Cursor::new(b"xxHello Worldyy".to_vec());
        let mut file = PlainFile::new(2, 11);

        assert_eq!(file.seek(&mut source, SeekFrom::End(-5))?, 6);
        let mut buf = [0u8; 3];
        assert_eq!(file.read(&mut source, &mut buf)?, 3);
        assert_eq!(&buf, b"Wor");
        assert_eq!(file.tell(), 9);

        assert_eq!(file.seek(&mut source, SeekFrom::Current(-100))?, 0);
        assert_eq!(file.seek(&mut source, SeekFrom::Start(100))?, 11);

        Ok(())
    }

    #[test]
    fn short_archive_corrects_size() -> Result<()> {
        let mut source = Cursor::new(b"xxHel".to_vec());
        let mut file = PlainFile::new(2, 11);

        let mut buf = [0u8; 32];
        assert_eq!(file.read(&mut source, &mut buf)?, 3);
        assert_eq!(file.read(&mut source, &mut buf)?, 0);
        assert_eq!(file.size(), 3);
        assert!(file.eof());

        Ok(())
    }

    /// Counts absolute seeks, the ones that drop a `BufReader` buffer
    struct CountingSeeks<R> {
        inner: R,
        absolute: usize,
    }

    impl<R: Read> Read for CountingSeeks<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl<R: Seek> Seek for CountingSeeks<R> {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            if matches!(pos, SeekFrom::Start(_)) {
                self.absolute += 1;
            }
            self.inner.seek(pos)
        }
    }

    #[test]
    fn sequential_reads_seek_once() -> Result<()> {
        let mut source = CountingSeeks {
            inner: Cursor::new(b"xxHello Worldyy".to_vec()),
            absolute: 0,
        };
        let mut file = PlainFile::new(2, 11);

        let mut out = Vec::new();
        let mut buf = [0u8; 2];
        loop {
            let n = file.read(&mut source, &mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"Hello World");
        assert_eq!(source.absolute, 1);

        file.seek(&mut source, SeekFrom::Start(6))?;
        let n = file.read(&mut source, &mut buf)?;
        assert_eq!(&buf[..n], b"Wo");
        assert_eq!(source.absolute, 2);

        Ok(())
    }
}
