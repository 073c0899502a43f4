//! Types for reading DAT archives
//!

use bon::Builder;
use std::{
    fmt::{self, Debug},
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};
use tracing::{debug, instrument, trace};

use crate::{
    compression::{CompressionMethod, DatFileReader},
    error::{Error, FileNotFoundError, Result},
    file::VirtualFile,
    index::{ArchiveIndex, DatEntry, DatVersion},
};

// first allocation when loading a compressed entry, doubled as data arrives
const READ_CHUNK: usize = 0x10000;

/// Options for how entries of a DAT archive are read
#[derive(Debug, Clone, Copy, Builder)]
pub struct ArchiveOptions {
    /// Build a block index for LZSS entries on their first seek
    ///
    /// Only has an effect when the `block-index` feature is enabled.
    #[builder(default = true)]
    pub block_index: bool,

    /// Number of compressed bytes pulled from the archive at a time for zlib entries
    #[builder(default = 0x10000)]
    pub inflate_buffer_size: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A struct for reading an entry from a DAT file
///
/// Borrows the archive, so at most one entry of an archive is readable at a time.
pub struct DatFile<'a, R: Read + Seek> {
    data: &'a DatEntry,
    state: &'a mut DatFileReader,
    reader: &'a mut R,
}

impl<R: Read + Seek> Debug for DatFile<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DatFile({:#?})", self.data)
    }
}

/// Methods for retrieving information on DAT file entries
impl<R: Read + Seek> DatFile<'_, R> {
    /// Get the name of the file
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`).
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Get the size of the file, in bytes, when decoded
    ///
    /// Lowered once a read finds the data ends before the size recorded in the archive.
    pub fn size(&self) -> u64 {
        self.state.size()
    }

    /// Current position within the decoded file
    pub fn tell(&self) -> u64 {
        self.state.tell()
    }

    /// Whether the whole file has been read
    pub fn eof(&self) -> bool {
        self.state.eof()
    }

    /// Get the size of the file, in bytes, in the archive
    pub fn compressed_size(&self) -> u64 {
        self.data.stored_len()
    }

    /// Get the starting offset of the data of the file
    pub fn data_start(&self) -> u64 {
        u64::from(self.data.offset)
    }

    /// Get the compression method used for this file
    pub fn compression_method(&self) -> CompressionMethod {
        self.data.compression_method
    }
}

impl<R: Read + Seek> Read for DatFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.state.read(&mut *self.reader, buf)?)
    }
}

impl<R: Read + Seek> Seek for DatFile<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.state.seek(&mut *self.reader, pos)?)
    }
}

#[derive(Debug)]
struct ActiveFile {
    entry: usize,
    reader: DatFileReader,
}

/// DAT archive reader
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_dat_contents(reader: impl Read + Seek) -> fo_dat::error::Result<()> {
///     let mut dat = fo_dat::DatArchive::new(reader)?;
///
///     for i in 0..dat.len() {
///         let mut file = dat.by_index(i)?;
///         println!("Filename: {}", file.name());
///         std::io::copy(&mut file, &mut std::io::stdout())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct DatArchive<R> {
    reader: R,
    index: Arc<ArchiveIndex>,
    options: ArchiveOptions,
    active: Option<ActiveFile>,
}

impl<R> Debug for DatArchive<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DatArchive")
            .field("version", &self.index.version())
            .field("files", &self.index.len())
            .field("options", &self.options)
            .field("active", &self.active)
            .finish()
    }
}

impl<R> DatArchive<R> {
    /// Total size of the files in the archive once decoded, if it can be known.
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for file in self.index.entries() {
            total = total.checked_add(u128::from(file.real_size))?;
        }
        Some(total)
    }

    /// Number of entries contained in this DAT.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether this DAT archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Layout of the archive tree
    pub fn version(&self) -> DatVersion {
        self.index.version()
    }

    /// The parsed tree, shareable with other readers of the same archive
    pub fn index(&self) -> &Arc<ArchiveIndex> {
        &self.index
    }

    /// Options entries are opened with
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Returns an iterator over all the file names in this archive.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.index.file_names()
    }

    /// Whether the archive holds `name`, ignoring case and separator style
    pub fn contains(&self, name: &str) -> bool {
        self.index.get(name).is_some()
    }

    /// Decoded size recorded for `name`, without opening it
    pub fn file_size(&self, name: &str) -> Option<u64> {
        self.index.get(name).map(|entry| u64::from(entry.real_size))
    }

    /// Get the index of a file entry by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.index.get_index_of(name)
    }

    /// Get the name of a file entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.index.get_index(index).map(|entry| entry.name.as_ref())
    }

    /// Names of the entries under `prefix`, see [`ArchiveIndex::list_files`]
    pub fn list_files(&self, prefix: &str, include_subdirs: bool, ext: &str) -> Vec<&str> {
        self.index.list_files(prefix, include_subdirs, ext)
    }

    /// Drop the open file, if any. Returns whether one was open.
    pub fn close_file(&mut self) -> bool {
        self.active.take().is_some()
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> DatArchive<R> {
    /// Read a DAT archive collecting the files it contains.
    pub fn new(reader: R) -> Result<DatArchive<R>> {
        Self::with_options(reader, ArchiveOptions::default())
    }

    /// Read a DAT archive, opening its entries with `options`
    #[instrument(skip(reader), err)]
    pub fn with_options(mut reader: R, options: ArchiveOptions) -> Result<DatArchive<R>> {
        let index = ArchiveIndex::read(&mut reader)?;
        Ok(Self::with_index(reader, Arc::new(index), options))
    }

    /// Wrap a reader over an archive whose tree has already been parsed
    pub fn with_index(reader: R, index: Arc<ArchiveIndex>, options: ArchiveOptions) -> Self {
        DatArchive {
            reader,
            index,
            options,
            active: None,
        }
    }

    /// Open a file by name, ignoring case and separator style
    ///
    /// The previously open file of this archive is dropped.
    pub fn open_file(&mut self, name: &str) -> Result<DatFile<'_, R>> {
        let Some(index) = self.index.get_index_of(name) else {
            return Err(Error::FileNotFound(FileNotFoundError::Name(
                name.to_owned(),
            )));
        };
        self.by_index(index)
    }

    /// Open a contained file by index
    ///
    /// The previously open file of this archive is dropped.
    pub fn by_index(&mut self, file_number: usize) -> Result<DatFile<'_, R>> {
        let data = self
            .index
            .get_index(file_number)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(file_number)))?;

        if let Some(previous) = self.active.take() {
            trace!(entry = previous.entry, "closing previous file");
        }

        let active = self.active.insert(ActiveFile {
            entry: file_number,
            reader: DatFileReader::new(data, &self.options),
        });

        Ok(DatFile {
            data,
            state: &mut active.reader,
            reader: &mut self.reader,
        })
    }

    /// The file opened last, if it has not been closed
    pub fn active_file(&mut self) -> Option<DatFile<'_, R>> {
        let active = self.active.as_mut()?;
        let data = self.index.get_index(active.entry)?;

        Some(DatFile {
            data,
            state: &mut active.reader,
            reader: &mut self.reader,
        })
    }

    /// Decode a whole file into memory without touching the open file
    #[instrument(skip(self), err)]
    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let data = self
            .index
            .get(name)
            .ok_or_else(|| Error::FileNotFound(FileNotFoundError::Name(name.to_owned())))?;

        // stored sizes are bounded by the archive, decoded sizes are only a claim
        let size = data.real_size as usize;
        let first = match data.compression_method {
            CompressionMethod::None => size,
            _ => size.min(READ_CHUNK),
        };

        let mut state = DatFileReader::new(data, &self.options);
        let mut out = Vec::new();
        let mut filled = 0;
        loop {
            if filled == out.len() {
                let grow = out.len().max(first).min(size - out.len());
                if grow == 0 {
                    break;
                }
                out.try_reserve_exact(grow)
                    .map_err(|_| Error::AllocFailed(out.len() + grow))?;
                out.resize(out.len() + grow, 0);
            }

            let n = state.read(&mut self.reader, &mut out[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        out.truncate(filled);

        Ok(out)
    }
}

impl DatArchive<BufReader<File>> {
    /// Open the archive at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ArchiveOptions::default())
    }

    /// Open the archive at `path`, reading its entries with `options`
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::OpenFailed {
            path: path.to_owned(),
            source,
        })?;

        let archive = Self::with_options(BufReader::new(file), options)?;
        debug!(
            path = %path.display(),
            version = ?archive.version(),
            files = archive.len(),
            "mounted archive"
        );

        Ok(archive)
    }
}
