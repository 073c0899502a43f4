//! Codec selection and the reader dispatching to each storage encoding.

use std::io::{Read, Seek, SeekFrom};

use tracing::instrument;

use crate::{
    file::{DeflateFile, LzssBlockFile, PlainFile, VirtualFile},
    error::Result,
    index::DatEntry,
    read::ArchiveOptions,
};

/// Identifies the storage format of an entry inside a DAT archive
///
/// Fallout 2 trees store it as a single byte. Fallout 1 archives mark LZSS entries with an
/// attribute bit and Arcanum archives use their own record kind, both are mapped onto this enum.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None = 0,

    /// Data is a zlib stream
    Zlib = 1,

    /// Data is a stream of LZSS packets
    Lzss = 2,
}

impl TryFrom<u8> for CompressionMethod {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0 => Ok(CompressionMethod::None),
            1 => Ok(CompressionMethod::Zlib),
            2 => Ok(CompressionMethod::Lzss),
            other => Err(other),
        }
    }
}

/// Reader over one entry, backed by the implementation matching its codec
#[derive(Debug)]
pub enum DatFileReader {
    /// Stored entry
    Plain(PlainFile),
    /// Zlib entry
    Deflate(Box<DeflateFile>),
    /// LZSS entry
    Lzss(Box<LzssBlockFile>),
}

impl DatFileReader {
    /// Pick the implementation for an entry
    #[instrument(skip(options), fields(name = %entry.name))]
    pub fn new(entry: &DatEntry, options: &ArchiveOptions) -> Self {
        let begin = u64::from(entry.offset);
        let real_size = u64::from(entry.real_size);
        let packed_size = u64::from(entry.packed_size);

        match entry.compression_method {
            CompressionMethod::None => DatFileReader::Plain(PlainFile::new(begin, real_size)),
            CompressionMethod::Zlib => DatFileReader::Deflate(Box::new(DeflateFile::new(
                begin,
                packed_size,
                real_size,
                options.inflate_buffer_size,
            ))),
            CompressionMethod::Lzss => DatFileReader::Lzss(Box::new(LzssBlockFile::new(
                begin,
                packed_size,
                real_size,
                options.block_index,
            ))),
        }
    }
}

impl VirtualFile for DatFileReader {
    fn read<R: Read + Seek>(&mut self, source: &mut R, buf: &mut [u8]) -> Result<usize> {
        match self {
            DatFileReader::Plain(f) => f.read(source, buf),
            DatFileReader::Deflate(f) => f.read(source, buf),
            DatFileReader::Lzss(f) => f.read(source, buf),
        }
    }

    fn seek<R: Read + Seek>(&mut self, source: &mut R, pos: SeekFrom) -> Result<u64> {
        match self {
            DatFileReader::Plain(f) => f.seek(source, pos),
            DatFileReader::Deflate(f) => f.seek(source, pos),
            DatFileReader::Lzss(f) => f.seek(source, pos),
        }
    }

    fn tell(&self) -> u64 {
        match self {
            DatFileReader::Plain(f) => f.tell(),
            DatFileReader::Deflate(f) => f.tell(),
            DatFileReader::Lzss(f) => f.tell(),
        }
    }

    fn size(&self) -> u64 {
        match self {
            DatFileReader::Plain(f) => f.size(),
            DatFileReader::Deflate(f) => f.size(),
            DatFileReader::Lzss(f) => f.size(),
        }
    }
}
