//! Parsing of the archive tree into a path lookup table.

use std::io::{Cursor, Read, Seek, SeekFrom};

use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::{map::Entry, IndexMap};
use tracing::{debug, instrument, warn};

use crate::{
    compression::CompressionMethod,
    error::{Error, Result},
    types::{
        ArcanumFooter, ArcanumRecord, Dat1DirHeader, Dat1Header, Dat1Name, Dat1Record, DatFooter,
        DatRecord, ARCANUM_FOOTER_SIZE, FOOTER_SIZE,
    },
};

const ARCANUM_MAGIC: &[u8; 4] = b"1TAD";

// smallest encoding of a Fallout 1 directory name or record
const DAT1_MIN_NAME: u64 = 1;
const DAT1_MIN_DIR: u64 = 16;
const DAT1_MIN_RECORD: u64 = 17;

/// Layout of the tree a [`DatArchive`](crate::DatArchive) was read from
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum DatVersion {
    /// Big endian archive with a directory listing at its start
    Fallout1,

    /// Little endian archive with the tree and footer at its end
    #[default]
    Fallout2,

    /// Fallout 2 layout variant with an extra information block
    Arcanum,
}

/// Structure representing a DAT file entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatEntry {
    /// Name of the file as stored, with `/` separators
    pub name: Box<str>,
    /// Method of compressing the file in the dat
    pub compression_method: CompressionMethod,
    /// Size of the file when extracted
    pub real_size: u32,
    /// Size of the file in the dat
    pub packed_size: u32,
    /// Specifies where the data of the file starts
    pub offset: u32,
}

impl DatEntry {
    /// Number of archive bytes the entry occupies
    pub fn stored_len(&self) -> u64 {
        match self.compression_method {
            CompressionMethod::None => u64::from(self.real_size),
            _ => u64::from(self.packed_size),
        }
    }
}

/// Normalize a path for lookups: `/` separators, lowercase, no leading separator
pub fn normalize_path(path: &str) -> String {
    path.trim_end()
        .replace('\\', "/")
        .to_ascii_lowercase()
        .trim_start_matches('/')
        .to_owned()
}

/// Immutable table of the entries in one archive.
///
/// Keys are normalized with [`normalize_path`], values keep the stored spelling of the name.
/// Entries are kept in tree order. When a path appears twice the first record wins.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    version: DatVersion,
    files: IndexMap<Box<str>, DatEntry>,
    archive_len: u64,
}

impl ArchiveIndex {
    /// Read the tree of an archive, detecting its layout
    #[instrument(skip(reader), err)]
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        if len < FOOTER_SIZE {
            return Err(Error::Truncated);
        }

        if len >= ARCANUM_FOOTER_SIZE && has_arcanum_magic(reader, len)? {
            return Self::read_arcanum(reader, len);
        }

        reader.seek(SeekFrom::Start(len - FOOTER_SIZE))?;
        let footer = DatFooter::read(reader).map_err(parse_error)?;
        if u64::from(footer.dat_size) == len {
            return Self::read_fallout2(reader, len, footer);
        }

        Self::read_fallout1(reader, len).map_err(|err| {
            debug!(%err, "not a fallout 1 archive either");
            Error::UnsupportedFormat(format!(
                "footer records {} bytes but the file holds {len}",
                footer.dat_size
            ))
        })
    }

    fn read_fallout2<R: Read + Seek>(reader: &mut R, len: u64, footer: DatFooter) -> Result<Self> {
        let tree_size = u64::from(footer.tree_size);
        let tree_start = len
            .checked_sub(FOOTER_SIZE + tree_size)
            .ok_or(Error::Truncated)?;
        let blob = read_blob(reader, tree_start, tree_size)?;

        let mut cursor = Cursor::new(blob.as_slice());
        let files_total = cursor.read_u32::<LittleEndian>().map_err(|_| Error::Truncated)?;

        let mut index = Self::empty(DatVersion::Fallout2, len, files_total);
        while cursor.position() < tree_size {
            let record = DatRecord::read(&mut cursor).map_err(parse_error)?;
            if record.name_len == 0 {
                continue;
            }

            let name = decode_name(&record.name);
            let compression_method =
                CompressionMethod::try_from(record.codec).unwrap_or_else(|codec| {
                    warn!(%name, codec, "unknown codec, reading entry as zlib");
                    CompressionMethod::Zlib
                });

            index.insert(DatEntry {
                name: name.into(),
                compression_method,
                real_size: record.real_size,
                packed_size: record.packed_size,
                offset: record.offset,
            });
        }

        index.finish(files_total);
        Ok(index)
    }

    fn read_arcanum<R: Read + Seek>(reader: &mut R, len: u64) -> Result<Self> {
        reader.seek(SeekFrom::Start(len - ARCANUM_FOOTER_SIZE))?;
        let footer = ArcanumFooter::read(reader).map_err(parse_error)?;

        let tree_size = u64::from(footer.tree_size);
        if tree_size < ARCANUM_FOOTER_SIZE + 4 {
            return Err(Error::UnsupportedFormat(format!(
                "tree of {tree_size} bytes cannot hold its own footer"
            )));
        }
        let tree_start = len.checked_sub(tree_size).ok_or(Error::Truncated)?;
        let blob = read_blob(reader, tree_start, tree_size - ARCANUM_FOOTER_SIZE)?;

        let mut cursor = Cursor::new(blob.as_slice());
        let files_total = cursor.read_u32::<LittleEndian>().map_err(|_| Error::Truncated)?;

        let mut index = Self::empty(DatVersion::Arcanum, len, files_total);
        while cursor.position() < blob.len() as u64 {
            let record = ArcanumRecord::read(&mut cursor).map_err(parse_error)?;
            if record.name_len <= 1 || record.kind == ArcanumRecord::KIND_DIRECTORY {
                continue;
            }

            let compression_method = if record.kind == ArcanumRecord::KIND_ZLIB {
                CompressionMethod::Zlib
            } else {
                CompressionMethod::None
            };

            index.insert(DatEntry {
                name: decode_name(&record.name).into(),
                compression_method,
                real_size: record.real_size,
                packed_size: record.packed_size,
                offset: record.offset,
            });
        }

        index.finish(files_total);
        Ok(index)
    }

    fn read_fallout1<R: Read + Seek>(reader: &mut R, len: u64) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let header = Dat1Header::read(reader).map_err(parse_error)?;
        if u64::from(header.dir_count) * (DAT1_MIN_NAME + DAT1_MIN_DIR) > len {
            return Err(Error::UnsupportedFormat(format!(
                "{} directories cannot fit in {len} bytes",
                header.dir_count
            )));
        }

        let dirs = (0..header.dir_count)
            .map(|_| {
                let name = Dat1Name::read(reader).map_err(parse_error)?;
                let name = decode_name(&name.bytes);
                Ok(if name == "." || name.is_empty() {
                    String::new()
                } else {
                    format!("{name}/")
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut index = Self::empty(DatVersion::Fallout1, len, 0);
        let mut total = 0u32;
        for dir in &dirs {
            let dir_header = Dat1DirHeader::read(reader).map_err(parse_error)?;
            if u64::from(dir_header.file_count) * DAT1_MIN_RECORD > len {
                return Err(Error::UnsupportedFormat(format!(
                    "{} records cannot fit in {len} bytes",
                    dir_header.file_count
                )));
            }

            for _ in 0..dir_header.file_count {
                let record = Dat1Record::read(reader).map_err(parse_error)?;
                total = total.saturating_add(1);
                if record.name.len == 0 {
                    continue;
                }

                let compression_method = if record.attributes & Dat1Record::ATTR_LZSS != 0 {
                    CompressionMethod::Lzss
                } else {
                    CompressionMethod::None
                };

                index.insert(DatEntry {
                    name: format!("{dir}{}", decode_name(&record.name.bytes)).into(),
                    compression_method,
                    real_size: record.real_size,
                    packed_size: record.packed_size,
                    offset: record.offset,
                });
            }
        }

        index.finish(total);
        Ok(index)
    }

    fn empty(version: DatVersion, archive_len: u64, files_total: u32) -> Self {
        Self {
            version,
            files: IndexMap::with_capacity((files_total as usize).min(0x10000)),
            archive_len,
        }
    }

    fn insert(&mut self, entry: DatEntry) {
        if entry.offset as u64 + entry.stored_len() > self.archive_len {
            warn!(
                name = %entry.name,
                offset = entry.offset,
                len = entry.stored_len(),
                "skipping entry that runs past the end of the archive"
            );
            return;
        }

        match self.files.entry(normalize_path(&entry.name).into()) {
            Entry::Occupied(_) => {
                warn!(name = %entry.name, "skipping duplicate entry");
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
    }

    fn finish(&self, files_total: u32) {
        if files_total as usize != self.files.len() {
            debug!(
                files_total,
                indexed = self.files.len(),
                "tree count differs from indexed entries"
            );
        }
        debug!(
            version = ?self.version,
            files = self.files.len(),
            "parsed archive tree"
        );
    }

    /// Layout of the archive
    pub fn version(&self) -> DatVersion {
        self.version
    }

    /// Size of the archive in bytes
    pub fn archive_len(&self) -> u64 {
        self.archive_len
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up an entry by path, ignoring case and separator style
    pub fn get(&self, path: &str) -> Option<&DatEntry> {
        self.files.get(normalize_path(path).as_str())
    }

    /// Position of an entry in tree order
    pub fn get_index_of(&self, path: &str) -> Option<usize> {
        self.files.get_index_of(normalize_path(path).as_str())
    }

    /// Entry at a position in tree order
    pub fn get_index(&self, index: usize) -> Option<&DatEntry> {
        self.files.get_index(index).map(|(_, entry)| entry)
    }

    /// Stored names of every entry, in tree order
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.values().map(|entry| entry.name.as_ref())
    }

    /// Every entry, in tree order
    pub fn entries(&self) -> impl Iterator<Item = &DatEntry> {
        self.files.values()
    }

    /// Names of the entries under `prefix` whose extension is `ext`.
    ///
    /// Without `include_subdirs` only direct children of `prefix` are returned. The extension is
    /// compared without its dot and ignoring case, an empty one matches everything.
    pub fn list_files(&self, prefix: &str, include_subdirs: bool, ext: &str) -> Vec<&str> {
        let matcher = ListMatcher::new(prefix, include_subdirs, ext);
        self.files
            .iter()
            .filter(|(key, _)| matcher.matches(key))
            .map(|(_, entry)| entry.name.as_ref())
            .collect()
    }
}

/// Prefix and extension filter shared by archive and loose listings
#[derive(Debug, Clone)]
pub(crate) struct ListMatcher {
    prefix: String,
    include_subdirs: bool,
    ext: String,
}

impl ListMatcher {
    pub(crate) fn new(prefix: &str, include_subdirs: bool, ext: &str) -> Self {
        let mut prefix = normalize_path(prefix);
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }

        Self {
            prefix,
            include_subdirs,
            ext: ext.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    /// Normalized prefix, empty or ending with `/`
    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Test a path already passed through [`normalize_path`]
    pub(crate) fn matches(&self, key: &str) -> bool {
        let Some(rest) = key.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        if rest.is_empty() || (!self.include_subdirs && rest.contains('/')) {
            return false;
        }
        if self.ext.is_empty() {
            return true;
        }

        let file_name = rest.rsplit('/').next().unwrap_or(rest);
        file_name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext == self.ext)
    }
}

fn has_arcanum_magic<R: Read + Seek>(reader: &mut R, len: u64) -> Result<bool> {
    let mut magic = [0u8; 4];
    reader.seek(SeekFrom::Start(len - 12))?;
    reader.read_exact(&mut magic)?;
    Ok(&magic == ARCANUM_MAGIC)
}

fn read_blob<R: Read + Seek>(reader: &mut R, start: u64, size: u64) -> Result<Vec<u8>> {
    let size = usize::try_from(size).map_err(|_| Error::AllocFailed(usize::MAX))?;
    let mut blob = Vec::new();
    blob.try_reserve_exact(size)
        .map_err(|_| Error::AllocFailed(size))?;
    blob.resize(size, 0);

    reader.seek(SeekFrom::Start(start))?;
    reader.read_exact(&mut blob).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::Truncated,
        _ => Error::IOError(err),
    })?;

    Ok(blob)
}

fn decode_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .replace('\\', "/")
}

fn parse_error(err: binrw::Error) -> Error {
    if err.is_eof() {
        return Error::Truncated;
    }

    let implausible = matches!(
        err.root_cause(),
        binrw::Error::AssertFail { .. } | binrw::Error::BadMagic { .. }
    );
    if implausible {
        Error::UnsupportedFormat(err.to_string())
    } else {
        Error::BinRWError(err)
    }
}
