//! Base types for structure of DAT files.

use binrw::{BinRead, BinWrite};

/// Names at or above this length are treated as a corrupt tree
pub const MAX_NAME_LEN: u32 = 1024;

/// Size of the [`DatFooter`] at the end of a Fallout 2 archive
pub const FOOTER_SIZE: u64 = 8;

/// Size of the [`ArcanumFooter`] at the end of an Arcanum archive
pub const ARCANUM_FOOTER_SIZE: u64 = 28;

/// Fallout 2 file footer
///
/// The last eight bytes of the archive. All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct DatFooter {
    /// The size of the tree, including the leading file count
    pub tree_size: u32,

    /// The size of the whole archive, as recorded by the tool that wrote it
    pub dat_size: u32,
}

/// Fallout 2 tree record
///
/// Records are stored back to back after the file count until the footer is reached.
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq)]
#[brw(little)]
pub struct DatRecord {
    /// Length of the name that follows
    #[br(assert(name_len < MAX_NAME_LEN, "name length {} is not plausible", name_len))]
    pub name_len: u32,

    /// Path of the entry, usually with `\` separators
    #[br(count = name_len)]
    pub name: Vec<u8>,

    /// Codec tag, see [`crate::CompressionMethod`]
    pub codec: u8,

    /// The size of the entry once decoded
    pub real_size: u32,

    /// The size of the entry inside the archive
    pub packed_size: u32,

    /// The offset to the entry data from the start of the archive
    pub offset: u32,
}

/// Fallout 1 archive header
///
/// Fallout 1 archives are stored in big endian format and start with their directory listing
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big)]
pub struct Dat1Header {
    /// Number of directories in the archive
    pub dir_count: u32,

    /// Unused by the reader
    pub reserved: [u32; 3],
}

/// A length prefixed Fallout 1 name
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq)]
#[brw(big)]
pub struct Dat1Name {
    /// Length of the name
    pub len: u8,

    /// Raw bytes of the name
    #[br(count = len)]
    pub bytes: Vec<u8>,
}

/// Header preceding the records of each Fallout 1 directory
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big)]
pub struct Dat1DirHeader {
    /// Number of records for this directory
    pub file_count: u32,

    /// Unused by the reader
    pub reserved: [u32; 3],
}

/// Fallout 1 file record
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq)]
#[brw(big)]
pub struct Dat1Record {
    /// File name, without the directory
    pub name: Dat1Name,

    /// Attribute flags, `0x40` marks LZSS packed data
    pub attributes: u32,

    /// The offset to the entry data from the start of the archive
    pub offset: u32,

    /// The size of the entry once decoded
    pub real_size: u32,

    /// The size of the entry inside the archive
    pub packed_size: u32,
}

/// Arcanum (DAT 2.1) information block at the end of the archive
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct ArcanumFooter {
    /// Archive identifier
    pub guid: [u8; 16],

    /// The size of the name block
    #[brw(magic = b"1TAD")]
    pub names_size: u32,

    /// The size of the tree, counted back from the end of the archive
    pub tree_size: u32,
}

/// Arcanum tree record
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq)]
#[brw(little)]
pub struct ArcanumRecord {
    /// Length of the name that follows
    #[br(assert(name_len < MAX_NAME_LEN, "name length {} is not plausible", name_len))]
    pub name_len: u32,

    /// Path of the entry
    #[br(count = name_len)]
    pub name: Vec<u8>,

    /// Unused by the reader
    pub reserved: u32,

    /// Entry kind, `2` is zlib, `0x400` is a directory
    pub kind: u32,

    /// The size of the entry once decoded
    pub real_size: u32,

    /// The size of the entry inside the archive
    pub packed_size: u32,

    /// The offset to the entry data from the start of the archive
    pub offset: u32,
}

impl ArcanumRecord {
    /// Record kind used for directories
    pub const KIND_DIRECTORY: u32 = 0x400;

    /// Record kind used for zlib data
    pub const KIND_ZLIB: u32 = 2;
}

impl Dat1Record {
    /// Attribute bit for LZSS packed data
    pub const ATTR_LZSS: u32 = 0x40;
}
