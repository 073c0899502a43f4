//! This library handles reading assets out of the **DAT** archives used by *Fallout*, *Fallout 2*
//! and *Arcanum*.
//!
//! # DAT Archive Format Documentation
//!
//! A DAT file is a single archive holding the game assets together with a directory tree mapping
//! each path to a byte range of the archive and the codec its data is stored with. Three layouts
//! exist, [`DatArchive`] detects which one it is given.
//!
//! ## Fallout 2 (DAT2)
//!
//! Entry data comes first, followed by the tree and an eight byte footer. All multi-byte integers
//! are little endian.
//!
//! | Offset (bytes)            | Field        | Description                                       |
//! |---------------------------|--------------|---------------------------------------------------|
//! | `len - 8 - tree_size`     | Files Total  | 4 bytes: Number of records in the tree            |
//! | `len - 4 - tree_size`     | Records      | Variable: Records until the footer is reached     |
//! | `len - 8`                 | Tree Size    | 4 bytes: Size of the tree, including files total  |
//! | `len - 4`                 | Archive Size | 4 bytes: Must equal the size of the file          |
//!
//! Each record has the following structure:
//!
//! | Offset (bytes)  | Field          | Description                                         |
//! |-----------------|----------------|-----------------------------------------------------|
//! | 0x0000          | Name Length    | 4 bytes: Length of the name                         |
//! | 0x0004          | Name           | Variable: Path of the entry, `\` separated          |
//! | `4 + n`         | Codec          | 1 byte: `0` stored, `1` zlib, `2` LZSS              |
//! | `5 + n`         | Real Size      | 4 bytes: Size of the data once decoded              |
//! | `9 + n`         | Packed Size    | 4 bytes: Size of the data inside the archive        |
//! | `13 + n`        | Offset         | 4 bytes: Start of the data from the file start      |
//!
//! Records with an empty name are skipped. A name length of 1024 or more marks a corrupt tree.
//! Codec values above `2` are read as zlib.
//!
//! ## Fallout 1 (DAT1)
//!
//! The directory listing comes first and every multi-byte integer is big endian.
//!
//! | Field              | Description                                                    |
//! |--------------------|----------------------------------------------------------------|
//! | Directory Count    | 4 bytes, followed by 12 unused bytes                           |
//! | Directory Names    | One per directory: 1 byte length then the name, `.` is root    |
//! | Directory Contents | One per directory: 4 bytes file count, 12 unused bytes, files  |
//!
//! A file record is a 1 byte name length, the name, then 4 byte attributes, offset, real size
//! and packed size. Attribute bit `0x40` marks LZSS data, anything else is stored.
//!
//! ## Arcanum (DAT 2.1)
//!
//! The archive ends with a 28 byte information block: a 16 byte identifier, the magic `1TAD`, the
//! size of the name block and the size of the tree counted back from the end of the file. The
//! tree starts with the files total, each record is a 4 byte name length, the name including its
//! terminator, then 4 byte reserved, kind, real size, packed size and offset. Kind `0x400` is a
//! directory and kind `2` is zlib data.
//!
//! ## LZSS Packets
//!
//! LZSS entries are a sequence of packets, each led by a big endian `u16`. Bit 15 marks a raw
//! packet copied as is, the low 15 bits give the payload length and a length of `0` ends the
//! stream. Encoded payloads use a 4096 byte window, see [`lzss`] for details.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.dat`
//! - **Lookups**: Paths are matched ignoring case, `\` and `/` are interchangeable
//! - **Compression Methods**:
//!   - `0`: None (no compression)
//!   - `1`: Zlib (compressed with Zlib)
//!   - `2`: LZSS packets
//!

#[cfg(feature = "block-index")]
pub mod block_index;
pub mod compression;
pub mod error;
pub mod file;
pub mod index;
pub mod lzss;
pub mod paths;
pub mod read;
pub mod resolver;
pub mod types;

pub use compression::CompressionMethod;
pub use index::{ArchiveIndex, DatEntry, DatVersion};
pub use paths::PathKind;
pub use read::{ArchiveOptions, DatArchive, DatFile};
pub use resolver::{Asset, ResolverOptions, SourceResolver};
