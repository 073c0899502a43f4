//! Random access into LZSS packet streams.
//!
//! The index is built by one forward pass over the packet headers of an entry. Raw packets decode
//! to their payload length and encoded packets are measured by walking their tokens, so no window
//! is ever filled while indexing. The final block is a terminator holding the total decoded length
//! and the offset just past the last packet.

use std::io::{Read, Seek};

use tracing::{debug, instrument};

use crate::error::Result;
use crate::file::lzss::read_packet;
use crate::lzss::{LzssDecoder, PacketHeader};

/// Start of one packet, in decoded bytes and in bytes from the start of the entry data
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    /// Decoded offset of the first byte produced by the packet
    pub decoded_offset: u64,

    /// Offset of the packet header relative to the entry data
    pub archive_offset: u64,
}

/// Ordered packet boundaries of an LZSS entry
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockIndex {
    blocks: Vec<BlockEntry>,
}

impl BlockIndex {
    /// Scan the packet headers of an entry stored at `begin` spanning `packed_size` bytes
    #[instrument(skip(source), err)]
    pub fn scan<R: Read + Seek>(source: &mut R, begin: u64, packed_size: u64) -> Result<Self> {
        let mut blocks = Vec::new();
        let mut payload = Vec::new();
        let mut decoded = 0u64;
        let mut offset = 0u64;

        while let Some(header) = read_packet(source, begin, offset, packed_size, &mut payload)? {
            blocks.push(BlockEntry {
                decoded_offset: decoded,
                archive_offset: offset,
            });

            decoded += if header.raw {
                u64::from(header.len)
            } else {
                LzssDecoder::decoded_len(&payload) as u64
            };
            offset += PacketHeader::SIZE + u64::from(header.len);
        }

        blocks.push(BlockEntry {
            decoded_offset: decoded,
            archive_offset: offset,
        });
        debug!(packets = blocks.len() - 1, decoded, "indexed lzss entry");

        Ok(Self { blocks })
    }

    /// Build an index from known boundaries, the last entry being the terminator
    pub fn from_blocks(blocks: Vec<BlockEntry>) -> Self {
        Self { blocks }
    }

    /// All boundaries including the terminator
    pub fn blocks(&self) -> &[BlockEntry] {
        &self.blocks
    }

    /// Number of packets, not counting the terminator
    pub fn packets(&self) -> usize {
        self.blocks.len().saturating_sub(1)
    }

    /// Total decoded length of the entry
    pub fn decoded_len(&self) -> u64 {
        self.end().decoded_offset
    }

    /// The terminator
    pub fn end(&self) -> BlockEntry {
        self.blocks.last().copied().unwrap_or_default()
    }

    /// Get a boundary by block number
    pub fn get(&self, block: usize) -> Option<BlockEntry> {
        self.blocks.get(block).copied()
    }

    /// Find the packet whose decoded range holds `offset`
    pub fn find(&self, offset: u64) -> Option<usize> {
        find_block(&self.blocks, offset)
    }
}

/// Binary search for the block `i` with `blocks[i] <= offset < blocks[i + 1]`.
///
/// The last entry only closes the range of the one before it. Returns `None` when the offset lies
/// outside `[blocks[0], blocks[len - 1])` or when the bounds collapse, which is how a list that is
/// not strictly increasing ends the search.
pub fn find_block(blocks: &[BlockEntry], offset: u64) -> Option<usize> {
    let high_bound = blocks.len().checked_sub(2)?;
    let (mut b, mut e) = (0usize, high_bound);

    loop {
        if b > high_bound || e > high_bound || b > e {
            return None;
        }

        let mid = b + (e - b) / 2;
        let start = blocks[mid].decoded_offset;
        let end = blocks[mid + 1].decoded_offset;

        if offset < start {
            e = mid.checked_sub(1)?;
        } else if offset >= end {
            b = mid + 1;
        } else {
            return Some(mid);
        }
    }
}
