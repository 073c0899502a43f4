//! Entries stored as a stream of LZSS packets.
//!
//! Packets are decoded one at a time into the decoder buffer. Seeking inside the loaded packet
//! only moves the buffer cursor. Longer jumps use the block index when it is enabled, otherwise
//! the stream is replayed from its start.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use tracing::{instrument, trace, warn};

#[cfg(feature = "block-index")]
use crate::block_index::{BlockEntry, BlockIndex};

use super::{resolve_seek, seek_to, VirtualFile, SKIP_CHUNK};
use crate::error::{Error, Result};
use crate::lzss::{LzssDecoder, PacketHeader};

/// Read the packet starting `offset` bytes into an entry stored at `begin`.
///
/// Returns `None` once the entry is exhausted or the end marker is reached. A packet whose payload
/// runs past `packed_size` is a decode error.
pub(crate) fn read_packet<R: Read + Seek>(
    source: &mut R,
    begin: u64,
    offset: u64,
    packed_size: u64,
    payload: &mut Vec<u8>,
) -> Result<Option<PacketHeader>> {
    if offset + PacketHeader::SIZE > packed_size {
        return Ok(None);
    }

    seek_to(source, begin + offset)?;
    let header = PacketHeader::from(source.read_u16::<BigEndian>().map_err(truncated)?);
    if header.is_end() {
        return Ok(None);
    }

    let end = offset + PacketHeader::SIZE + u64::from(header.len);
    if end > packed_size {
        return Err(Error::DecodeError(format!(
            "packet at {offset} ends {} bytes past the entry",
            end - packed_size
        )));
    }

    payload.clear();
    payload.resize(usize::from(header.len), 0);
    source.read_exact(payload).map_err(truncated)?;

    Ok(Some(header))
}

fn truncated(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated
    } else {
        Error::IOError(err)
    }
}

/// An LZSS packed entry decoded packet by packet
#[derive(Debug)]
pub struct LzssBlockFile {
    begin: u64,
    packed_size: u64,
    real_size: u64,
    pos: u64,

    // header of the next packet, relative to `begin`
    next_packet: u64,
    // decoded offset the next packet starts at
    next_decoded: u64,
    // decoded offset of the packet held by the decoder
    loaded_start: u64,

    decoder: Option<LzssDecoder>,
    payload: Vec<u8>,

    #[cfg(feature = "block-index")]
    index: Option<BlockIndex>,
    #[cfg(feature = "block-index")]
    use_index: bool,
}

impl LzssBlockFile {
    /// View a packet stream of `packed_size` bytes at `begin` that decodes to `real_size` bytes.
    ///
    /// With `use_index` set, the first seek outside the loaded packet scans the packet headers and
    /// later seeks jump straight to the packet holding the target.
    pub fn new(begin: u64, packed_size: u64, real_size: u64, use_index: bool) -> Self {
        #[cfg(not(feature = "block-index"))]
        let _ = use_index;

        Self {
            begin,
            packed_size,
            real_size,
            pos: 0,
            next_packet: 0,
            next_decoded: 0,
            loaded_start: 0,
            decoder: None,
            payload: Vec::new(),
            #[cfg(feature = "block-index")]
            index: None,
            #[cfg(feature = "block-index")]
            use_index,
        }
    }

    /// Size of the packet stream inside the archive
    pub fn packed_size(&self) -> u64 {
        self.packed_size
    }

    /// The block index, once a seek has built it
    #[cfg(feature = "block-index")]
    pub fn block_index(&self) -> Option<&BlockIndex> {
        self.index.as_ref()
    }

    fn load_next_packet<R: Read + Seek>(&mut self, source: &mut R) -> Result<bool> {
        let Some(header) = read_packet(
            source,
            self.begin,
            self.next_packet,
            self.packed_size,
            &mut self.payload,
        )?
        else {
            return Ok(false);
        };

        let decoder = self.decoder.get_or_insert_with(LzssDecoder::new);
        if header.raw {
            decoder.load_raw(&self.payload);
        } else {
            decoder.decode(&self.payload);
        }

        self.loaded_start = self.next_decoded;
        self.next_decoded += decoder.len() as u64;
        self.next_packet += PacketHeader::SIZE + u64::from(header.len);
        trace!(
            raw = header.raw,
            start = self.loaded_start,
            len = decoder.len(),
            "loaded packet"
        );

        Ok(true)
    }

    /// Whether `target` lies inside the packet held by the decoder
    fn seek_loaded(&mut self, target: u64) -> bool {
        let Some(decoder) = self.decoder.as_mut() else {
            return false;
        };
        let end = self.loaded_start + decoder.len() as u64;
        if decoder.is_empty() || target < self.loaded_start || target >= end {
            return false;
        }

        decoder.set_position((target - self.loaded_start) as usize);
        self.pos = target;
        true
    }

    /// Drop the loaded packet and continue from a packet boundary
    fn restart_at(&mut self, decoded_offset: u64, archive_offset: u64) {
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.clear();
        }
        self.pos = decoded_offset;
        self.next_decoded = decoded_offset;
        self.loaded_start = decoded_offset;
        self.next_packet = archive_offset;
    }

    #[cfg(feature = "block-index")]
    fn jump_near<R: Read + Seek>(&mut self, source: &mut R, target: u64) -> Result<()> {
        if self.use_index && self.index.is_none() {
            match BlockIndex::scan(source, self.begin, self.packed_size) {
                Ok(index) => {
                    if index.decoded_len() < self.real_size {
                        warn!(
                            declared = self.real_size,
                            actual = index.decoded_len(),
                            "packed entry is shorter than recorded, correcting its size"
                        );
                        self.real_size = index.decoded_len();
                    }
                    self.index = Some(index);
                }
                Err(err) => {
                    warn!(%err, "unable to index packed entry, seeking sequentially");
                    self.use_index = false;
                }
            }
        }

        let Some(index) = self.index.as_ref().filter(|_| self.use_index) else {
            if target < self.pos {
                self.restart_at(0, 0);
            }
            return Ok(());
        };

        let block = if target >= index.decoded_len() {
            Some(index.packets())
        } else {
            index.find(target)
        };

        match block.and_then(|block| index.get(block)) {
            Some(BlockEntry {
                decoded_offset,
                archive_offset,
            }) => {
                if target < self.pos || decoded_offset > self.pos {
                    self.restart_at(decoded_offset, archive_offset);
                }
            }
            None => {
                warn!(
                    offset = target,
                    "offset is not covered by the block index, seeking sequentially"
                );
                if target < self.pos {
                    self.restart_at(0, 0);
                }
            }
        }

        Ok(())
    }

    #[cfg(not(feature = "block-index"))]
    fn jump_near<R: Read + Seek>(&mut self, _source: &mut R, target: u64) -> Result<()> {
        if target < self.pos {
            self.restart_at(0, 0);
        }
        Ok(())
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

impl VirtualFile for LzssBlockFile {
    #[instrument(level = "trace", skip(self, source, buf), fields(len = buf.len()), err)]
    fn read<R: Read + Seek>(&mut self, source: &mut R, buf: &mut [u8]) -> Result<usize> {
        let want = (self.real_size - self.pos).min(buf.len() as u64) as usize;
        if want == 0 {
            return Ok(0);
        }

        let mut produced = 0;
        while produced < want {
            let n = match self.decoder.as_mut() {
                Some(decoder) => decoder.drain(&mut buf[produced..want]),
                None => 0,
            };

            if n == 0 {
                if !self.load_next_packet(source)? {
                    break;
                }
                continue;
            }
            produced += n;
        }

        self.pos += produced as u64;

        if produced == 0 {
            warn!(
                declared = self.real_size,
                actual = self.pos,
                "packed entry ended early, correcting its size"
            );
            self.real_size = self.pos;
        }

        Ok(produced)
    }

    #[instrument(level = "trace", skip(self, source), err)]
    fn seek<R: Read + Seek>(&mut self, source: &mut R, pos: SeekFrom) -> Result<u64> {
        let target = resolve_seek(pos, self.pos, self.real_size);
        if self.seek_loaded(target) {
            return Ok(self.pos);
        }

        self.jump_near(source, target)?;
        let target = target.min(self.real_size);
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
