#![allow(dead_code)]

use std::io::{Cursor, Write};

use binrw::BinWrite;
use flate2::{write::ZlibEncoder, Compression};
use fo_dat::{
    lzss::{MAX_MATCH, WINDOW_SIZE},
    types::{
        ArcanumFooter, ArcanumRecord, Dat1DirHeader, Dat1Header, Dat1Name, Dat1Record, DatFooter,
        DatRecord,
    },
};

const MIN_MATCH: usize = 3;
const RING_START: usize = WINDOW_SIZE - MAX_MATCH;
const MAX_DISTANCE: usize = WINDOW_SIZE - MAX_MATCH;

/// Greedy reference encoder for a single packet payload
pub fn lzss_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut group = Vec::new();
    let mut control = 0u8;
    let mut tokens = 0;
    let mut i = 0;

    while i < data.len() {
        let (mut best_pos, mut best_len) = (0, 0);
        for j in i.saturating_sub(MAX_DISTANCE)..i {
            let mut len = 0;
            while len < MAX_MATCH && i + len < data.len() && data[j + len] == data[i + len] {
                len += 1;
            }
            if len > best_len {
                (best_pos, best_len) = (j, len);
            }
        }

        if best_len >= MIN_MATCH {
            let offset = (RING_START + best_pos) & (WINDOW_SIZE - 1);
            group.push((offset & 0xFF) as u8);
            group.push(((offset >> 4) & 0xF0) as u8 | (best_len - MIN_MATCH) as u8);
            i += best_len;
        } else {
            control |= 1 << tokens;
            group.push(data[i]);
            i += 1;
        }

        tokens += 1;
        if tokens == 8 {
            out.push(control);
            out.append(&mut group);
            control = 0;
            tokens = 0;
        }
    }

    if tokens > 0 {
        out.push(control);
        out.append(&mut group);
    }

    out
}

/// Split `data` into packets of at most `packet_len` bytes, raw when encoding does not pay off
pub fn lzss_packets(data: &[u8], packet_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in data.chunks(packet_len.max(1)) {
        let encoded = lzss_encode(chunk);
        if encoded.len() < chunk.len() {
            out.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
            out.extend_from_slice(&encoded);
        } else {
            out.extend_from_slice(&(0x8000 | chunk.len() as u16).to_be_bytes());
            out.extend_from_slice(chunk);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
    out
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Stored,
    Zlib,
    Lzss,
}

/// Writes Fallout 2 archives
#[derive(Debug, Default)]
pub struct Dat2Builder {
    data: Vec<u8>,
    records: Vec<DatRecord>,
    packet_len: usize,
}

impl Dat2Builder {
    pub fn new() -> Self {
        Self {
            packet_len: 1024,
            ..Default::default()
        }
    }

    pub fn packet_len(mut self, packet_len: usize) -> Self {
        self.packet_len = packet_len;
        self
    }

    pub fn file(self, name: &str, codec: Codec, contents: &[u8]) -> Self {
        let (tag, payload) = match codec {
            Codec::Stored => (0, contents.to_vec()),
            Codec::Zlib => (1, zlib(contents)),
            Codec::Lzss => (2, lzss_packets(contents, self.packet_len)),
        };
        self.raw(name, tag, contents.len() as u32, &payload)
    }

    /// Add an entry with a hand made payload and recorded size
    pub fn raw(mut self, name: &str, codec: u8, real_size: u32, payload: &[u8]) -> Self {
        self.records.push(DatRecord {
            name_len: name.len() as u32,
            name: name.as_bytes().to_vec(),
            codec,
            real_size,
            packed_size: payload.len() as u32,
            offset: self.data.len() as u32,
        });
        self.data.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Cursor::new(self.data);
        out.set_position(out.get_ref().len() as u64);

        let tree_start = out.position();
        out.write_all(&(self.records.len() as u32).to_le_bytes())
            .unwrap();
        for record in &self.records {
            record.write(&mut out).unwrap();
        }
        let tree_size = (out.position() - tree_start) as u32;

        let footer = DatFooter {
            tree_size,
            dat_size: out.position() as u32 + 8,
        };
        footer.write(&mut out).unwrap();

        out.into_inner()
    }
}

/// Writes Fallout 1 archives
#[derive(Debug, Default)]
pub struct Dat1Builder {
    dirs: Vec<(String, Vec<(String, Codec, Vec<u8>)>)>,
}

impl Dat1Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to `dir`, `.` being the root
    pub fn file(mut self, dir: &str, name: &str, codec: Codec, contents: &[u8]) -> Self {
        let files = match self.dirs.iter().position(|(d, _)| d == dir) {
            Some(i) => &mut self.dirs[i].1,
            None => {
                self.dirs.push((dir.to_owned(), Vec::new()));
                &mut self.dirs.last_mut().unwrap().1
            }
        };
        files.push((name.to_owned(), codec, contents.to_vec()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let header_len: usize = 16
            + self.dirs.iter().map(|(d, _)| 1 + d.len()).sum::<usize>()
            + self
                .dirs
                .iter()
                .map(|(_, files)| 16 + files.iter().map(|(n, _, _)| 17 + n.len()).sum::<usize>())
                .sum::<usize>();

        let mut out = Cursor::new(Vec::new());
        let mut data = Vec::new();

        Dat1Header {
            dir_count: self.dirs.len() as u32,
            reserved: [0x0A, 0, 0],
        }
        .write(&mut out)
        .unwrap();

        for (dir, _) in &self.dirs {
            Dat1Name {
                len: dir.len() as u8,
                bytes: dir.as_bytes().to_vec(),
            }
            .write(&mut out)
            .unwrap();
        }

        for (_, files) in &self.dirs {
            Dat1DirHeader {
                file_count: files.len() as u32,
                reserved: [0x0A, 0x10, 0],
            }
            .write(&mut out)
            .unwrap();

            for (name, codec, contents) in files {
                let (attributes, payload) = match codec {
                    Codec::Lzss => (Dat1Record::ATTR_LZSS, lzss_packets(contents, 1024)),
                    _ => (0x20, contents.clone()),
                };

                Dat1Record {
                    name: Dat1Name {
                        len: name.len() as u8,
                        bytes: name.as_bytes().to_vec(),
                    },
                    attributes,
                    offset: (header_len + data.len()) as u32,
                    real_size: contents.len() as u32,
                    packed_size: if *codec == Codec::Lzss {
                        payload.len() as u32
                    } else {
                        0
                    },
                }
                .write(&mut out)
                .unwrap();

                data.extend_from_slice(&payload);
            }
        }

        let mut out = out.into_inner();
        assert_eq!(out.len(), header_len);
        out.extend_from_slice(&data);
        out
    }
}

/// Writes Arcanum archives
#[derive(Debug, Default)]
pub struct ArcanumBuilder {
    data: Vec<u8>,
    records: Vec<ArcanumRecord>,
}

impl ArcanumBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, compressed: bool, contents: &[u8]) -> Self {
        let payload = if compressed {
            zlib(contents)
        } else {
            contents.to_vec()
        };

        self.records.push(ArcanumRecord {
            name_len: name.len() as u32 + 1,
            name: [name.as_bytes(), b"\0"].concat(),
            reserved: 0,
            kind: if compressed {
                ArcanumRecord::KIND_ZLIB
            } else {
                1
            },
            real_size: contents.len() as u32,
            packed_size: payload.len() as u32,
            offset: self.data.len() as u32,
        });
        self.data.extend_from_slice(&payload);
        self
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.records.push(ArcanumRecord {
            name_len: name.len() as u32 + 1,
            name: [name.as_bytes(), b"\0"].concat(),
            reserved: 0,
            kind: ArcanumRecord::KIND_DIRECTORY,
            real_size: 0,
            packed_size: 0,
            offset: 0,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Cursor::new(self.data);
        out.set_position(out.get_ref().len() as u64);

        let tree_start = out.position();
        out.write_all(&(self.records.len() as u32).to_le_bytes())
            .unwrap();
        for record in &self.records {
            record.write(&mut out).unwrap();
        }
        let names_size = self.records.iter().map(|r| r.name_len).sum();

        ArcanumFooter {
            guid: *b"fo_dat test guid",
            names_size,
            tree_size: (out.position() - tree_start) as u32 + 28,
        }
        .write(&mut out)
        .unwrap();

        out.into_inner()
    }
}

/// `len` bytes cycling through `pattern`
pub fn repeat(pattern: &[u8], len: usize) -> Vec<u8> {
    pattern.iter().copied().cycle().take(len).collect()
}

/// Deterministic text with enough repetition for the codecs to find matches
pub fn sample_text(len: usize) -> Vec<u8> {
    const WORDS: [&[u8]; 8] = [
        b"vault ", b"dweller ", b"brahmin ", b"stimpak ", b"wasteland ", b"geck ", b"\n", b"42 ",
    ];

    let mut state = 0x2545_F491u32;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        out.extend_from_slice(WORDS[(state % WORDS.len() as u32) as usize]);
    }
    out.truncate(len);
    out
}
