//! Sliding window LZSS decoding used by Fallout 1 packed entries.
//!
//! A packed entry is a sequence of packets, each starting with a big endian `u16` header. Bit 15
//! marks a raw packet whose payload is copied as is, the low 15 bits give the payload length and a
//! length of `0` ends the stream. Encoded payloads are classic LZSS over a 4096 byte window: each
//! control byte carries eight flags consumed from the low bit up, a set flag is a literal byte and
//! a clear flag is a two byte match reference.

/// Size of the sliding window, addressed with 12 bits
pub const WINDOW_SIZE: usize = 4096;

/// Longest match a single reference can produce
pub const MAX_MATCH: usize = 18;

/// Matches shorter than this are never encoded, the stored length is offset by it
pub const BREAK_EVEN: usize = 2;

const WINDOW_MASK: usize = WINDOW_SIZE - 1;
const WINDOW_FILL: u8 = b' ';
const RAW_FLAG: u16 = 0x8000;

/// Decoded form of the two byte packet header
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Payload holds literal bytes
    pub raw: bool,

    /// Length of the payload in bytes
    pub len: u16,
}

impl PacketHeader {
    /// Size of the header on disk
    pub const SIZE: u64 = 2;

    /// A zero length header ends the packet stream
    pub fn is_end(&self) -> bool {
        self.len == 0
    }
}

impl From<u16> for PacketHeader {
    fn from(value: u16) -> Self {
        Self {
            raw: value & RAW_FLAG != 0,
            len: value & !RAW_FLAG,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Token {
    Literal(u8),
    Match { offset: usize, len: usize },
}

/// Walks the tokens of an encoded payload. A token cut short by the end of input ends the walk.
struct Tokens<'a> {
    input: &'a [u8],
    // the high byte counts the flags left in the low byte
    flags: u16,
}

impl<'a> Tokens<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, flags: 0 }
    }
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.flags >>= 1;
        if self.flags & 0x100 == 0 {
            let (&control, rest) = self.input.split_first()?;
            self.input = rest;
            self.flags = u16::from(control) | 0xFF00;
        }

        if self.flags & 1 != 0 {
            let (&byte, rest) = self.input.split_first()?;
            self.input = rest;
            return Some(Token::Literal(byte));
        }

        let [low, high, rest @ ..] = self.input else {
            self.input = &[];
            return None;
        };
        self.input = rest;

        Some(Token::Match {
            offset: usize::from(*low) | (usize::from(*high) & 0xF0) << 4,
            len: (usize::from(*high) & 0x0F) + BREAK_EVEN + 1,
        })
    }
}

/// Stateful LZSS decoder holding the decoded bytes of one packet.
///
/// The window is both the match history and the staging area for output, so a match may copy
/// bytes produced earlier by the same packet. Every encoded packet starts from a fresh window.
pub struct LzssDecoder {
    window: Box<[u8; WINDOW_SIZE]>,
    output: Vec<u8>,
    cursor: usize,
}

impl std::fmt::Debug for LzssDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzssDecoder")
            .field("len", &self.output.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Default for LzssDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LzssDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self {
            window: Box::new([WINDOW_FILL; WINDOW_SIZE]),
            output: Vec::new(),
            cursor: 0,
        }
    }

    /// Replace the buffered output with the decoding of an encoded payload
    pub fn decode(&mut self, input: &[u8]) {
        self.clear();
        self.window.fill(WINDOW_FILL);

        let mut ring = WINDOW_SIZE - MAX_MATCH;
        for token in Tokens::new(input) {
            match token {
                Token::Literal(byte) => {
                    self.output.push(byte);
                    self.window[ring] = byte;
                    ring = (ring + 1) & WINDOW_MASK;
                }
                Token::Match { offset, len } => {
                    for k in 0..len {
                        let byte = self.window[(offset + k) & WINDOW_MASK];
                        self.output.push(byte);
                        self.window[ring] = byte;
                        ring = (ring + 1) & WINDOW_MASK;
                    }
                }
            }
        }
    }

    /// Replace the buffered output with a raw payload
    pub fn load_raw(&mut self, input: &[u8]) {
        self.clear();
        self.output.extend_from_slice(input);
    }

    /// Length an encoded payload decodes to, computed without touching a window
    pub fn decoded_len(input: &[u8]) -> usize {
        Tokens::new(input)
            .map(|token| match token {
                Token::Literal(_) => 1,
                Token::Match { len, .. } => len,
            })
            .sum()
    }

    /// Copy buffered bytes into `buf`, returning how many were copied
    pub fn drain(&mut self, buf: &mut [u8]) -> usize {
        let available = &self.output[self.cursor..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.cursor += n;
        n
    }

    /// Drop up to `n` buffered bytes, returning how many were dropped
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.remaining());
        self.cursor += n;
        n
    }

    /// Number of buffered bytes not yet drained
    pub fn remaining(&self) -> usize {
        self.output.len() - self.cursor
    }

    /// Decoded length of the loaded packet
    pub fn len(&self) -> usize {
        self.output.len()
    }

    /// Whether no packet is loaded
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Offset of the next byte to drain within the loaded packet
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Move the drain cursor within the loaded packet, clamped to its length
    pub fn set_position(&mut self, position: usize) {
        self.cursor = position.min(self.output.len());
    }

    /// Forget the loaded packet
    pub fn clear(&mut self) {
        self.output.clear();
        self.cursor = 0;
    }
}
