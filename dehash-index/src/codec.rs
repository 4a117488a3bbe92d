//! Word classification and the bit-packed word codecs.
//!
//! Every word is classified into the most specific of four alphabets and
//! packed one symbol per fixed bit width, most significant bits first:
//!
//! | type            | alphabet          | bits/symbol | stop symbol |
//! |-----------------|-------------------|-------------|-------------|
//! | `Numeric`       | `0-9`             | 4           | `0b1111`    |
//! | `Alphanumeric`  | `0-9A-Za-z`       | 6           | `0b111111`  |
//! | `ReducedAscii`  | bytes `< 0x7F`    | 7           | `0b1111111` |
//! | `NoCompression` | any byte          | 8           | NUL         |
//!
//! The stop symbol is always appended, so a word of `n` symbols occupies
//! `(n + 1) * width` bits. Unused low bits of the final byte are zero, which is
//! what lets the index tag share that byte.

use crate::error::{Error, Result};

pub const NUMERIC_SYMBOL_BITS: u32 = 4;
pub const ALPHANUMERIC_SYMBOL_BITS: u32 = 6;
pub const REDUCED_ASCII_SYMBOL_BITS: u32 = 7;

pub const NUMERIC_STOP_SYMBOL: u8 = 0b1111;
pub const ALPHANUMERIC_STOP_SYMBOL: u8 = 0b11_1111;
pub const REDUCED_ASCII_STOP_SYMBOL: u8 = 0b111_1111;

/// Number of distinct word types (two tag bits).
pub const WORD_TYPE_COUNT: usize = 4;

/// Codec used for a word, stored in bits 1-2 of an entry's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WordType {
    NoCompression = 0,
    Numeric = 1,
    Alphanumeric = 2,
    ReducedAscii = 3,
}

impl WordType {
    pub const ALL: [WordType; WORD_TYPE_COUNT] = [
        WordType::NoCompression,
        WordType::Numeric,
        WordType::Alphanumeric,
        WordType::ReducedAscii,
    ];

    /// Picks the most specific codec able to represent `word`.
    pub fn classify(word: &[u8]) -> Self {
        if word.iter().all(u8::is_ascii_digit) {
            WordType::Numeric
        } else if word.iter().all(u8::is_ascii_alphanumeric) {
            WordType::Alphanumeric
        } else if word.iter().all(|&b| b < REDUCED_ASCII_STOP_SYMBOL) {
            WordType::ReducedAscii
        } else {
            WordType::NoCompression
        }
    }

    /// Decodes the two type bits (already shifted down).
    #[inline]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => WordType::NoCompression,
            1 => WordType::Numeric,
            2 => WordType::Alphanumeric,
            _ => WordType::ReducedAscii,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn symbol_bits(self) -> u32 {
        match self {
            WordType::NoCompression => 8,
            WordType::Numeric => NUMERIC_SYMBOL_BITS,
            WordType::Alphanumeric => ALPHANUMERIC_SYMBOL_BITS,
            WordType::ReducedAscii => REDUCED_ASCII_SYMBOL_BITS,
        }
    }

    #[inline]
    fn stop_symbol(self) -> u8 {
        match self {
            WordType::NoCompression => 0,
            WordType::Numeric => NUMERIC_STOP_SYMBOL,
            WordType::Alphanumeric => ALPHANUMERIC_STOP_SYMBOL,
            WordType::ReducedAscii => REDUCED_ASCII_STOP_SYMBOL,
        }
    }

    /// Encoded size in bits of a word of `len` symbols, stop symbol included.
    #[inline]
    pub fn encoded_bits(self, len: usize) -> usize {
        (len + 1) * self.symbol_bits() as usize
    }

    /// Whether this codec can represent `word` at all.
    pub fn can_encode(self, word: &[u8]) -> bool {
        match self {
            WordType::NoCompression => true,
            WordType::Numeric => word.iter().all(u8::is_ascii_digit),
            WordType::Alphanumeric => word.iter().all(u8::is_ascii_alphanumeric),
            WordType::ReducedAscii => word.iter().all(|&b| b < REDUCED_ASCII_STOP_SYMBOL),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WordType::NoCompression => "no compression",
            WordType::Numeric => "numeric",
            WordType::Alphanumeric => "alphanumeric",
            WordType::ReducedAscii => "reduced ASCII",
        }
    }

    #[inline]
    fn to_symbol(self, b: u8) -> u8 {
        match self {
            WordType::Numeric => b - b'0',
            WordType::Alphanumeric => match b {
                b'0'..=b'9' => b - b'0',
                b'A'..=b'Z' => b - b'A' + 10,
                _ => b - b'a' + 36,
            },
            WordType::ReducedAscii | WordType::NoCompression => b,
        }
    }

    #[inline]
    fn from_symbol(self, s: u8) -> u8 {
        match self {
            WordType::Numeric => s + b'0',
            WordType::Alphanumeric => match s {
                0..=9 => s + b'0',
                10..=35 => s - 10 + b'A',
                _ => s - 36 + b'a',
            },
            WordType::ReducedAscii | WordType::NoCompression => s,
        }
    }
}

/// Result of compressing a word: which codec was used and how many bits it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressed {
    pub word_type: WordType,
    pub bits: usize,
}

impl Compressed {
    #[inline]
    pub fn bytes(&self) -> usize {
        self.bits.div_ceil(8)
    }
}

/// Classifies `word` and writes its encoded form to `out` (cleared first).
pub fn compress(word: &[u8], out: &mut Vec<u8>) -> Compressed {
    let word_type = WordType::classify(word);
    let bits = encode(word, word_type, out);
    Compressed { word_type, bits }
}

/// Encodes `word` with a specific codec, or returns `None` if the codec cannot
/// represent it.
pub fn compress_as(word: &[u8], word_type: WordType, out: &mut Vec<u8>) -> Option<usize> {
    word_type.can_encode(word).then(|| encode(word, word_type, out))
}

fn encode(word: &[u8], word_type: WordType, out: &mut Vec<u8>) -> usize {
    out.clear();

    if word_type == WordType::NoCompression {
        out.extend_from_slice(word);
        out.push(0);
        return out.len() * 8;
    }

    let width = word_type.symbol_bits();
    let mut writer = BitWriter::new(out);
    for &b in word {
        writer.push(word_type.to_symbol(b), width);
    }
    writer.push(word_type.stop_symbol(), width);
    writer.finish();

    word_type.encoded_bits(word.len())
}

/// Decodes a word from the start of `data` into `out` (cleared first).
///
/// Reading stops at the stop symbol; trailing bytes (padding, tag bits, the
/// rest of an overflow blob) are ignored.
pub fn decompress(data: &[u8], word_type: WordType, out: &mut Vec<u8>) -> Result<()> {
    out.clear();

    let corrupt = || Error::CorruptWord { word_type, len: data.len() };

    if word_type == WordType::NoCompression {
        let end = data.iter().position(|&b| b == 0).ok_or_else(corrupt)?;
        out.extend_from_slice(&data[..end]);
        return Ok(());
    }

    let width = word_type.symbol_bits();
    let stop = word_type.stop_symbol();
    let mut reader = BitReader::new(data);

    loop {
        match reader.read(width) {
            Some(s) if s == stop => return Ok(()),
            Some(s) => out.push(word_type.from_symbol(s)),
            None => return Err(corrupt()),
        }
    }
}

struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    acc: u32,
    filled: u32,
}

impl<'a> BitWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out, acc: 0, filled: 0 }
    }

    #[inline]
    fn push(&mut self, symbol: u8, width: u32) {
        self.acc = (self.acc << width) | (symbol as u32 & ((1 << width) - 1));
        self.filled += width;

        while self.filled >= 8 {
            self.filled -= 8;
            self.out.push((self.acc >> self.filled) as u8);
        }

        self.acc &= (1 << self.filled) - 1;
    }

    fn finish(self) {
        if self.filled > 0 {
            self.out.push((self.acc << (8 - self.filled)) as u8);
        }
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reads `width` (<= 8) bits, or `None` when fewer remain.
    #[inline]
    fn read(&mut self, width: u32) -> Option<u8> {
        if self.pos + width as usize > self.data.len() * 8 {
            return None;
        }

        let index = self.pos / 8;
        let shift = (self.pos % 8) as u32;
        let hi = self.data[index] as u16;
        let lo = self.data.get(index + 1).copied().unwrap_or(0) as u16;
        let window = (hi << 8) | lo;

        self.pos += width as usize;

        Some(((window >> (16 - shift - width)) & ((1 << width) - 1)) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(word: &[u8]) -> (Compressed, Vec<u8>) {
        let mut packed = Vec::new();
        let compressed = compress(word, &mut packed);
        assert_eq!(packed.len(), compressed.bytes());

        let mut out = Vec::new();
        decompress(&packed, compressed.word_type, &mut out).unwrap();
        assert_eq!(out, word, "round trip of {:?}", String::from_utf8_lossy(word));
        (compressed, packed)
    }

    #[test]
    fn test_classify() {
        assert_eq!(WordType::classify(b""), WordType::Numeric);
        assert_eq!(WordType::classify(b"0123456789"), WordType::Numeric);
        assert_eq!(WordType::classify(b"abc123"), WordType::Alphanumeric);
        assert_eq!(WordType::classify(b"Password1"), WordType::Alphanumeric);
        assert_eq!(WordType::classify(b"pass word!"), WordType::ReducedAscii);
        assert_eq!(WordType::classify(b"tab\there"), WordType::ReducedAscii);
        assert_eq!(WordType::classify(b"del\x7f"), WordType::NoCompression);
        assert_eq!(WordType::classify("héllo".as_bytes()), WordType::NoCompression);
    }

    #[test]
    fn test_classification_picks_most_specific() {
        let words: &[&[u8]] = &[b"", b"7", b"42x", b"a b", b"\xff", b"Zz9", b"~"];
        for word in words {
            let chosen = WordType::classify(word);
            assert!(chosen.can_encode(word));

            // Every codec ahead of the chosen one in specificity must reject it.
            let order = [
                WordType::Numeric,
                WordType::Alphanumeric,
                WordType::ReducedAscii,
                WordType::NoCompression,
            ];
            let position = order.iter().position(|t| *t == chosen).unwrap();
            for less_general in &order[..position] {
                assert!(!less_general.can_encode(word));
            }
            for more_general in &order[position..] {
                assert!(more_general.can_encode(word));
            }
        }
    }

    #[test]
    fn test_numeric_layout() {
        let (compressed, packed) = round_trip(b"123");
        assert_eq!(compressed.word_type, WordType::Numeric);
        assert_eq!(compressed.bits, 16);
        assert_eq!(packed, [0x12, 0x3F]);

        let (_, packed) = round_trip(b"12");
        assert_eq!(packed, [0x12, 0xF0]);
    }

    #[test]
    fn test_alphanumeric_layout() {
        // 'a' = 36 = 0b100100, stop = 0b111111
        let (compressed, packed) = round_trip(b"a");
        assert_eq!(compressed.word_type, WordType::Alphanumeric);
        assert_eq!(compressed.bits, 12);
        assert_eq!(packed, [0x93, 0xF0]);
    }

    #[test]
    fn test_reduced_ascii_layout() {
        // 'A' = 0b1000001, stop = 0b1111111
        let (compressed, packed) = round_trip(b"A!");
        assert_eq!(compressed.word_type, WordType::ReducedAscii);
        assert_eq!(compressed.bits, 21);
        assert_eq!(packed, [0x82, 0x87, 0xF8]);
    }

    #[test]
    fn test_no_compression_layout() {
        let word = "héllo".as_bytes();
        let (compressed, packed) = round_trip(word);
        assert_eq!(compressed.word_type, WordType::NoCompression);
        assert_eq!(compressed.bits, (word.len() + 1) * 8);
        assert_eq!(packed.last(), Some(&0));
    }

    #[test]
    fn test_round_trip_boundary_lengths() {
        // 0 and 1 symbols, then lengths whose encoding crosses a byte boundary
        // for each symbol width.
        let cases: &[&[u8]] = &[
            b"",
            b"5",
            b"1234567",
            b"12345678",
            b"z",
            b"abc",
            b"abcd",
            b"Abcdefg",
            b"!",
            b"a b c d",
            b"a b c de",
            b"\x01",
            "é".as_bytes(),
        ];
        for word in cases {
            round_trip(word);
        }
    }

    #[test]
    fn test_round_trip_through_more_general_codec() {
        let mut packed = Vec::new();
        let mut out = Vec::new();

        for word_type in [WordType::Alphanumeric, WordType::ReducedAscii, WordType::NoCompression] {
            let bits = compress_as(b"0987", word_type, &mut packed).unwrap();
            assert_eq!(bits, word_type.encoded_bits(4));
            decompress(&packed, word_type, &mut out).unwrap();
            assert_eq!(out, b"0987");
        }

        assert_eq!(compress_as(b"abc", WordType::Numeric, &mut packed), None);
    }

    #[test]
    fn test_low_bits_of_last_byte_are_zero() {
        let mut packed = Vec::new();
        for word in [&b"1"[..], b"12", b"ab", b"abc", b"a!", b"x y z"] {
            let compressed = compress(word, &mut packed);
            let unused = compressed.bytes() * 8 - compressed.bits;
            let last = *packed.last().unwrap();
            assert_eq!(last & ((1u16 << unused) - 1) as u8, 0);
        }
    }

    #[test]
    fn test_decompress_ignores_trailing_bytes() {
        let mut out = Vec::new();
        decompress(&[0x12, 0x3F, 0xAB, 0xCD], WordType::Numeric, &mut out).unwrap();
        assert_eq!(out, b"123");

        decompress(b"abc\0def\0", WordType::NoCompression, &mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_decompress_without_stop_symbol() {
        let mut out = Vec::new();
        assert!(matches!(
            decompress(&[0x12, 0x34], WordType::Numeric, &mut out),
            Err(Error::CorruptWord { word_type: WordType::Numeric, len: 2 })
        ));
        assert!(decompress(b"abc", WordType::NoCompression, &mut out).is_err());
        assert!(decompress(&[], WordType::ReducedAscii, &mut out).is_err());
    }
}
