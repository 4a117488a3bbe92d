//! On-disk index layout.
//!
//! ```text
//! header (29 bytes, little-endian, packed)
//!   magic:           u32        0x3A1DDDBA
//!   hash_name:       [u8; 16]   NUL padded
//!   data_bytes:      u8         width of each entry's data field
//!   wordlist_offset: u64        byte length of the entry array
//! entries (wordlist_offset bytes)
//!   prefix:          [u8; 8]    first 8 bytes of the word's digest
//!   data:            [u8; data_bytes]
//! overflow blob (rest of the file)
//! ```
//!
//! The low bits of the last data byte hold the tag: bit 0 is set for inline
//! words, bits 1-2 carry the [`WordType`]. Inline data is the encoded word,
//! pointer data is a little-endian offset into the overflow blob. When the
//! payload leaves no padding byte the tag shares the final content byte, which
//! is checked rather than assumed.

use std::io::{Read, Write};

use compact_str::CompactString;

use crate::codec::WordType;
use crate::error::{Error, Result};

/// Magic number, stored little-endian (`BA DD 1D 3A` on disk).
pub const INDEX_MAGIC: u32 = 0x3A1D_DDBA;

/// Number of digest bytes kept per entry.
pub const PREFIX_SIZE: usize = 8;

pub const MAX_DATA_SIZE: usize = 16;
pub const MIN_DATA_BITS: u32 = 3;
pub const MAX_DATA_BITS: u32 = (MAX_DATA_SIZE as u32) << 3;

pub const MAX_HASH_NAME_SIZE: usize = 16;

pub const INLINE_WORD_MASK: u8 = 0b001;
pub const WORD_TYPE_MASK: u8 = 0b110;
pub const TAG_MASK: u8 = INLINE_WORD_MASK | WORD_TYPE_MASK;
pub const TAG_BITS: u32 = 3;

pub const HEADER_SIZE: usize = 4 + MAX_HASH_NAME_SIZE + 1 + 8;

/// Smallest data field, in bits, able to address every byte of a wordlist of
/// `wordlist_size` bytes once the tag is accounted for.
pub fn min_data_bits(wordlist_size: u64) -> u32 {
    let log2_ceil = if wordlist_size <= 1 {
        0
    } else {
        u64::BITS - (wordlist_size - 1).leading_zeros()
    };

    MIN_DATA_BITS + log2_ceil
}

/// Checks an operator-supplied data width against the wordlist it will index.
pub fn validate_data_bits(bits: u32, wordlist_size: u64) -> Result<u32> {
    let min = min_data_bits(wordlist_size);

    if bits < min || bits > MAX_DATA_BITS {
        return Err(Error::InvalidDataBits { bits, min, max: MAX_DATA_BITS });
    }

    Ok(bits)
}

#[inline]
pub fn data_bytes_for_bits(bits: u32) -> u8 {
    bits.div_ceil(8) as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    hash_name: CompactString,
    data_bytes: u8,
    wordlist_offset: u64,
}

impl IndexHeader {
    pub fn new(hash_name: &str, data_bytes: u8, wordlist_offset: u64) -> Result<Self> {
        if hash_name.len() > MAX_HASH_NAME_SIZE {
            return Err(Error::HashNameTooLong {
                name: hash_name.to_string(),
                max: MAX_HASH_NAME_SIZE,
            });
        }

        if data_bytes == 0 || data_bytes as usize > MAX_DATA_SIZE {
            return Err(Error::InvalidDataBits {
                bits: (data_bytes as u32) << 3,
                min: MIN_DATA_BITS,
                max: MAX_DATA_BITS,
            });
        }

        Ok(Self { hash_name: CompactString::from(hash_name), data_bytes, wordlist_offset })
    }

    pub fn hash_name(&self) -> &str {
        &self.hash_name
    }

    #[inline]
    pub fn data_bytes(&self) -> usize {
        self.data_bytes as usize
    }

    #[inline]
    pub fn wordlist_offset(&self) -> u64 {
        self.wordlist_offset
    }

    pub fn set_wordlist_offset(&mut self, wordlist_offset: u64) {
        self.wordlist_offset = wordlist_offset;
    }

    #[inline]
    pub fn entry_width(&self) -> usize {
        PREFIX_SIZE + self.data_bytes as usize
    }

    /// Number of entries, or 0 when `wordlist_offset` is not a whole number of
    /// entries (malformed index).
    pub fn entry_count(&self) -> u64 {
        let width = self.entry_width() as u64;

        if self.wordlist_offset % width != 0 {
            return 0;
        }

        self.wordlist_offset / width
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&INDEX_MAGIC.to_le_bytes());
        out[4..4 + self.hash_name.len()].copy_from_slice(self.hash_name.as_bytes());
        out[20] = self.data_bytes;
        out[21..29].copy_from_slice(&self.wordlist_offset.to_le_bytes());
        out
    }

    /// Parses and validates a header: magic, data width, hash name encoding and
    /// the entry array length.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != INDEX_MAGIC {
            return Err(Error::BadMagic { found: magic });
        }

        let name_bytes = &bytes[4..4 + MAX_HASH_NAME_SIZE];
        let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(MAX_HASH_NAME_SIZE);
        let hash_name = std::str::from_utf8(&name_bytes[..name_len])
            .map_err(|_| Error::Malformed("hash name is not valid UTF-8".to_string()))?;

        let data_bytes = bytes[20];
        if data_bytes == 0 || data_bytes as usize > MAX_DATA_SIZE {
            return Err(Error::Malformed(format!(
                "data field of {data_bytes} bytes (expected 1..={MAX_DATA_SIZE})"
            )));
        }

        let mut offset = [0u8; 8];
        offset.copy_from_slice(&bytes[21..29]);

        let header = Self {
            hash_name: CompactString::from(hash_name),
            data_bytes,
            wordlist_offset: u64::from_le_bytes(offset),
        };

        if header.wordlist_offset % header.entry_width() as u64 != 0 {
            return Err(Error::Malformed(format!(
                "wordlist offset {} is not a multiple of the entry width {}",
                header.wordlist_offset,
                header.entry_width()
            )));
        }

        Ok(header)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}

/// Inline flag and word type packed into the low 3 bits of the last data byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub inline: bool,
    pub word_type: WordType,
}

impl Tag {
    #[inline]
    pub fn inline(word_type: WordType) -> Self {
        Self { inline: true, word_type }
    }

    #[inline]
    pub fn pointer(word_type: WordType) -> Self {
        Self { inline: false, word_type }
    }

    #[inline]
    pub fn to_bits(self) -> u8 {
        (self.word_type.as_u8() << 1) | self.inline as u8
    }

    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            inline: byte & INLINE_WORD_MASK != 0,
            word_type: WordType::from_bits((byte & WORD_TYPE_MASK) >> 1),
        }
    }
}

/// Recovers an overflow offset from a pointer entry's data field.
///
/// The field is read as a little-endian integer whose most significant byte
/// carries the tag in its low bits. Fields wider than 8 bytes always keep the
/// tag in padding, so only the first 8 bytes are read.
pub fn decode_pointer(data: &[u8]) -> u64 {
    if data.len() > 8 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&data[..8]);
        return u64::from_le_bytes(bytes);
    }

    if data.is_empty() {
        return 0;
    }

    let mut bytes = [0u8; 8];
    bytes[..data.len()].copy_from_slice(data);
    bytes[data.len() - 1] >>= TAG_BITS;
    u64::from_le_bytes(bytes)
}

/// Writes an inline entry into `slot` (`PREFIX_SIZE + data_bytes` long).
pub fn write_inline_entry(
    slot: &mut [u8],
    prefix: &[u8],
    payload: &[u8],
    word_type: WordType,
) -> Result<()> {
    let data_bytes = slot.len() - PREFIX_SIZE;

    if payload.len() > data_bytes {
        return Err(Error::PayloadTooLarge { len: payload.len(), data_bytes });
    }

    slot[..PREFIX_SIZE].copy_from_slice(&prefix[..PREFIX_SIZE]);

    let data = &mut slot[PREFIX_SIZE..];
    data.fill(0);
    data[..payload.len()].copy_from_slice(payload);

    let tag = Tag::inline(word_type).to_bits();
    let last = &mut data[data_bytes - 1];

    if payload.len() == data_bytes && *last & TAG_MASK != 0 {
        return Err(Error::TagCollision { byte: *last, word_type });
    }

    *last |= tag;

    Ok(())
}

/// Writes a pointer entry into `slot` using the shortest little-endian
/// encoding of `offset`.
pub fn write_pointer_entry(
    slot: &mut [u8],
    prefix: &[u8],
    offset: u64,
    word_type: WordType,
) -> Result<()> {
    let data_bytes = slot.len() - PREFIX_SIZE;
    let significant = (u64::BITS - offset.leading_zeros()).div_ceil(8) as usize;
    let bytes = offset.to_le_bytes();
    let tag = Tag::pointer(word_type).to_bits();

    if significant > data_bytes {
        return Err(Error::PointerOverflow { offset, data_bytes });
    }

    slot[..PREFIX_SIZE].copy_from_slice(&prefix[..PREFIX_SIZE]);

    let data = &mut slot[PREFIX_SIZE..];
    data.fill(0);

    if significant < data_bytes {
        data[..significant].copy_from_slice(&bytes[..significant]);
        data[data_bytes - 1] = tag;
        return Ok(());
    }

    // No padding left: the top byte is shifted up to make room for the tag.
    let top = bytes[significant - 1];
    if top >= 1 << (8 - TAG_BITS) {
        return Err(Error::PointerOverflow { offset, data_bytes });
    }

    data[..significant - 1].copy_from_slice(&bytes[..significant - 1]);
    data[data_bytes - 1] = (top << TAG_BITS) | tag;

    Ok(())
}

/// Decoded view of an entry's data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryData<'a> {
    /// The whole data field; the word decoder stops at its stop symbol.
    Inline { payload: &'a [u8], word_type: WordType },
    Pointer { offset: u64, word_type: WordType },
}

impl<'a> EntryData<'a> {
    pub fn decode(data: &'a [u8]) -> Self {
        let tag = Tag::from_byte(data.last().copied().unwrap_or(0));

        if tag.inline {
            EntryData::Inline { payload: data, word_type: tag.word_type }
        } else {
            EntryData::Pointer { offset: decode_pointer(data), word_type: tag.word_type }
        }
    }

    pub fn word_type(&self) -> WordType {
        match self {
            EntryData::Inline { word_type, .. } | EntryData::Pointer { word_type, .. } => {
                *word_type
            }
        }
    }
}

/// One fixed-width record borrowed from an entry array.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    bytes: &'a [u8],
}

impl<'a> Entry<'a> {
    #[inline]
    pub fn prefix(&self) -> &'a [u8] {
        &self.bytes[..PREFIX_SIZE]
    }

    #[inline]
    pub fn data(&self) -> &'a [u8] {
        &self.bytes[PREFIX_SIZE..]
    }

    #[inline]
    pub fn tag(&self) -> Tag {
        Tag::from_byte(self.bytes[self.bytes.len() - 1])
    }

    #[inline]
    pub fn decode(&self) -> EntryData<'a> {
        EntryData::decode(self.data())
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Bounded view over the sorted entry array.
#[derive(Debug, Clone, Copy)]
pub struct EntryArray<'a> {
    bytes: &'a [u8],
    width: usize,
}

impl<'a> EntryArray<'a> {
    pub fn new(bytes: &'a [u8], width: usize) -> Result<Self> {
        if width <= PREFIX_SIZE || bytes.len() % width != 0 {
            return Err(Error::Malformed(format!(
                "entry array of {} bytes is not a whole number of {width}-byte entries",
                bytes.len()
            )));
        }

        Ok(Self { bytes, width })
    }

    pub fn empty(width: usize) -> Self {
        Self { bytes: &[], width: width.max(PREFIX_SIZE + 1) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / self.width
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn entry(&self, index: usize) -> Option<Entry<'a>> {
        let start = index.checked_mul(self.width)?;
        let bytes = self.bytes.get(start..start.checked_add(self.width)?)?;
        Some(Entry { bytes })
    }

    #[inline]
    pub fn prefix(&self, index: usize) -> Option<&'a [u8]> {
        self.entry(index).map(|entry| entry.prefix())
    }

    pub fn iter(&self) -> impl Iterator<Item = Entry<'a>> + 'a {
        self.bytes.chunks_exact(self.width).map(|bytes| Entry { bytes })
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Bounded view over the overflow blob.
#[derive(Debug, Clone, Copy)]
pub struct Overflow<'a> {
    bytes: &'a [u8],
}

impl<'a> Overflow<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes from `offset` to the end of the blob, or `None` past the end.
    #[inline]
    pub fn slice_from(&self, offset: u64) -> Option<&'a [u8]> {
        let offset = usize::try_from(offset).ok()?;
        if offset >= self.bytes.len() {
            return None;
        }
        Some(&self.bytes[offset..])
    }
}

/// Splits an index body (everything after the header) into its two regions.
pub fn split_index<'a>(
    header: &IndexHeader,
    body: &'a [u8],
) -> Result<(EntryArray<'a>, Overflow<'a>)> {
    let offset = usize::try_from(header.wordlist_offset())
        .ok()
        .filter(|&offset| offset <= body.len())
        .ok_or_else(|| {
            Error::Malformed(format!(
                "wordlist offset {} is past the end of the {}-byte index body",
                header.wordlist_offset(),
                body.len()
            ))
        })?;

    let (entries, overflow) = body.split_at(offset);

    Ok((EntryArray::new(entries, header.entry_width())?, Overflow::new(overflow)))
}
