//! Reverse lookup of a digest against a sorted, fully loaded index.

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::codec;
use crate::digest::{Digest, HashFunction};
use crate::error::{Error, Result};
use crate::format::{Entry, EntryArray, EntryData, HEADER_SIZE, IndexHeader, Overflow, split_index};

/// An index file held in a single buffer.
///
/// The header is validated once on load; the entry array and overflow blob are
/// bounded views borrowed from the same buffer.
pub struct LoadedIndex {
    header: IndexHeader,
    bytes: Vec<u8>,
}

impl fmt::Debug for LoadedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedIndex")
            .field("header", &self.header)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl LoadedIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Index loaded");
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let header_bytes: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|header| header.try_into().ok())
            .ok_or_else(|| {
                Error::Malformed(format!("{} bytes is too short for an index header", bytes.len()))
            })?;

        let header = IndexHeader::from_bytes(header_bytes)?;

        // Validate the regions now so later views cannot fail.
        split_index(&header, &bytes[HEADER_SIZE..])?;

        Ok(Self { header, bytes })
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn entry_count(&self) -> usize {
        self.entries().len()
    }

    pub fn entries(&self) -> EntryArray<'_> {
        self.views().0
    }

    pub fn overflow(&self) -> Overflow<'_> {
        self.views().1
    }

    fn views(&self) -> (EntryArray<'_>, Overflow<'_>) {
        let body = &self.bytes[HEADER_SIZE..];
        let (entries, overflow) = body.split_at(self.header.wordlist_offset() as usize);
        // Width and length were checked by `split_index` on load.
        match EntryArray::new(entries, self.header.entry_width()) {
            Ok(entries) => (entries, Overflow::new(overflow)),
            Err(_) => (EntryArray::empty(self.header.entry_width()), Overflow::new(&[])),
        }
    }

    /// Decodes the word an entry refers to into `out`.
    pub fn resolve_word(&self, entry: &Entry<'_>, out: &mut Vec<u8>) -> Result<()> {
        match entry.decode() {
            EntryData::Inline { payload, word_type } => codec::decompress(payload, word_type, out),
            EntryData::Pointer { offset, word_type } => {
                let data = self.overflow().slice_from(offset).ok_or_else(|| {
                    Error::Malformed(format!(
                        "pointer {offset} is past the end of the {}-byte overflow blob",
                        self.overflow().len()
                    ))
                })?;
                codec::decompress(data, word_type, out)
            }
        }
    }
}

/// Binary searches a sorted entry array for `key`, returning the index of any
/// entry with that prefix.
#[inline]
pub fn binary_search_prefix(entries: &EntryArray<'_>, key: &[u8]) -> Option<usize> {
    let mut low = 0usize;
    let mut high = entries.len();

    while low < high {
        let mid = low + (high - low) / 2;
        let prefix = entries.prefix(mid)?;

        match prefix.cmp(key) {
            Ordering::Equal => return Some(mid),
            Ordering::Less => low = mid + 1,
            Ordering::Greater => high = mid,
        }
    }

    None
}

/// A loaded index paired with the digest function it was built with.
#[derive(Debug)]
pub struct LookupEngine {
    index: LoadedIndex,
    hash: HashFunction,
}

impl LookupEngine {
    /// Loads an index and resolves its hash name against the registry.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(LoadedIndex::open(path)?)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::new(LoadedIndex::from_bytes(bytes)?)
    }

    pub fn new(index: LoadedIndex) -> Result<Self> {
        let hash = HashFunction::from_name(index.header().hash_name())?;
        Ok(Self { index, hash })
    }

    /// Uses `hash` instead of a registered function. The header must still
    /// carry the same name.
    pub fn with_hash_function(bytes: Vec<u8>, hash: HashFunction) -> Result<Self> {
        let index = LoadedIndex::from_bytes(bytes)?;

        if index.header().hash_name() != hash.name() {
            return Err(Error::HashMismatch {
                first: index.header().hash_name().to_string(),
                second: hash.name().to_string(),
            });
        }

        Ok(Self { index, hash })
    }

    pub fn index(&self) -> &LoadedIndex {
        &self.index
    }

    pub fn header(&self) -> &IndexHeader {
        self.index.header()
    }

    pub fn hash(&self) -> HashFunction {
        self.hash
    }

    pub fn entry_count(&self) -> usize {
        self.index.entry_count()
    }

    pub fn lookup(&self, digest: &Digest) -> Option<Vec<u8>> {
        let mut word = Vec::new();
        self.lookup_into(digest, &mut word).then_some(word)
    }

    /// Writes the word whose digest is `digest` into `out` and returns `true`,
    /// or returns `false` if the index holds no such word.
    pub fn lookup_into(&self, digest: &Digest, out: &mut Vec<u8>) -> bool {
        out.clear();

        if digest.len() != self.hash.size() {
            return false;
        }
        let Some(key) = digest.prefix() else {
            return false;
        };

        let entries = self.index.entries();
        let Some(mut first) = binary_search_prefix(&entries, key) else {
            return false;
        };

        while first > 0 && entries.prefix(first - 1) == Some(key) {
            first -= 1;
        }

        for (position, entry) in (first..).zip(entries.iter().skip(first)) {
            if entry.prefix() != key {
                break;
            }

            if let Err(e) = self.index.resolve_word(&entry, out) {
                warn!(position, error = %e, "Skipping undecodable candidate");
                continue;
            }

            if self.hash.digest(out).as_bytes() == digest.as_bytes() {
                return true;
            }
        }

        out.clear();
        false
    }
}
