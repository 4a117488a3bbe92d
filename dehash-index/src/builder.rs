//! Index construction from a wordlist.
//!
//! Entries are written in wordlist order behind a placeholder header, while
//! words too large to fit inline go to a separate overflow stream. `finish`
//! appends the overflow stream and back-patches the header once the entry
//! array length is known. The output is not sorted.

use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};

use tracing::{debug, info};

use crate::codec::{self, WORD_TYPE_COUNT};
use crate::digest::HashFunction;
use crate::error::{Error, Result};
use crate::format::{
    IndexHeader, MAX_DATA_BITS, MIN_DATA_BITS, PREFIX_SIZE, TAG_BITS, data_bytes_for_bits,
    write_inline_entry, write_pointer_entry,
};
use crate::wordlist::WordlistReader;

/// Counters collected while building an index, indexed by `WordType as usize`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub words: u64,
    pub inline: [u64; WORD_TYPE_COUNT],
    pub pointers: [u64; WORD_TYPE_COUNT],
    pub overflow_bytes: u64,
}

impl BuildStats {
    pub fn inline_count(&self) -> u64 {
        self.inline.iter().sum()
    }

    pub fn pointer_count(&self) -> u64 {
        self.pointers.iter().sum()
    }
}

pub struct IndexBuilder<W, T> {
    hash: HashFunction,
    header: IndexHeader,
    data_bits: usize,
    output: W,
    overflow: T,
    entry: Vec<u8>,
    packed: Vec<u8>,
    stats: BuildStats,
}

impl<W, T> IndexBuilder<W, T>
where
    W: Write + Seek,
    T: Read + Write + Seek,
{
    /// Starts an index with `data_bits` bits per data field. Nothing is written
    /// if the parameters are rejected.
    pub fn new(hash: HashFunction, data_bits: u32, mut output: W, overflow: T) -> Result<Self> {
        if !(MIN_DATA_BITS..=MAX_DATA_BITS).contains(&data_bits) {
            return Err(Error::InvalidDataBits {
                bits: data_bits,
                min: MIN_DATA_BITS,
                max: MAX_DATA_BITS,
            });
        }

        let header = IndexHeader::new(hash.name(), data_bytes_for_bits(data_bits), 0)?;

        // Placeholder until the entry array length is known.
        header.write_to(&mut output)?;

        debug!(
            hash = hash.name(),
            data_bits,
            data_bytes = header.data_bytes(),
            "Started index build"
        );

        Ok(Self {
            hash,
            entry: vec![0u8; header.entry_width()],
            header,
            data_bits: data_bits as usize,
            output,
            overflow,
            packed: Vec::with_capacity(256),
            stats: BuildStats::default(),
        })
    }

    pub fn add_word(&mut self, word: &[u8]) -> Result<()> {
        let digest = self.hash.digest(word);
        let prefix = &digest.as_bytes()[..PREFIX_SIZE];
        let compressed = codec::compress(word, &mut self.packed);
        let word_type = compressed.word_type;

        if compressed.bits + TAG_BITS as usize <= self.data_bits {
            write_inline_entry(&mut self.entry, prefix, &self.packed, word_type)?;
            self.stats.inline[word_type as usize] += 1;
        } else {
            write_pointer_entry(&mut self.entry, prefix, self.stats.overflow_bytes, word_type)?;
            self.overflow.write_all(&self.packed)?;
            self.stats.overflow_bytes += self.packed.len() as u64;
            self.stats.pointers[word_type as usize] += 1;
        }

        self.output.write_all(&self.entry)?;
        self.stats.words += 1;

        Ok(())
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Appends the overflow blob and rewrites the header.
    pub fn finish(mut self) -> Result<BuildStats> {
        let wordlist_offset = self.stats.words * self.header.entry_width() as u64;

        self.overflow.flush()?;
        self.overflow.seek(SeekFrom::Start(0))?;
        let copied =
            io::copy(&mut (&mut self.overflow).take(self.stats.overflow_bytes), &mut self.output)?;
        if copied != self.stats.overflow_bytes {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("overflow stream ended after {copied} of {} bytes", self.stats.overflow_bytes),
            )));
        }

        self.header.set_wordlist_offset(wordlist_offset);
        self.output.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut self.output)?;
        self.output.seek(SeekFrom::End(0))?;
        self.output.flush()?;

        info!(
            words = self.stats.words,
            inline = self.stats.inline_count(),
            pointers = self.stats.pointer_count(),
            overflow_bytes = self.stats.overflow_bytes,
            "Index built"
        );

        Ok(self.stats)
    }
}

/// Builds an index from every line of `wordlist`.
pub fn build_index<R, W, T>(
    wordlist: R,
    hash: HashFunction,
    data_bits: u32,
    output: W,
    overflow: T,
) -> Result<BuildStats>
where
    R: BufRead,
    W: Write + Seek,
    T: Read + Write + Seek,
{
    let mut builder = IndexBuilder::new(hash, data_bits, output, overflow)?;
    let mut reader = WordlistReader::new(wordlist);

    while let Some(word) = reader.next_word()? {
        builder.add_word(word)?;
    }

    builder.finish()
}
