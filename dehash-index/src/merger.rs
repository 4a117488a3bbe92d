//! Merge-join of two sorted indexes built with the same digest and data width.
//!
//! The output holds both entry arrays in prefix order followed by the first
//! overflow blob and then the second. Pointers taken from the second index are
//! shifted by the length of the first blob; every other entry is copied as is.

use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::digest::HashFunction;
use crate::error::{Error, Result};
use crate::format::{EntryData, HEADER_SIZE, IndexHeader, PREFIX_SIZE, write_pointer_entry};

/// Copy buffer size, matching the 1 MiB chunks used for blob copies.
const COPY_BUFFER_SIZE: usize = 1 << 20;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    pub entries: u64,
    pub from_first: u64,
    pub from_second: u64,
    pub rebased_pointers: u64,
    pub overflow_bytes: u64,
}

struct IndexSource<R> {
    reader: BufReader<R>,
    header: IndexHeader,
    overflow_len: u64,
}

impl<R: Read + Seek> IndexSource<R> {
    fn open(mut inner: R) -> Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        let header = IndexHeader::read_from(&mut inner)?;

        let file_len = inner.seek(SeekFrom::End(0))?;
        let overflow_len = file_len
            .checked_sub(HEADER_SIZE as u64 + header.wordlist_offset())
            .ok_or_else(|| {
                Error::Malformed(format!(
                    "index of {file_len} bytes is shorter than its {}-byte entry array",
                    header.wordlist_offset()
                ))
            })?;

        inner.seek(SeekFrom::Start(HEADER_SIZE as u64))?;

        Ok(Self { reader: BufReader::with_capacity(COPY_BUFFER_SIZE, inner), header, overflow_len })
    }

    fn read_entry(&mut self, entry: &mut [u8], remaining: &mut u64) -> Result<bool> {
        if *remaining == 0 {
            return Ok(false);
        }
        self.reader.read_exact(entry)?;
        *remaining -= 1;
        Ok(true)
    }

    fn copy_overflow<W: Write>(&mut self, output: &mut W) -> Result<u64> {
        self.reader.seek(SeekFrom::Start(HEADER_SIZE as u64 + self.header.wordlist_offset()))?;
        let copied = io::copy(&mut (&mut self.reader).take(self.overflow_len), output)?;
        if copied != self.overflow_len {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("overflow blob ended after {copied} of {} bytes", self.overflow_len),
            )));
        }
        Ok(copied)
    }
}

/// Two validated indexes ready to be merged.
pub struct IndexMerger<R> {
    first: IndexSource<R>,
    second: IndexSource<R>,
    hash: HashFunction,
}

impl<R: Read + Seek> IndexMerger<R> {
    /// Reads both headers and checks that the indexes can be merged. Nothing is
    /// written until [`IndexMerger::merge_into`].
    pub fn new(first: R, second: R) -> Result<Self> {
        let first = IndexSource::open(first)?;
        let second = IndexSource::open(second)?;

        if first.header.data_bytes() != second.header.data_bytes() {
            return Err(Error::DataBytesMismatch {
                first: first.header.data_bytes() as u8,
                second: second.header.data_bytes() as u8,
            });
        }

        if first.header.hash_name() != second.header.hash_name() {
            return Err(Error::HashMismatch {
                first: first.header.hash_name().to_string(),
                second: second.header.hash_name().to_string(),
            });
        }

        let hash = HashFunction::from_name(first.header.hash_name())?;

        debug!(
            hash = hash.name(),
            first_entries = first.header.entry_count(),
            second_entries = second.header.entry_count(),
            first_overflow = first.overflow_len,
            "Merge inputs validated"
        );

        Ok(Self { first, second, hash })
    }

    pub fn total_entries(&self) -> u64 {
        self.first.header.entry_count() + self.second.header.entry_count()
    }

    pub fn hash(&self) -> HashFunction {
        self.hash
    }

    /// Writes the merged index to `output`. `progress` is incremented once per
    /// entry written.
    ///
    /// A rebased pointer that no longer fits the data field fails with
    /// [`Error::PointerOverflow`] after earlier entries were written. On any
    /// error the output is partial and must be discarded.
    pub fn merge_into<W: Write + Seek>(
        mut self,
        output: W,
        progress: &AtomicU64,
    ) -> Result<MergeStats> {
        let width = self.first.header.entry_width();
        let rebase = self.first.overflow_len;
        let mut header = IndexHeader::new(self.hash.name(), width as u8 - PREFIX_SIZE as u8, 0)?;
        let mut output = BufWriter::with_capacity(COPY_BUFFER_SIZE, output);
        let mut stats = MergeStats::default();

        // Placeholder until the entry array length is known.
        header.write_to(&mut output)?;

        let mut left_remaining = self.first.header.entry_count();
        let mut right_remaining = self.second.header.entry_count();
        let mut left = vec![0u8; width];
        let mut right = vec![0u8; width];
        let mut rebased = vec![0u8; width];

        let mut has_left = self.first.read_entry(&mut left, &mut left_remaining)?;
        let mut has_right = self.second.read_entry(&mut right, &mut right_remaining)?;

        while has_left || has_right {
            if has_left && (!has_right || left[..PREFIX_SIZE] <= right[..PREFIX_SIZE]) {
                output.write_all(&left)?;
                stats.from_first += 1;
                has_left = self.first.read_entry(&mut left, &mut left_remaining)?;
            } else {
                match EntryData::decode(&right[PREFIX_SIZE..]) {
                    EntryData::Pointer { offset, word_type } => {
                        let offset = offset.checked_add(rebase).ok_or(Error::PointerOverflow {
                            offset,
                            data_bytes: width - PREFIX_SIZE,
                        })?;
                        write_pointer_entry(
                            &mut rebased,
                            &right[..PREFIX_SIZE],
                            offset,
                            word_type,
                        )?;
                        output.write_all(&rebased)?;
                        stats.rebased_pointers += 1;
                    }
                    EntryData::Inline { .. } => output.write_all(&right)?,
                }
                stats.from_second += 1;
                has_right = self.second.read_entry(&mut right, &mut right_remaining)?;
            }

            stats.entries += 1;
            progress.fetch_add(1, Ordering::Relaxed);
        }

        stats.overflow_bytes = self.first.copy_overflow(&mut output)?;
        stats.overflow_bytes += self.second.copy_overflow(&mut output)?;

        header.set_wordlist_offset(stats.entries * width as u64);
        output.seek(SeekFrom::Start(0))?;
        header.write_to(&mut output)?;
        output.seek(SeekFrom::End(0))?;
        output.flush()?;

        info!(
            entries = stats.entries,
            rebased_pointers = stats.rebased_pointers,
            overflow_bytes = stats.overflow_bytes,
            "Indexes merged"
        );

        Ok(stats)
    }
}
