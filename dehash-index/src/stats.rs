//! Wordlist and index diagnostics: data width planning and index summaries.

use std::collections::BTreeMap;
use std::io::BufRead;

use serde::Serialize;
use tracing::debug;

use crate::codec::{WORD_TYPE_COUNT, WordType};
use crate::error::Result;
use crate::format::{
    HEADER_SIZE, MAX_DATA_BITS, PREFIX_SIZE, TAG_BITS, data_bytes_for_bits, min_data_bits,
};
use crate::lookup::LoadedIndex;
use crate::sorter::first_unsorted;
use crate::wordlist::WordlistReader;

/// Counts of a single tag kind split by word type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub no_compression: u64,
    pub numeric: u64,
    pub alphanumeric: u64,
    pub reduced_ascii: u64,
}

impl TypeCounts {
    fn from_array(counts: [u64; WORD_TYPE_COUNT]) -> Self {
        Self {
            no_compression: counts[WordType::NoCompression as usize],
            numeric: counts[WordType::Numeric as usize],
            alphanumeric: counts[WordType::Alphanumeric as usize],
            reduced_ascii: counts[WordType::ReducedAscii as usize],
        }
    }

    pub fn get(&self, word_type: WordType) -> u64 {
        match word_type {
            WordType::NoCompression => self.no_compression,
            WordType::Numeric => self.numeric,
            WordType::Alphanumeric => self.alphanumeric,
            WordType::ReducedAscii => self.reduced_ascii,
        }
    }

    pub fn total(&self) -> u64 {
        self.no_compression + self.numeric + self.alphanumeric + self.reduced_ascii
    }
}

/// Predicted shape of an index built with a given data width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataBitsPlan {
    pub data_bits: u32,
    pub data_bytes: u8,
    pub words: u64,
    pub inline: TypeCounts,
    pub pointers: TypeCounts,
    /// Header, entry array and overflow blob.
    pub index_size: u64,
}

impl DataBitsPlan {
    pub fn inline_ratio(&self) -> f64 {
        if self.words == 0 {
            return 0.0;
        }
        self.inline.total() as f64 / self.words as f64
    }
}

/// Finds the data width producing the smallest index for `wordlist`.
///
/// Every width from the smallest able to address `wordlist_size` bytes up to
/// the maximum is evaluated; on equal sizes the wider width wins.
pub fn plan_data_bits<R: BufRead>(wordlist: R, wordlist_size: u64) -> Result<DataBitsPlan> {
    let (histogram, words) = word_histogram(wordlist)?;
    let min = min_data_bits(wordlist_size).min(MAX_DATA_BITS);
    let mut best: Option<DataBitsPlan> = None;

    for data_bits in min..=MAX_DATA_BITS {
        let plan = plan_for(&histogram, words, data_bits);
        debug!(data_bits, index_size = plan.index_size, "Evaluated data width");

        if best.as_ref().is_none_or(|best| plan.index_size <= best.index_size) {
            best = Some(plan);
        }
    }

    // `min..=MAX_DATA_BITS` is never empty.
    Ok(best.unwrap_or_else(|| plan_for(&histogram, words, MAX_DATA_BITS)))
}

/// Words keyed by (encoded bits, word type). Only those two matter for sizing.
type Histogram = BTreeMap<(usize, usize), u64>;

fn word_histogram<R: BufRead>(wordlist: R) -> Result<(Histogram, u64)> {
    let mut histogram = Histogram::new();
    let mut reader = WordlistReader::new(wordlist);
    let mut words = 0u64;

    while let Some(word) = reader.next_word()? {
        let word_type = WordType::classify(word);
        let bits = word_type.encoded_bits(word.len());
        *histogram.entry((bits, word_type as usize)).or_default() += 1;
        words += 1;
    }

    Ok((histogram, words))
}

fn plan_for(histogram: &Histogram, words: u64, data_bits: u32) -> DataBitsPlan {
    let data_bytes = data_bytes_for_bits(data_bits);
    let mut inline = [0u64; WORD_TYPE_COUNT];
    let mut pointers = [0u64; WORD_TYPE_COUNT];
    let mut overflow = 0u64;

    for (&(bits, word_type), &count) in histogram {
        if bits + TAG_BITS as usize <= data_bits as usize {
            inline[word_type] += count;
        } else {
            pointers[word_type] += count;
            overflow += bits.div_ceil(8) as u64 * count;
        }
    }

    DataBitsPlan {
        data_bits,
        data_bytes,
        words,
        inline: TypeCounts::from_array(inline),
        pointers: TypeCounts::from_array(pointers),
        index_size: HEADER_SIZE as u64 + words * (PREFIX_SIZE as u64 + data_bytes as u64) + overflow,
    }
}

/// Structural summary of an index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub hash_name: String,
    pub data_bytes: u8,
    pub entries: u64,
    pub inline: TypeCounts,
    pub pointers: TypeCounts,
    pub overflow_bytes: u64,
    /// Position of the first entry out of prefix order, if any.
    pub first_unsorted: Option<u64>,
}

impl IndexSummary {
    pub fn of(index: &LoadedIndex) -> Self {
        let entries = index.entries();
        let mut inline = [0u64; WORD_TYPE_COUNT];
        let mut pointers = [0u64; WORD_TYPE_COUNT];

        for entry in entries.iter() {
            let tag = entry.tag();
            if tag.inline {
                inline[tag.word_type as usize] += 1;
            } else {
                pointers[tag.word_type as usize] += 1;
            }
        }

        Self {
            hash_name: index.header().hash_name().to_string(),
            data_bytes: index.header().data_bytes() as u8,
            entries: entries.len() as u64,
            inline: TypeCounts::from_array(inline),
            pointers: TypeCounts::from_array(pointers),
            overflow_bytes: index.overflow().len(),
            first_unsorted: first_unsorted(&entries).map(|index| index as u64),
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.first_unsorted.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::builder::build_index;
    use crate::digest::HashFunction;
    use crate::sorter::sort_index;

    #[test]
    fn test_plan_counts_match_build() {
        let wordlist = "123\nPassword1\nhéllo\nabc\n".as_bytes();
        let plan = plan_for_bits(wordlist, 24);

        let hash = HashFunction::from_name("sha1").unwrap();
        let mut output = Cursor::new(Vec::new());
        let stats = build_index(wordlist, hash, 24, &mut output, Cursor::new(Vec::new())).unwrap();

        assert_eq!(plan.words, stats.words);
        assert_eq!(plan.inline.total(), stats.inline_count());
        assert_eq!(plan.pointers.total(), stats.pointer_count());
        for word_type in WordType::ALL {
            assert_eq!(plan.inline.get(word_type), stats.inline[word_type as usize]);
            assert_eq!(plan.pointers.get(word_type), stats.pointers[word_type as usize]);
        }
        assert_eq!(plan.index_size, output.into_inner().len() as u64);
    }

    fn plan_for_bits(wordlist: &[u8], data_bits: u32) -> DataBitsPlan {
        let (histogram, words) = word_histogram(wordlist).unwrap();
        plan_for(&histogram, words, data_bits)
    }

    #[test]
    fn test_plan_picks_smallest_index() {
        // Six-digit PINs need 28 bits, +3 for the tag: 31 bits fit 4 bytes.
        let wordlist: Vec<u8> =
            (0..200).flat_map(|i| format!("{:06}\n", i * 37).into_bytes()).collect();
        let plan = plan_data_bits(wordlist.as_slice(), wordlist.len() as u64).unwrap();

        assert_eq!(plan.data_bytes, 4);
        // Widest width with the same byte count wins the tie.
        assert_eq!(plan.data_bits, 32);
        assert_eq!(plan.inline.numeric, 200);
        assert_eq!(plan.pointers.total(), 0);
        assert_eq!(plan.index_size, HEADER_SIZE as u64 + 200 * 12);
        assert_eq!(plan.inline_ratio(), 1.0);
    }

    #[test]
    fn test_plan_empty_wordlist() {
        let plan = plan_data_bits(&b""[..], 0).unwrap();
        assert_eq!(plan.words, 0);
        assert_eq!(plan.index_size, HEADER_SIZE as u64);
        assert_eq!(plan.data_bits, MAX_DATA_BITS);
        assert_eq!(plan.inline_ratio(), 0.0);
    }

    #[test]
    fn test_index_summary() {
        let hash = HashFunction::from_name("md5").unwrap();
        let mut output = Cursor::new(Vec::new());
        build_index(
            "123\nPassword1\nhéllo\n".as_bytes(),
            hash,
            24,
            &mut output,
            Cursor::new(Vec::new()),
        )
        .unwrap();
        sort_index(&mut output).unwrap();

        let index = LoadedIndex::from_bytes(output.into_inner()).unwrap();
        let summary = IndexSummary::of(&index);

        assert_eq!(summary.hash_name, "md5");
        assert_eq!(summary.data_bytes, 3);
        assert_eq!(summary.entries, 3);
        assert_eq!(summary.inline.numeric, 1);
        assert_eq!(summary.pointers.alphanumeric, 1);
        assert_eq!(summary.pointers.no_compression, 1);
        assert_eq!(summary.overflow_bytes, 15);
        assert!(summary.is_sorted());
    }
}
