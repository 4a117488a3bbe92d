//! In-memory top-down merge sort of an index's entry array by prefix.
//!
//! The entry array and a scratch copy of the same size are held at once, so a
//! sort needs twice the entry array in memory. Only entry positions change:
//! data fields are copied verbatim and the overflow blob is never touched, so
//! pointers stay valid.

use std::io::{Read, Seek, SeekFrom, Write};

use tracing::info;

use crate::error::{Error, Result};
use crate::format::{EntryArray, HEADER_SIZE, IndexHeader, PREFIX_SIZE};

/// Bytes of memory needed to sort the index described by `header`.
pub fn sort_memory_required(header: &IndexHeader) -> u64 {
    header.wordlist_offset().saturating_mul(2)
}

/// Sorts a flat array of `width`-byte entries by their 8-byte prefix.
///
/// Entries with equal prefixes keep their relative order.
pub fn sort_entries(entries: &mut [u8], width: usize) {
    let count = entries.len() / width;
    if count <= 1 {
        return;
    }

    let mut work = entries.to_vec();
    merge_sort(entries, &mut work, 0, count, width);
}

/// Sorts `sorted[l..u]`, using `work` (equal to `sorted` on that range) as the
/// other half of the ping-pong.
fn merge_sort(sorted: &mut [u8], work: &mut [u8], l: usize, u: usize, width: usize) {
    if u - l <= 1 {
        return;
    }

    let m = l + (u - l) / 2;

    merge_sort(work, sorted, l, m, width);
    merge_sort(work, sorted, m, u, width);

    merge(work, sorted, l, m, u, width);
}

fn merge(input: &[u8], output: &mut [u8], l: usize, m: usize, u: usize, width: usize) {
    let prefix = |index: usize| &input[index * width..index * width + PREFIX_SIZE];
    let (mut i, mut j) = (l, m);

    for k in l..u {
        let from = if i < m && (j >= u || prefix(i) <= prefix(j)) {
            i += 1;
            i - 1
        } else {
            j += 1;
            j - 1
        };

        output[k * width..(k + 1) * width].copy_from_slice(&input[from * width..(from + 1) * width]);
    }
}

/// Sorts the entry array of an index file in place.
pub fn sort_index<F: Read + Write + Seek>(file: &mut F) -> Result<IndexHeader> {
    file.seek(SeekFrom::Start(0))?;
    let header = IndexHeader::read_from(file)?;

    let len = usize::try_from(header.wordlist_offset()).map_err(|_| {
        Error::Malformed(format!("entry array of {} bytes", header.wordlist_offset()))
    })?;

    let mut entries = vec![0u8; len];
    file.read_exact(&mut entries)?;

    sort_entries(&mut entries, header.entry_width());

    file.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
    file.write_all(&entries)?;
    file.flush()?;

    info!(entries = header.entry_count(), hash = header.hash_name(), "Index sorted");

    Ok(header)
}

/// Index of the first entry whose prefix is smaller than its predecessor's.
pub fn first_unsorted(entries: &EntryArray<'_>) -> Option<usize> {
    let mut previous: Option<&[u8]> = None;

    for (index, entry) in entries.iter().enumerate() {
        if previous.is_some_and(|previous| previous > entry.prefix()) {
            return Some(index);
        }
        previous = Some(entry.prefix());
    }

    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCheck {
    Sorted { entries: u64 },
    Unsorted { index: u64 },
}

/// Streams an index file and checks that its entries are in prefix order.
pub fn verify_sorted<R: Read>(reader: &mut R) -> Result<SortCheck> {
    let header = IndexHeader::read_from(reader)?;
    let width = header.entry_width();
    let count = header.entry_count();

    let mut previous = [0u8; PREFIX_SIZE];
    let mut entry = vec![0u8; width];

    for index in 0..count {
        reader.read_exact(&mut entry)?;

        if index > 0 && previous[..] > entry[..PREFIX_SIZE] {
            return Ok(SortCheck::Unsorted { index });
        }
        previous.copy_from_slice(&entry[..PREFIX_SIZE]);
    }

    Ok(SortCheck::Sorted { entries: count })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    const WIDTH: usize = PREFIX_SIZE + 3;

    fn random_entries(count: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut entries = vec![0u8; count * WIDTH];
        rng.fill(entries.as_mut_slice());
        // Force some duplicate prefixes.
        for i in (0..count).step_by(7).skip(1) {
            let (left, right) = entries.split_at_mut(i * WIDTH);
            right[..PREFIX_SIZE].copy_from_slice(&left[(i - 1) * WIDTH..(i - 1) * WIDTH + PREFIX_SIZE]);
        }
        entries
    }

    fn sorted_records(entries: &[u8]) -> Vec<Vec<u8>> {
        let mut records: Vec<_> = entries.chunks_exact(WIDTH).map(<[u8]>::to_vec).collect();
        records.sort();
        records
    }

    #[test]
    fn test_sort_entries() {
        for count in [0, 1, 2, 3, 10, 257, 1000] {
            let original = random_entries(count, count as u64);
            let mut entries = original.clone();
            sort_entries(&mut entries, WIDTH);

            let view = EntryArray::new(&entries, WIDTH).unwrap();
            assert_eq!(first_unsorted(&view), None, "count {count}");
            // Same multiset of whole records: data fields travel with prefixes.
            assert_eq!(sorted_records(&entries), sorted_records(&original));
        }
    }

    #[test]
    fn test_sort_is_idempotent() {
        let mut entries = random_entries(500, 9);
        sort_entries(&mut entries, WIDTH);
        let once = entries.clone();
        sort_entries(&mut entries, WIDTH);
        assert_eq!(entries, once);
    }

    #[test]
    fn test_equal_prefixes_keep_order() {
        let mut entries = Vec::new();
        for (prefix, data) in [(2u8, 1u8), (1, 1), (2, 2), (1, 2), (2, 3)] {
            entries.extend_from_slice(&[prefix; PREFIX_SIZE]);
            entries.extend_from_slice(&[data; 3]);
        }
        sort_entries(&mut entries, WIDTH);

        let order: Vec<_> = entries.chunks_exact(WIDTH).map(|e| (e[0], e[PREFIX_SIZE])).collect();
        assert_eq!(order, vec![(1, 1), (1, 2), (2, 1), (2, 2), (2, 3)]);
    }

    #[test]
    fn test_sort_index_leaves_overflow_alone() {
        let entries = random_entries(64, 3);
        let header = IndexHeader::new("sha1", 3, entries.len() as u64).unwrap();
        let overflow = b"Password1\0\x12\x3F".to_vec();

        let mut file = header.to_bytes().to_vec();
        file.extend_from_slice(&entries);
        file.extend_from_slice(&overflow);

        let mut cursor = Cursor::new(file);
        sort_index(&mut cursor).unwrap();
        let file = cursor.into_inner();

        assert_eq!(&file[..HEADER_SIZE], &header.to_bytes());
        assert_eq!(&file[HEADER_SIZE + entries.len()..], overflow.as_slice());

        let mut reader = file.as_slice();
        assert_eq!(verify_sorted(&mut reader).unwrap(), SortCheck::Sorted { entries: 64 });
    }

    #[test]
    fn test_verify_sorted_reports_first_violation() {
        let mut entries = Vec::new();
        for prefix in [1u8, 3, 2, 4] {
            entries.extend_from_slice(&[prefix; WIDTH]);
        }
        let header = IndexHeader::new("md5", 3, entries.len() as u64).unwrap();
        let mut file = header.to_bytes().to_vec();
        file.extend_from_slice(&entries);

        assert_eq!(verify_sorted(&mut file.as_slice()).unwrap(), SortCheck::Unsorted { index: 2 });
        let view = EntryArray::new(&entries, WIDTH).unwrap();
        assert_eq!(first_unsorted(&view), Some(2));
    }

    #[test]
    fn test_memory_required() {
        let header = IndexHeader::new("md5", 3, 11 * 1000).unwrap();
        assert_eq!(sort_memory_required(&header), 22_000);
    }
}
