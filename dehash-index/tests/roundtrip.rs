use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use dehash_index::{
    Error, HashFunction, IndexMerger, IndexSummary, LoadedIndex, LookupEngine, SortCheck,
    build_index, check_wordlist, sort_index, verify_sorted,
};
use tempfile::{NamedTempFile, tempdir};

fn build_file(words: &[&str], hash: HashFunction, data_bits: u32) -> NamedTempFile {
    let mut wordlist = NamedTempFile::new().unwrap();
    for word in words {
        writeln!(wordlist, "{word}").unwrap();
    }

    let index = NamedTempFile::new().unwrap();
    build_index(
        BufReader::new(File::open(wordlist.path()).unwrap()),
        hash,
        data_bits,
        index.reopen().unwrap(),
        tempfile::tempfile().unwrap(),
    )
    .unwrap();

    let mut file = OpenOptions::new().read(true).write(true).open(index.path()).unwrap();
    sort_index(&mut file).unwrap();
    index
}

#[test]
fn test_build_sort_lookup() {
    let sha1 = HashFunction::from_name("sha1").unwrap();
    let words = ["abc123", "Password1", "héllo"];
    let index = build_file(&words, sha1, 24);

    let check = verify_sorted(&mut File::open(index.path()).unwrap()).unwrap();
    assert_eq!(check, SortCheck::Sorted { entries: 3 });

    let engine = LookupEngine::open(index.path()).unwrap();
    for word in words {
        assert_eq!(engine.lookup(&sha1.digest(word.as_bytes())).as_deref(), Some(word.as_bytes()));
    }
    assert_eq!(engine.lookup(&sha1.digest(b"abc124")), None);
}

#[test]
fn test_sorting_twice_is_byte_identical() {
    let md5 = HashFunction::from_name("md5").unwrap();
    let words: Vec<String> = (0..500).map(|i| format!("word{i}")).collect();
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    let index = build_file(&words, md5, 16);

    let once = std::fs::read(index.path()).unwrap();
    let mut file = OpenOptions::new().read(true).write(true).open(index.path()).unwrap();
    sort_index(&mut file).unwrap();
    assert_eq!(std::fs::read(index.path()).unwrap(), once);
}

#[test]
fn test_merge_then_lookup() {
    let sha256 = HashFunction::from_name("sha256").unwrap();
    let first_words = ["correct horse", "battery", "staple", "Tr0ub4dor&3"];
    let second_words = ["hunter2", "letmein", "a much longer passphrase", "日本語"];

    let first = build_file(&first_words, sha256, 20);
    let second = build_file(&second_words, sha256, 20);
    let first_overflow = LoadedIndex::open(first.path()).unwrap().overflow().len();

    let dir = tempdir().unwrap();
    let merged_path = dir.path().join("merged.idx");
    let progress = AtomicU64::new(0);

    let merger =
        IndexMerger::new(File::open(first.path()).unwrap(), File::open(second.path()).unwrap())
            .unwrap();
    assert_eq!(merger.total_entries(), 8);
    let stats = merger.merge_into(File::create(&merged_path).unwrap(), &progress).unwrap();
    assert_eq!(stats.entries, 8);
    assert_eq!(progress.load(Ordering::Relaxed), 8);

    let merged = LoadedIndex::open(&merged_path).unwrap();
    let summary = IndexSummary::of(&merged);
    assert!(summary.is_sorted());
    assert_eq!(summary.entries, 8);
    assert!(summary.overflow_bytes > first_overflow);

    let engine = LookupEngine::new(merged).unwrap();
    for word in first_words.iter().chain(&second_words) {
        assert_eq!(
            engine.lookup(&sha256.digest(word.as_bytes())).as_deref(),
            Some(word.as_bytes()),
            "{word}"
        );
    }

    let report = check_wordlist(
        &engine,
        "hunter2\nbattery\nnot there\n".as_bytes(),
        &AtomicU64::new(0),
        |_, _| {},
    )
    .unwrap();
    assert_eq!((report.good, report.bad), (2, 1));
}

#[test]
fn test_merge_mismatch_leaves_no_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("never.idx");
    let first = build_file(&["a"], HashFunction::from_name("md5").unwrap(), 16);
    let second = build_file(&["a"], HashFunction::from_name("sha1").unwrap(), 16);

    let result =
        IndexMerger::new(File::open(first.path()).unwrap(), File::open(second.path()).unwrap());
    assert!(matches!(result, Err(Error::HashMismatch { .. })));
    assert!(!output.exists());
}
