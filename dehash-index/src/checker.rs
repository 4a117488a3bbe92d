use std::io::BufRead;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::lookup::LookupEngine;
use crate::wordlist::WordlistReader;

/// Outcome of checking every word of a wordlist against an index.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub total: u64,
    pub good: u64,
    pub bad: u64,
    /// Lines containing a NUL byte. They are counted but never looked up.
    pub null_bytes: u64,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.bad == 0
    }
}

/// Looks up the digest of every line of `wordlist` and checks that the index
/// returns exactly that line.
///
/// `on_mismatch` receives the expected word and whatever the index returned
/// instead, if anything. `progress` is incremented once per line.
pub fn check_wordlist<R, F>(
    engine: &LookupEngine,
    wordlist: R,
    progress: &AtomicU64,
    mut on_mismatch: F,
) -> Result<CheckReport>
where
    R: BufRead,
    F: FnMut(&[u8], Option<&[u8]>),
{
    let hash = engine.hash();
    let mut reader = WordlistReader::new(wordlist);
    let mut found = Vec::with_capacity(256);
    let mut report = CheckReport::default();

    while let Some(word) = reader.next_word()? {
        report.total += 1;
        progress.fetch_add(1, Ordering::Relaxed);

        if word.contains(&0) {
            report.null_bytes += 1;
            continue;
        }

        if engine.lookup_into(&hash.digest(word), &mut found) && found == word {
            report.good += 1;
        } else {
            report.bad += 1;
            let returned = (!found.is_empty()).then_some(found.as_slice());
            on_mismatch(word, returned);
        }
    }

    info!(
        total = report.total,
        good = report.good,
        bad = report.bad,
        null_bytes = report.null_bytes,
        "Wordlist checked"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::builder::build_index;
    use crate::digest::HashFunction;
    use crate::sorter::sort_index;

    fn engine_for(wordlist: &[u8]) -> LookupEngine {
        let hash = HashFunction::from_name("md5").unwrap();
        let mut output = Cursor::new(Vec::new());
        build_index(wordlist, hash, 32, &mut output, Cursor::new(Vec::new())).unwrap();
        sort_index(&mut output).unwrap();
        LookupEngine::from_bytes(output.into_inner()).unwrap()
    }

    #[test]
    fn test_check_all_good() {
        let wordlist = b"abc123\nPassword1\nletmein\n000000\n";
        let engine = engine_for(wordlist);
        let progress = AtomicU64::new(0);

        let report =
            check_wordlist(&engine, &wordlist[..], &progress, |_, _| panic!("no mismatch"))
                .unwrap();

        assert_eq!(report, CheckReport { total: 4, good: 4, bad: 0, null_bytes: 0 });
        assert!(report.is_clean());
        assert_eq!(progress.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_check_reports_missing_and_nul_lines() {
        let engine = engine_for(b"abc123\nletmein\n");
        let mut mismatches = Vec::new();

        let report = check_wordlist(
            &engine,
            &b"abc123\nhunter2\na\0b\nletmein"[..],
            &AtomicU64::new(0),
            |expected, returned| mismatches.push((expected.to_vec(), returned.map(<[u8]>::to_vec))),
        )
        .unwrap();

        assert_eq!(report, CheckReport { total: 4, good: 2, bad: 1, null_bytes: 1 });
        assert_eq!(mismatches, vec![(b"hunter2".to_vec(), None)]);
    }
}
