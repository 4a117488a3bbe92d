//! Reverse-hash index: maps digests back to the words they were computed from.
//!
//! An index is built from a wordlist by hashing every line and storing the first
//! 8 bytes of the digest next to the word. Short words are bit-packed inline in
//! a fixed-width data field; longer ones go to an overflow blob at the end of
//! the file and the entry keeps a pointer. Once sorted by prefix the index is
//! queried by binary search, and every candidate is re-hashed so that only a
//! full digest match is returned.
//!
//! ```no_run
//! use dehash_index::{HashFunction, LookupEngine};
//!
//! let engine = LookupEngine::open("rockyou.sha1.idx")?;
//! let sha1 = HashFunction::from_name("sha1")?;
//! assert_eq!(engine.lookup(&sha1.digest(b"password123")).as_deref(), Some(&b"password123"[..]));
//! # Ok::<(), dehash_index::Error>(())
//! ```

pub mod builder;
pub mod checker;
pub mod codec;
pub mod digest;
pub mod error;
pub mod format;
pub mod lookup;
pub mod memory;
pub mod merger;
pub mod sorter;
pub mod stats;
pub mod wordlist;

pub use builder::{BuildStats, IndexBuilder, build_index};
pub use checker::{CheckReport, check_wordlist};
pub use codec::WordType;
pub use digest::{Digest, HashFunction};
pub use error::{Error, Result};
pub use format::{IndexHeader, min_data_bits, validate_data_bits};
pub use lookup::{LoadedIndex, LookupEngine};
pub use merger::{IndexMerger, MergeStats};
pub use sorter::{SortCheck, sort_index, verify_sorted};
pub use stats::{DataBitsPlan, IndexSummary, plan_data_bits};
pub use wordlist::{MAX_WORD_LEN, WordlistReader};
