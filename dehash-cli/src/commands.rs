use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use clap::Args;
use dehash_index::format::data_bytes_for_bits;
use dehash_index::memory::load_memory_required;
use dehash_index::sorter::sort_memory_required;
use dehash_index::{
    BuildStats, DataBitsPlan, Digest, HashFunction, IndexHeader, IndexMerger, IndexSummary,
    LoadedIndex, LookupEngine, SortCheck, WordType, build_index, check_wordlist, min_data_bits,
    plan_data_bits, sort_index, validate_data_bits, verify_sorted,
};
use tracing::{info, warn};

use crate::error::Error;
use crate::progress;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Digest function to index (md5, sha1, sha256, sha384, sha512)
    pub hash: String,

    /// Wordlist, one word per line
    pub wordlist: PathBuf,

    /// Index file to create
    pub output: PathBuf,

    /// Bits per data field (default: the smallest able to address the wordlist)
    #[arg(short = 'b', long)]
    pub data_bits: Option<u32>,

    /// Scratch file for the overflow blob (default: an anonymous file next to
    /// the output)
    #[arg(long)]
    pub tmp: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SortArgs {
    /// Index file to sort in place
    pub index: PathBuf,

    /// Skip the memory confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// First index; wins on equal prefixes
    pub first: PathBuf,

    pub second: PathBuf,

    /// Merged index file to create
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Sorted index file
    pub index: PathBuf,

    /// Wordlist whose every word should resolve to itself
    pub wordlist: PathBuf,

    /// Skip the memory confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Sorted index file
    pub index: PathBuf,

    /// Hex digests to reverse
    #[arg(required = true)]
    pub digests: Vec<String>,

    /// Skip the memory confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    /// Wordlist to plan an index for
    pub wordlist: PathBuf,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Index file to check
    pub index: PathBuf,

    /// Also load the index and print its entry statistics
    #[arg(long)]
    pub stats: bool,

    /// Skip the memory confirmation prompt of `--stats`
    #[arg(short, long)]
    pub yes: bool,
}

fn open(path: &Path) -> Result<File, Error> {
    File::open(path).map_err(|source| Error::Open { path: path.to_path_buf(), source })
}

/// Confirms the allocation for holding the index at `path` in memory.
fn ensure_load_allocation(path: &Path, yes: bool) -> Result<(), Error> {
    progress::ensure_allocation(load_memory_required(&open(path)?)?, yes)
}

pub async fn build(args: BuildArgs, no_progress: bool) -> Result<(), Error> {
    let hash = HashFunction::from_name(&args.hash)?;
    let wordlist = open(&args.wordlist)?;
    let wordlist_size = wordlist.metadata()?.len();
    let data_bits = validate_data_bits(
        args.data_bits.unwrap_or_else(|| min_data_bits(wordlist_size)),
        wordlist_size,
    )?;

    let output = File::create(&args.output)
        .map_err(|source| Error::Open { path: args.output.clone(), source })?;
    let overflow = match &args.tmp {
        Some(path) => OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| Error::Open { path: path.clone(), source })?,
        None => {
            let dir = args.output.parent().filter(|dir| !dir.as_os_str().is_empty());
            tempfile::tempfile_in(dir.unwrap_or(Path::new(".")))?
        }
    };

    println!(
        "Building {} index of {:?} with {} data bits ({} data bytes per entry)",
        hash.name(),
        args.wordlist,
        data_bits,
        data_bytes_for_bits(data_bits)
    );

    let bar = progress::bytes_bar(wordlist_size, no_progress);
    let job_bar = bar.clone();
    let result = tokio::task::spawn_blocking(move || {
        build_index(
            BufReader::new(job_bar.wrap_read(wordlist)),
            hash,
            data_bits,
            BufWriter::new(output),
            overflow,
        )
    })
    .await;

    if let Some(path) = &args.tmp {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Unable to remove the overflow scratch file");
        }
    }

    let stats = match result {
        Ok(Ok(stats)) => stats,
        Ok(Err(e)) => {
            bar.abandon();
            remove_partial(&args.output);
            return Err(e.into());
        }
        Err(e) => {
            remove_partial(&args.output);
            return Err(e.into());
        }
    };

    bar.finish_with_message("done");
    print_build_stats(&stats);
    println!("Index written to {:?}; sort it before querying.", args.output);

    Ok(())
}

fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Unable to remove the partial index");
    }
}

fn print_build_stats(stats: &BuildStats) {
    let percent = |count: u64| {
        if stats.words == 0 { 0.0 } else { 100.0 * count as f64 / stats.words as f64 }
    };

    println!("+ words: {}", stats.words);
    println!("+ inlines: {} ({:.02}%)", stats.inline_count(), percent(stats.inline_count()));
    for word_type in WordType::ALL {
        println!("\t+ {}: {}", word_type.name(), stats.inline[word_type as usize]);
    }
    println!("+ pointers: {} ({:.02}%)", stats.pointer_count(), percent(stats.pointer_count()));
    for word_type in WordType::ALL {
        println!("\t+ {}: {}", word_type.name(), stats.pointers[word_type as usize]);
    }
    println!("+ overflow bytes: {}", stats.overflow_bytes);
}

pub async fn sort(args: SortArgs) -> Result<(), Error> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&args.index)
        .map_err(|source| Error::Open { path: args.index.clone(), source })?;

    let header = IndexHeader::read_from(&mut file)?;
    progress::ensure_allocation(sort_memory_required(&header), args.yes)?;

    println!("Sorting {} entries of {:?}", header.entry_count(), args.index);
    tokio::task::spawn_blocking(move || sort_index(&mut file)).await??;
    println!("Index sorted.");

    Ok(())
}

pub async fn merge(args: MergeArgs, no_progress: bool) -> Result<(), Error> {
    let merger = IndexMerger::new(open(&args.first)?, open(&args.second)?)?;
    let total = merger.total_entries();

    let output = File::create(&args.output)
        .map_err(|source| Error::Open { path: args.output.clone(), source })?;

    println!("Merging {total} entries into {:?}", args.output);

    let bar = progress::bar(total, no_progress);
    let stats = progress::run_counted(&bar, move |counter| merger.merge_into(output, counter)).await;
    let stats = match stats {
        Ok(stats) => stats,
        Err(e) => {
            bar.abandon();
            remove_partial(&args.output);
            return Err(e);
        }
    };
    bar.finish_with_message("done");

    println!(
        "+ entries: {} ({} from the first index, {} from the second)",
        stats.entries, stats.from_first, stats.from_second
    );
    println!("+ rebased pointers: {}", stats.rebased_pointers);
    println!("+ overflow bytes: {}", stats.overflow_bytes);

    Ok(())
}

async fn load_engine(path: &Path, yes: bool) -> Result<LookupEngine, Error> {
    ensure_load_allocation(path, yes)?;

    let path = path.to_path_buf();
    let engine = tokio::task::spawn_blocking(move || LookupEngine::open(path)).await??;
    info!(
        hash = engine.hash().name(),
        entries = engine.entry_count(),
        "The index is loaded successfully"
    );
    Ok(engine)
}

pub async fn check(args: CheckArgs, no_progress: bool) -> Result<(), Error> {
    let wordlist = open(&args.wordlist)?;
    let engine = load_engine(&args.index, args.yes).await?;

    let bar = progress::spinner("words checked", no_progress);
    let job_bar = bar.clone();
    let report = progress::run_counted(&bar, move |counter| {
        check_wordlist(&engine, BufReader::new(wordlist), counter, |expected, _| {
            job_bar.println(format!("ERROR: {}", String::from_utf8_lossy(expected)));
        })
    })
    .await?;
    bar.finish_and_clear();

    let checked = report.total - report.null_bytes;
    let percent =
        if report.total == 0 { 0.0 } else { 100.0 * report.good as f64 / report.total as f64 };
    println!(
        "{} good / {} bad / {} null, {} ({:.2}%)",
        report.good, report.bad, report.null_bytes, report.total, percent
    );

    if !report.is_clean() {
        return Err(Error::CheckFailed { bad: report.bad, total: checked });
    }

    Ok(())
}

/// Parses every digest before loading anything.
fn parse_digests(inputs: &[String]) -> Result<Vec<Digest>, Error> {
    inputs
        .iter()
        .map(|input| {
            Digest::from_hex(input.trim().as_bytes())
                .ok_or_else(|| Error::InvalidDigest { input: input.clone() })
        })
        .collect()
}

pub async fn lookup(args: LookupArgs) -> Result<(), Error> {
    let digests = parse_digests(&args.digests)?;
    let engine = load_engine(&args.index, args.yes).await?;

    for line in lookup_lines(&engine, &digests) {
        println!("{line}");
    }

    Ok(())
}

/// One `<digest> <word>` line per digest, `-` standing in for unknown words.
fn lookup_lines(engine: &LookupEngine, digests: &[Digest]) -> Vec<String> {
    let mut word = Vec::new();

    digests
        .iter()
        .map(|digest| {
            if engine.lookup_into(digest, &mut word) {
                format!("{digest} {}", String::from_utf8_lossy(&word))
            } else {
                format!("{digest} -")
            }
        })
        .collect()
}

pub async fn optimize(args: OptimizeArgs) -> Result<(), Error> {
    let wordlist = open(&args.wordlist)?;
    let wordlist_size = wordlist.metadata()?.len();

    let plan = tokio::task::spawn_blocking(move || {
        plan_data_bits(BufReader::new(wordlist), wordlist_size)
    })
    .await??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }

    Ok(())
}

fn print_plan(plan: &DataBitsPlan) {
    println!("=========== {} bits data ===========", plan.data_bits);
    println!("+ inlines: {} ({:.02}%)", plan.inline.total(), 100.0 * plan.inline_ratio());
    for word_type in WordType::ALL {
        println!("\t+ {}: {}", word_type.name(), plan.inline.get(word_type));
    }
    println!("+ pointers: {}", plan.pointers.total());
    for word_type in WordType::ALL {
        println!("\t+ {}: {}", word_type.name(), plan.pointers.get(word_type));
    }
    println!("+ size (in bytes): {}", plan.index_size);
    println!("====================================");
}

pub async fn verify(args: VerifyArgs) -> Result<(), Error> {
    let mut reader = BufReader::new(open(&args.index)?);
    let check = tokio::task::spawn_blocking(move || verify_sorted(&mut reader)).await??;

    if args.stats {
        ensure_load_allocation(&args.index, args.yes)?;
        let path = args.index.clone();
        let index = tokio::task::spawn_blocking(move || LoadedIndex::open(path)).await??;
        print_summary(&IndexSummary::of(&index));
    }

    match check {
        SortCheck::Sorted { entries } => {
            println!("The index is sorted ({entries} entries).");
            Ok(())
        }
        SortCheck::Unsorted { index } => Err(Error::Unsorted { index }),
    }
}

fn print_summary(summary: &IndexSummary) {
    println!("+ hash: {}", summary.hash_name);
    println!("+ data bytes: {}", summary.data_bytes);
    println!("+ entries: {}", summary.entries);
    println!("+ inlines: {}", summary.inline.total());
    for word_type in WordType::ALL {
        println!("\t+ {}: {}", word_type.name(), summary.inline.get(word_type));
    }
    println!("+ pointers: {}", summary.pointers.total());
    for word_type in WordType::ALL {
        println!("\t+ {}: {}", word_type.name(), summary.pointers.get(word_type));
    }
    println!("+ overflow bytes: {}", summary.overflow_bytes);
}
