//! Terminal feedback: progress bars for the batch jobs and the allocation
//! prompt.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dehash_index::memory::confirm_allocation;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::Error;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";
const BYTES_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {pos} {msg}";

fn styled(bar: ProgressBar, template: &str) -> ProgressBar {
    match ProgressStyle::default_bar().template(template) {
        Ok(style) => bar.with_style(style.progress_chars("#>-")),
        Err(_) => bar,
    }
}

/// Bar counting items out of `total`; hidden when progress is disabled.
pub fn bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    styled(ProgressBar::new(total), BAR_TEMPLATE)
}

/// Bar counting bytes out of `total`.
pub fn bytes_bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    styled(ProgressBar::new(total), BYTES_TEMPLATE)
}

/// Counter with no known total.
pub fn spinner(message: &'static str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    styled(ProgressBar::new_spinner(), SPINNER_TEMPLATE).with_message(message)
}

/// Runs a blocking job on the blocking pool while a task mirrors the job's
/// counter into `bar`.
pub async fn run_counted<T, F>(bar: &ProgressBar, job: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce(&AtomicU64) -> Result<T, dehash_index::Error> + Send + 'static,
{
    let counter = Arc::new(AtomicU64::new(0));

    let progress_counter = Arc::clone(&counter);
    let progress_bar = bar.clone();
    let progress_task = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            progress_bar.set_position(progress_counter.load(Ordering::Relaxed));
        }
    });

    let job_counter = Arc::clone(&counter);
    let result = tokio::task::spawn_blocking(move || job(&job_counter)).await;

    progress_task.abort();
    bar.set_position(counter.load(Ordering::Relaxed));

    Ok(result??)
}

/// Prompts on the terminal unless `yes` was given.
pub fn ensure_allocation(bytes: u64, yes: bool) -> Result<(), Error> {
    approve_allocation(bytes, yes, &mut io::stdin().lock(), &mut io::stdout())
}

fn approve_allocation<R: BufRead, W: Write>(
    bytes: u64,
    yes: bool,
    input: &mut R,
    output: &mut W,
) -> Result<(), Error> {
    if yes || confirm_allocation(bytes, input, output)? {
        Ok(())
    } else {
        Err(Error::Aborted)
    }
}
