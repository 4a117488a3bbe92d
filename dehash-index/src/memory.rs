//! Memory estimates for operations that hold a whole index in RAM, and the
//! operator confirmation shown before allocating it.

use std::fs::File;
use std::io::{self, BufRead, Write};

use crate::format::HEADER_SIZE;

pub const MIB: u64 = 1024 * 1024;

/// Bytes held in memory once the index in `file` is loaded for lookups.
pub fn load_memory_required(file: &File) -> io::Result<u64> {
    Ok(file.metadata()?.len().saturating_sub(HEADER_SIZE as u64))
}

/// Asks the operator to confirm allocating `bytes` of memory. Anything but an
/// answer starting with `y` or `Y` declines.
pub fn confirm_allocation<R: BufRead, W: Write>(
    bytes: u64,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    writeln!(
        output,
        "WARNING: This will allocate {} MiB of RAM. Do you want to continue? (y/N)",
        bytes / MIB
    )?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    Ok(matches!(answer.trim_start().as_bytes().first(), Some(b'y' | b'Y')))
}
