use std::io::{BufRead, Read};

use crate::error::{Error, Result};

/// Longest word accepted from a wordlist, line terminator excluded.
pub const MAX_WORD_LEN: usize = 8191;

/// Reads a wordlist one line at a time, reusing a single buffer.
///
/// Lines end with `\n`; a trailing `\r` is dropped and the final line may omit
/// its terminator. A line longer than [`MAX_WORD_LEN`] aborts with
/// [`Error::LineTooLong`] without buffering the rest of it.
pub struct WordlistReader<R> {
    inner: R,
    buf: Vec<u8>,
    line: u64,
}

impl<R: BufRead> WordlistReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, buf: Vec::with_capacity(256), line: 0 }
    }

    pub fn next_word(&mut self) -> Result<Option<&[u8]>> {
        // Room for the longest word plus "\r\n".
        let limit = (MAX_WORD_LEN + 2) as u64;

        self.buf.clear();
        let read = self.inner.by_ref().take(limit).read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }
        self.line += 1;

        let mut end = self.buf.len();
        if self.buf[end - 1] == b'\n' {
            end -= 1;
        } else if read as u64 == limit {
            return Err(Error::LineTooLong { line: self.line, max: MAX_WORD_LEN });
        }
        if end > 0 && self.buf[end - 1] == b'\r' {
            end -= 1;
        }

        if end > MAX_WORD_LEN {
            return Err(Error::LineTooLong { line: self.line, max: MAX_WORD_LEN });
        }

        Ok(Some(&self.buf[..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut reader = WordlistReader::new(input);
        let mut words = Vec::new();
        while let Some(word) = reader.next_word()? {
            words.push(word.to_vec());
        }
        Ok(words)
    }

    #[test]
    fn test_line_endings() {
        let words = collect(b"abc\r\n123\n\nlast").unwrap();
        assert_eq!(words, vec![b"abc".to_vec(), b"123".to_vec(), Vec::new(), b"last".to_vec()]);
    }

    #[test]
    fn test_embedded_bytes_are_kept() {
        let words = collect(b"a\rb\na\0b\n").unwrap();
        assert_eq!(words, vec![b"a\rb".to_vec(), b"a\0b".to_vec()]);
    }

    #[test]
    fn test_longest_word() {
        let mut input = vec![b'x'; MAX_WORD_LEN];
        input.extend_from_slice(b"\r\n");
        input.extend_from_slice(&[b'y'; MAX_WORD_LEN]);

        let words = collect(&input).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].len(), MAX_WORD_LEN);
        assert_eq!(words[1].len(), MAX_WORD_LEN);
    }

    #[test]
    fn test_line_too_long() {
        let mut input = b"ok\n".to_vec();
        input.extend_from_slice(&[b'x'; MAX_WORD_LEN + 1]);
        input.push(b'\n');

        let mut reader = WordlistReader::new(input.as_slice());
        assert_eq!(reader.next_word().unwrap(), Some(&b"ok"[..]));
        assert!(matches!(reader.next_word(), Err(Error::LineTooLong { line: 2, .. })));

        let huge = vec![b'x'; MAX_WORD_LEN * 4];
        assert!(matches!(collect(&huge), Err(Error::LineTooLong { line: 1, .. })));
    }
}
