//! Count record codec
//!
//! Partial count tables travel to the coordinator as plain text records:
//!
//! ```text
//! <key><SEP><count>\n
//! <key><SEP><count>\n
//! ...
//! ```
//!
//! The separator defaults to TAB. Decoding splits each line at its
//! **rightmost** separator, so a key may itself contain the separator; a key
//! may never contain a newline.
//!
//! Decoding is lossy: lines that cannot be parsed are dropped and
//! counted, never reported as errors. [`WireRecords::dropped`] exposes the
//! number of dropped lines.

use crate::stats::CountTable;
use std::io::Write;
use thiserror::Error;

/// Default field separator
pub const DEFAULT_SEPARATOR: u8 = b'\t';

/// Codec errors
#[derive(Debug, Error)]
pub enum WireError {
    #[error("key {0:?} contains a newline and cannot be encoded")]
    KeyContainsNewline(String),

    #[error("separator {0:?} is not usable (newline and ASCII digits are reserved)")]
    InvalidSeparator(char),
}

/// Text codec for count records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireCodec {
    separator: u8,
}

impl Default for WireCodec {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
        }
    }
}

impl WireCodec {
    /// Create a codec with a custom separator
    ///
    /// The separator must be a single ASCII byte other than a newline or a
    /// digit, otherwise the rightmost-separator rule becomes ambiguous.
    pub fn new(separator: u8) -> Result<Self, WireError> {
        if separator == b'\n' || separator == b'\r' || separator.is_ascii_digit() || !separator.is_ascii() {
            return Err(WireError::InvalidSeparator(separator as char));
        }
        Ok(Self { separator })
    }

    pub fn separator(&self) -> u8 {
        self.separator
    }

    /// Encode every entry of `table` into one contiguous buffer
    pub fn encode(&self, table: &CountTable) -> Result<Vec<u8>, WireError> {
        // Rough guess: short keys plus a few digits per line
        let mut buf = Vec::with_capacity(table.len() * 16);

        for (key, count) in table.iter() {
            if key.as_bytes().contains(&b'\n') {
                return Err(WireError::KeyContainsNewline(key.to_owned()));
            }
            buf.extend_from_slice(key.as_bytes());
            buf.push(self.separator);
            // Writing into a Vec cannot fail
            let _ = write!(buf, "{}", count);
            buf.push(b'\n');
        }

        Ok(buf)
    }

    /// Lazily decode records from `buf`
    pub fn decode<'a>(&self, buf: &'a [u8]) -> WireRecords<'a> {
        WireRecords {
            buf,
            pos: 0,
            separator: self.separator,
            dropped: 0,
        }
    }

    /// Decode `buf` and add every record to `table`
    ///
    /// Returns the number of dropped lines.
    pub fn decode_into(&self, buf: &[u8], table: &mut CountTable) -> u64 {
        let mut records = self.decode(buf);
        for (key, count) in records.by_ref() {
            table.increment(key, count);
        }
        records.dropped()
    }
}

/// Iterator over the valid records of an encoded buffer
#[derive(Debug)]
pub struct WireRecords<'a> {
    buf: &'a [u8],
    pos: usize,
    separator: u8,
    dropped: u64,
}

impl<'a> WireRecords<'a> {
    /// Lines dropped so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn parse_line(&self, line: &'a [u8]) -> Option<(&'a str, u64)> {
        let sep = line.iter().rposition(|&b| b == self.separator)?;
        let (key, rest) = (&line[..sep], &line[sep + 1..]);
        if key.is_empty() || rest.is_empty() || !rest.iter().all(u8::is_ascii_digit) {
            return None;
        }

        let key = std::str::from_utf8(key).ok()?;
        let count: u64 = std::str::from_utf8(rest).ok()?.parse().ok()?;
        if count == 0 {
            return None;
        }
        Some((key, count))
    }
}

impl<'a> Iterator for WireRecords<'a> {
    type Item = (&'a str, u64);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.buf.len() {
            let rest = &self.buf[self.pos..];
            let (line, advance) = match rest.iter().position(|&b| b == b'\n') {
                Some(nl) => (&rest[..nl], nl + 1),
                None => (rest, rest.len()),
            };
            self.pos += advance;

            if line.is_empty() {
                continue;
            }
            match self.parse_line(line) {
                Some(record) => return Some(record),
                None => self.dropped += 1,
            }
        }
        None
    }
}
