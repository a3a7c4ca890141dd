//! One unit per physical line

use super::{trim_line_end, WorkUnit};
use std::io::{self, BufRead};

/// Reads one work unit per line, without the line terminator
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected; they end
/// up as key boundaries during extraction.
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(4096),
        }
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = io::Result<WorkUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let mut line = String::from_utf8_lossy(&self.buf).into_owned();
                trim_line_end(&mut line);
                Some(Ok(line))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
