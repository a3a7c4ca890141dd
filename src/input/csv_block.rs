//! Multi-line CSV record reassembly
//!
//! Records look like `artist,song,link,"TEXT"`. The first three fields hold
//! no commas; the text field starts at the first double quote after the third
//! comma and may contain newlines. Inside the text, `""` is an escaped quote;
//! any other `"` closes the field.
//!
//! A line that does not open a quoted text field is returned on its own as a
//! unit (it will fail to parse and be skipped). A text field still open at end
//! of input is returned as-is.

use super::{trim_line_end, WorkUnit};
use std::io::{self, BufRead};

/// Byte offset just past the opening quote of the text field
pub(crate) fn text_start(unit: &str) -> Option<usize> {
    let bytes = unit.as_bytes();
    let mut commas = 0;
    let mut i = 0;
    while i < bytes.len() && commas < 3 {
        if bytes[i] == b',' {
            commas += 1;
        }
        i += 1;
    }
    if commas < 3 {
        return None;
    }
    let quote = bytes[i..].iter().position(|&b| b == b'"')?;
    Some(i + quote + 1)
}

/// Offset of the closing quote in `text` (which starts after the opening one)
pub(crate) fn closing_quote(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Reassembles quoted multi-line records into single work units
///
/// The partially built record lives in `record`; [`start_record`](Self::start_record)
/// clears it before each record so nothing carries over between calls.
pub struct CsvBlockReader<R> {
    reader: R,
    record: String,
    line: Vec<u8>,
}

impl<R: BufRead> CsvBlockReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            record: String::with_capacity(1 << 16),
            line: Vec::with_capacity(1 << 14),
        }
    }

    /// Reset the accumulator for a new record
    pub fn start_record(&mut self) {
        self.record.clear();
    }

    /// Append the next physical line to the accumulator
    ///
    /// Returns false at end of input.
    fn append_line(&mut self) -> io::Result<bool> {
        self.line.clear();
        if self.reader.read_until(b'\n', &mut self.line)? == 0 {
            return Ok(false);
        }
        self.record.push_str(&String::from_utf8_lossy(&self.line));
        Ok(true)
    }

    fn read_record(&mut self) -> io::Result<Option<WorkUnit>> {
        self.start_record();
        if !self.append_line()? {
            return Ok(None);
        }

        if let Some(open) = text_start(&self.record) {
            let mut scan_from = open;
            // Keep pulling lines while the quoted text is still open
            while closing_quote(&self.record[scan_from..]).is_none() {
                // A line always ends in '\n', so no escape pair straddles lines
                scan_from = self.record.len();
                if !self.append_line()? {
                    break;
                }
            }
        }

        let mut unit = self.record.clone();
        trim_line_end(&mut unit);
        Ok(Some(unit))
    }
}

impl<R: BufRead> Iterator for CsvBlockReader<R> {
    type Item = io::Result<WorkUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputFormat;
    use std::io::Cursor;

    fn read_all(input: &str) -> Vec<String> {
        CsvBlockReader::new(Cursor::new(input.as_bytes().to_vec()))
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_text_start() {
        assert_eq!(text_start("a,b,c,\"xyz\""), Some(7));
        assert_eq!(text_start("a,b,c, \"xyz\""), Some(8));
        assert_eq!(text_start("a,b,\"xyz\""), None);
        assert_eq!(text_start("a,b,c,xyz"), None);
    }

    #[test]
    fn test_closing_quote_skips_escapes() {
        assert_eq!(closing_quote("say \"\"hi\"\" now\" rest"), Some(14));
        assert_eq!(closing_quote("no quote"), None);
    }

    #[test]
    fn test_single_line_records() {
        let units = read_all("A,s1,l1,\"one\"\nB,s2,l2,\"two\"\n");
        assert_eq!(units, vec!["A,s1,l1,\"one\"", "B,s2,l2,\"two\""]);
    }

    #[test]
    fn test_multi_line_record_reassembled() {
        let units = read_all("A,s,l,\"first\nsecond\nthird\"\nB,s,l,\"x\"\n");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0], "A,s,l,\"first\nsecond\nthird\"");

        let record = InputFormat::Csv.parse(&units[0]).unwrap();
        assert_eq!(record.artist, "A");
        assert_eq!(record.text, "first\nsecond\nthird");
    }

    #[test]
    fn test_escaped_quote_does_not_close() {
        let units = read_all("A,s,l,\"he said \"\"go\"\"\nnow\"\nB,s,l,\"x\"\n");
        assert_eq!(units.len(), 2);
        assert!(units[0].ends_with("now\""));
    }

    #[test]
    fn test_header_line_is_its_own_unit() {
        let units = read_all("artist,song,link,text\nA,s,l,\"x\"\n");
        assert_eq!(units, vec!["artist,song,link,text", "A,s,l,\"x\""]);
        assert!(InputFormat::Csv.parse(&units[0]).is_none());
    }

    #[test]
    fn test_unterminated_record_at_eof() {
        let units = read_all("A,s,l,\"never\nclosed\n");
        assert_eq!(units, vec!["A,s,l,\"never\nclosed"]);
    }

    #[test]
    fn test_no_state_leaks_between_records() {
        let mut reader = CsvBlockReader::new(Cursor::new(b"A,s,l,\"a\nb\"\nC,s,l,\"c\"\n".to_vec()));
        let first = reader.next().unwrap().unwrap();
        let second = reader.next().unwrap().unwrap();
        assert_eq!(first, "A,s,l,\"a\nb\"");
        assert_eq!(second, "C,s,l,\"c\"");
        assert!(reader.next().is_none());
    }
}
