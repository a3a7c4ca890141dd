//! Input corpora
//!
//! A corpus is read as a sequence of work units. Two shapes are supported:
//!
//! - **TSV**: `artist<TAB>text`, one unit per physical line
//! - **CSV**: `artist,song,link,"TEXT"`, where the quoted text may span
//!   several physical lines; one unit per reassembled record
//!
//! Readers only decide where a unit ends. Splitting a unit into its artist and
//! text fields is [`InputFormat::parse`], which runs on whichever participant
//! the unit is assigned to. A unit that does not parse is malformed; callers
//! skip it but still count it.

pub mod csv_block;
pub mod lines;

pub use csv_block::CsvBlockReader;
pub use lines::LineReader;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// One indivisible input item
pub type WorkUnit = String;

/// Boxed stream of work units
pub type Units = Box<dyn Iterator<Item = io::Result<WorkUnit>> + Send>;

/// Corpus shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// `artist<TAB>text`, one record per line
    #[default]
    Tsv,
    /// `artist,song,link,"TEXT"` with multi-line quoted text
    Csv,
}

/// Fields of one parsed work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub artist: &'a str,
    pub text: &'a str,
}

impl InputFormat {
    /// Split a work unit into its fields
    ///
    /// Returns `None` for a malformed unit (missing field separator).
    pub fn parse<'a>(&self, unit: &'a str) -> Option<Record<'a>> {
        match self {
            InputFormat::Tsv => {
                let (artist, text) = unit.split_once('\t')?;
                Some(Record { artist, text })
            }
            InputFormat::Csv => {
                let artist_end = unit.find(',')?;
                let open = csv_block::text_start(unit)?;
                let rest = &unit[open..];
                let text = match csv_block::closing_quote(rest) {
                    Some(close) => &rest[..close],
                    None => rest,
                };
                Some(Record {
                    artist: &unit[..artist_end],
                    text,
                })
            }
        }
    }

    /// Wrap a buffered reader in the unit reader for this format
    pub fn units<R>(&self, reader: R) -> Units
    where
        R: io::BufRead + Send + 'static,
    {
        match self {
            InputFormat::Tsv => Box::new(LineReader::new(reader)),
            InputFormat::Csv => Box::new(CsvBlockReader::new(reader)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Tsv => "tsv",
            InputFormat::Csv => "csv",
        }
    }
}

/// Open `path` and read it as units of `format`
///
/// With `skip_header`, the first unit is discarded before anything sees it.
pub fn open_units(path: &Path, format: InputFormat, skip_header: bool) -> Result<Units> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let units = format.units(BufReader::new(file));

    Ok(if skip_header {
        Box::new(units.skip(1))
    } else {
        units
    })
}

/// Fail early when `path` cannot be read
pub fn check_readable(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Input file not accessible: {}", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("Input path is not a regular file: {}", path.display());
    }
    File::open(path).with_context(|| format!("Input file not readable: {}", path.display()))?;
    Ok(())
}

/// Strip one trailing `\n` (and a `\r` before it)
pub(crate) fn trim_line_end(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}
