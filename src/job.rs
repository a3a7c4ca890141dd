//! Counting jobs
//!
//! A [`JobSpec`] is the serializable description of a run: what to count,
//! how the input is shaped, and how units are distributed. The coordinator
//! builds it from configuration and hands it to every worker in the
//! handshake. A [`Job`] is the spec prepared for counting on one participant.

use crate::config::Config;
use crate::distributed::distributor::{Partitioned, Strategy};
use crate::distributed::wire::{WireCodec, DEFAULT_SEPARATOR};
use crate::extract::{KeyExtractor, KeyLengthPolicy, Stopwords};
use crate::input::{self, InputFormat, Units};
use crate::stats::CountTable;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountKind {
    /// Words of the text field
    #[default]
    Words,
    /// One per record, keyed by the artist field
    Artists,
}

impl CountKind {
    /// First line of the report
    pub fn report_header(&self) -> &'static str {
        match self {
            CountKind::Words => "word;count",
            CountKind::Artists => "artist;num_songs",
        }
    }

    /// Tag of the summary line
    pub fn job_name(&self) -> &'static str {
        match self {
            CountKind::Words => "wordcount",
            CountKind::Artists => "artistcount",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CountKind::Words => "words",
            CountKind::Artists => "artists",
        }
    }
}

/// Job shared by every participant of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub kind: CountKind,
    pub format: InputFormat,
    pub strategy: Strategy,
    pub input: PathBuf,
    pub skip_header: bool,
    /// Resolved stopword list (already loaded from any file)
    pub stopwords: Vec<String>,
    pub key_length: KeyLengthPolicy,
    /// Wire record separator byte
    pub separator: u8,
}

impl Default for JobSpec {
    fn default() -> Self {
        Self {
            kind: CountKind::default(),
            format: InputFormat::default(),
            strategy: Strategy::default(),
            input: PathBuf::new(),
            skip_header: false,
            stopwords: Stopwords::builtin().to_sorted_vec(),
            key_length: KeyLengthPolicy::default(),
            separator: DEFAULT_SEPARATOR,
        }
    }
}

impl JobSpec {
    /// Build the job from a validated configuration
    ///
    /// Loads the stopword file, if one is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let stopwords = config.extract.stopwords.load()?;

        Ok(Self {
            kind: config.job.kind,
            format: config.job.format,
            strategy: config.job.strategy,
            input: config.job.input.clone(),
            skip_header: config.job.skip_header,
            stopwords: stopwords.to_sorted_vec(),
            key_length: config.extract.key_length,
            separator: config.wire.separator_byte()?,
        })
    }
}

/// Units counted by one participant
#[derive(Debug, Clone, Default)]
pub struct LocalCount {
    pub table: CountTable,
    /// Units read from the input, whoever owns them
    pub seen: u64,
    /// Units this participant processed
    pub processed: u64,
    /// Processed units that did not parse
    pub malformed: u64,
}

impl LocalCount {
    pub fn new() -> Self {
        Self {
            table: CountTable::local(),
            ..Default::default()
        }
    }
}

/// A job prepared for counting
#[derive(Debug, Clone)]
pub struct Job {
    spec: JobSpec,
    extractor: KeyExtractor,
    codec: WireCodec,
}

impl Job {
    pub fn new(spec: JobSpec) -> Result<Self> {
        let stopwords = Stopwords::from_words(spec.stopwords.iter().map(String::as_str));
        let extractor = KeyExtractor::new(stopwords).with_length_policy(spec.key_length);
        let codec = WireCodec::new(spec.separator).context("Invalid wire separator")?;

        Ok(Self {
            spec,
            extractor,
            codec,
        })
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn codec(&self) -> &WireCodec {
        &self.codec
    }

    pub fn extractor(&self) -> &KeyExtractor {
        &self.extractor
    }

    /// Open the input as work units
    pub fn open_units(&self) -> Result<Units> {
        input::open_units(&self.spec.input, self.spec.format, self.spec.skip_header)
    }

    /// Extract the keys of one unit into `count`
    ///
    /// A unit that does not parse is counted as processed and malformed and
    /// adds no keys.
    pub fn count_unit(&self, unit: &str, count: &mut LocalCount) {
        count.processed += 1;

        let Some(record) = self.spec.format.parse(unit) else {
            count.malformed += 1;
            return;
        };

        match self.spec.kind {
            CountKind::Words => {
                for key in self.extractor.words(record.text) {
                    count.table.increment(&key, 1);
                }
            }
            CountKind::Artists => {
                if let Some(artist) = self.extractor.artist(record.artist) {
                    count.table.increment(artist, 1);
                }
            }
        }
    }

    /// Count the units `rank` owns under static partitioning
    pub fn count_partition(&self, rank: usize, size: usize) -> Result<LocalCount> {
        let mut count = LocalCount::new();
        let mut units = Partitioned::new(self.open_units()?, rank, size);

        for unit in units.by_ref() {
            let unit = unit.with_context(|| format!("Failed to read {}", self.spec.input.display()))?;
            self.count_unit(&unit, &mut count);
        }

        count.seen = units.seen();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn job_for(contents: &str, kind: CountKind, format: InputFormat) -> (Job, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let spec = JobSpec {
            kind,
            format,
            input: file.path().to_path_buf(),
            ..Default::default()
        };
        (Job::new(spec).unwrap(), file)
    }

    #[test]
    fn test_report_headers() {
        assert_eq!(CountKind::Words.report_header(), "word;count");
        assert_eq!(CountKind::Artists.report_header(), "artist;num_songs");
    }

    #[test]
    fn test_count_words_unit() {
        let (job, _file) = job_for("", CountKind::Words, InputFormat::Tsv);
        let mut count = LocalCount::new();
        job.count_unit("alice\tThe love, LOVE and war", &mut count);

        assert_eq!(count.processed, 1);
        assert_eq!(count.table.get("love"), Some(2));
        assert_eq!(count.table.get("war"), Some(1));
        assert_eq!(count.table.get("the"), None);
        assert_eq!(count.table.get("alice"), None);
    }

    #[test]
    fn test_count_artist_unit() {
        let (job, _file) = job_for("", CountKind::Artists, InputFormat::Tsv);
        let mut count = LocalCount::new();
        job.count_unit("Elis Regina\tsome words", &mut count);
        job.count_unit("Elis Regina\tother words", &mut count);

        assert_eq!(count.table.get("Elis Regina"), Some(2));
        assert_eq!(count.table.len(), 1);
    }

    #[test]
    fn test_malformed_unit_counted_but_skipped() {
        let (job, _file) = job_for("", CountKind::Words, InputFormat::Tsv);
        let mut count = LocalCount::new();
        job.count_unit("onlyonecolumn", &mut count);

        assert_eq!(count.processed, 1);
        assert_eq!(count.malformed, 1);
        assert!(count.table.is_empty());
    }

    #[test]
    fn test_count_partition_covers_input() {
        let (job, _file) = job_for(
            "alice\tlove love war\nbob\tpeace love\ncarol\twar\n",
            CountKind::Words,
            InputFormat::Tsv,
        );

        let mut merged = CountTable::global();
        let mut processed = 0;
        for rank in 0..2 {
            let count = job.count_partition(rank, 2).unwrap();
            assert_eq!(count.seen, 3);
            processed += count.processed;
            for (key, n) in count.table.iter() {
                merged.increment(key, n);
            }
        }

        assert_eq!(processed, 3);
        assert_eq!(merged.get("love"), Some(3));
        assert_eq!(merged.get("war"), Some(2));
        assert_eq!(merged.get("peace"), Some(1));
    }

    #[test]
    fn test_count_partition_csv_blocks() {
        let (job, _file) = job_for(
            "artist,song,link,text\nA,s,l,\"Love\nlove\"\nB,s,l,\"war\"\n",
            CountKind::Words,
            InputFormat::Csv,
        );

        let count = job.count_partition(0, 1).unwrap();
        assert_eq!(count.seen, 3);
        assert_eq!(count.malformed, 1);
        assert_eq!(count.table.get("love"), Some(2));
        assert_eq!(count.table.get("war"), Some(1));
    }

    #[test]
    fn test_invalid_separator_rejected() {
        let spec = JobSpec {
            separator: b'\n',
            ..Default::default()
        };
        assert!(Job::new(spec).is_err());
    }
}
