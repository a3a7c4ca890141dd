//! Report file
//!
//! The report is a two-column, semicolon-separated file: a header line, then
//! one `<key>;<count>` line per key.
//!
//! The file is written to a `.partial` sibling first and renamed into place
//! once complete. The partial file is opened when the writer is created, so an
//! unwritable destination fails before any counting starts; a writer dropped
//! without committing removes it, so an aborted run leaves no report behind.

use crate::stats::CountTable;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Order of report lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOrder {
    /// Table iteration order
    #[default]
    Unordered,
    /// Count descending, then key ascending
    ByCount,
}

/// Report under construction
pub struct ReportWriter {
    path: PathBuf,
    partial_path: PathBuf,
    file: Option<File>,
}

impl ReportWriter {
    /// Open the partial file next to `path`
    pub fn create(path: &Path) -> Result<Self> {
        let partial_path = partial_path(path);
        let file = File::create(&partial_path)
            .with_context(|| format!("Output path not writable: {}", path.display()))?;
        debug!(partial = %partial_path.display(), "report opened");

        Ok(Self {
            path: path.to_path_buf(),
            partial_path,
            file: Some(file),
        })
    }

    /// Final report location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every entry of `counts` and move the report into place
    ///
    /// Returns the number of key lines written.
    pub fn commit(mut self, header: &str, counts: &CountTable, order: ReportOrder) -> Result<u64> {
        let file = self
            .file
            .take()
            .context("Report already committed")?;
        let mut out = BufWriter::with_capacity(1 << 16, file);

        writeln!(out, "{}", header)?;
        let mut lines = 0u64;
        match order {
            ReportOrder::Unordered => {
                for (key, count) in counts.iter() {
                    writeln!(out, "{};{}", key, count)?;
                    lines += 1;
                }
            }
            ReportOrder::ByCount => {
                for (key, count) in counts.sorted_by_count() {
                    writeln!(out, "{};{}", key, count)?;
                    lines += 1;
                }
            }
        }

        let file = out
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("Failed to write report: {}", self.partial_path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync report: {}", self.partial_path.display()))?;
        drop(file);

        fs::rename(&self.partial_path, &self.path).with_context(|| {
            format!(
                "Failed to move {} to {}",
                self.partial_path.display(),
                self.path.display()
            )
        })?;

        // Renamed: nothing left for Drop to clean up
        self.partial_path.clear();
        Ok(lines)
    }
}

impl Drop for ReportWriter {
    fn drop(&mut self) {
        if self.partial_path.as_os_str().is_empty() {
            return;
        }
        self.file.take();
        if let Err(e) = fs::remove_file(&self.partial_path) {
            debug!(partial = %self.partial_path.display(), error = %e, "could not remove partial report");
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CountTable {
        let mut table = CountTable::global();
        table.increment("love", 3);
        table.increment("war", 1);
        table.increment("peace", 1);
        table
    }

    #[test]
    fn test_report_written_and_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let writer = ReportWriter::create(&path).unwrap();
        assert!(dir.path().join("report.csv.partial").exists());
        assert!(!path.exists());

        let lines = writer.commit("word;count", &sample(), ReportOrder::Unordered).unwrap();
        assert_eq!(lines, 3);
        assert!(!dir.path().join("report.csv.partial").exists());

        let contents = fs::read_to_string(&path).unwrap();
        let mut rows: Vec<&str> = contents.lines().collect();
        assert_eq!(rows.remove(0), "word;count");
        rows.sort();
        assert_eq!(rows, vec!["love;3", "peace;1", "war;1"]);
    }

    #[test]
    fn test_report_sorted_by_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artists.csv");

        ReportWriter::create(&path)
            .unwrap()
            .commit("artist;num_songs", &sample(), ReportOrder::ByCount)
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "artist;num_songs\nlove;3\npeace;1\nwar;1\n");
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        let lines = ReportWriter::create(&path)
            .unwrap()
            .commit("word;count", &CountTable::global(), ReportOrder::Unordered)
            .unwrap();
        assert_eq!(lines, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "word;count\n");
    }

    #[test]
    fn test_dropped_writer_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let writer = ReportWriter::create(&path).unwrap();
        drop(writer);

        assert!(!path.exists());
        assert!(!dir.path().join("report.csv.partial").exists());
    }

    #[test]
    fn test_unwritable_destination_fails_early() {
        let result = ReportWriter::create(Path::new("/nonexistent/dir/report.csv"));
        assert!(result.is_err());
    }
}
