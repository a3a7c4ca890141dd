//! JSON run summary
//!
//! A machine-readable companion to the one-line console summary: what ran,
//! how much it read, what the merge produced, and what each participant
//! contributed.

use crate::distributed::coordinator::MergeOutcome;
use crate::job::JobSpec;
use crate::stats::aggregator::Contribution;
use crate::util::time::{calculate_rate, format_duration};
use crate::Result;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: format_duration(d),
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub job: String,
    pub kind: String,
    pub format: String,
    pub strategy: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub units: u64,
    pub procs: usize,
    pub distinct_keys: usize,
    pub total_count: u64,
    pub dropped_wire_records: u64,
    pub units_per_sec: f64,
    pub elapsed: JsonDuration,
    /// RFC 3339, UTC
    pub finished_at: String,
    pub contributions: Vec<Contribution>,
}

impl RunSummary {
    pub fn new(spec: &JobSpec, output: &Path, outcome: &MergeOutcome, elapsed: Duration) -> Self {
        Self {
            job: spec.kind.job_name().to_string(),
            kind: spec.kind.as_str().to_string(),
            format: spec.format.as_str().to_string(),
            strategy: spec.strategy.as_str().to_string(),
            input: spec.input.clone(),
            output: output.to_path_buf(),
            units: outcome.units,
            procs: outcome.participants,
            distinct_keys: outcome.counts.len(),
            total_count: outcome.counts.total(),
            dropped_wire_records: outcome.dropped,
            units_per_sec: calculate_rate(outcome.units, elapsed),
            elapsed: JsonDuration::from_duration(elapsed),
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            contributions: outcome.contributions.clone(),
        }
    }
}

/// Write the summary as pretty-printed JSON
pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create summary file: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("Failed to write summary file: {}", path.display()))?;
    Ok(())
}
