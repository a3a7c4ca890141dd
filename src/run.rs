//! Coordinator-side run driver
//!
//! Ties configuration, the merge engine and the outputs together:
//!
//! 1. [`prepare`]: validate the configuration, resolve the job, open the
//!    report's partial file. Any failure here happens before work starts.
//! 2. [`coordinate`]: run rank 0 over a formed process group, then commit the
//!    report, print the summary and write the optional JSON summary.

use crate::config::validator::validate_config;
use crate::config::Config;
use crate::distributed::coordinator::{Coordinator, MergeOutcome};
use crate::distributed::group::{LocalGroup, ProcessGroup};
use crate::distributed::{join_workers, spawn_workers};
use crate::job::{Job, JobSpec};
use crate::output::json::{write_summary, RunSummary};
use crate::output::text::{print_summary, print_top};
use crate::output::ReportWriter;
use crate::util::time::{calculate_rate, format_rate};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::info;

/// A validated run, ready for a process group
pub struct PreparedRun {
    config: Config,
    spec: JobSpec,
    report: ReportWriter,
}

impl PreparedRun {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The job handed to workers in the handshake
    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }
}

/// What a finished run produced
#[derive(Debug)]
pub struct RunResult {
    pub outcome: MergeOutcome,
    /// Key lines in the report
    pub report_lines: u64,
    pub elapsed: Duration,
}

/// Validate `config` and open the report
pub fn prepare(config: Config) -> Result<PreparedRun> {
    validate_config(&config).context("Configuration validation failed")?;
    let spec = JobSpec::from_config(&config)?;
    let report = ReportWriter::create(&config.job.output)?;

    Ok(PreparedRun { config, spec, report })
}

/// Run rank 0 and emit every output
pub async fn coordinate<G: ProcessGroup>(prepared: PreparedRun, group: &mut G) -> Result<RunResult> {
    let PreparedRun { config, spec, report } = prepared;
    if group.size() != config.runtime.size {
        anyhow::bail!(
            "Process group has {} participants, configuration expects {}",
            group.size(),
            config.runtime.size
        );
    }

    let start = Instant::now();
    let job = Job::new(spec.clone())?;
    let outcome = Coordinator::new(job).run(group).await?;

    let report_lines = report
        .commit(spec.kind.report_header(), &outcome.counts, config.output.order)
        .context("Failed to write report")?;
    let elapsed = start.elapsed();
    info!(path = %config.job.output.display(), lines = report_lines, "report written");
    info!(
        "{} units/s across {} participants",
        format_rate(calculate_rate(outcome.units, elapsed)),
        outcome.participants
    );

    print_summary(spec.kind.job_name(), outcome.units, outcome.participants, elapsed);
    if config.output.top > 0 {
        print_top(&outcome.counts, config.output.top);
    }

    if let Some(path) = &config.output.summary_json {
        let summary = RunSummary::new(&spec, &config.job.output, &outcome, elapsed);
        write_summary(path, &summary)?;
    }

    Ok(RunResult {
        outcome,
        report_lines,
        elapsed,
    })
}

/// Run every participant as a task of this process
pub async fn run_in_process(config: Config) -> Result<RunResult> {
    let prepared = prepare(config)?;

    let mut members = LocalGroup::create(prepared.config.runtime.size);
    // prepare() guarantees at least 2 members
    let workers = members.split_off(1);
    let mut root = members
        .pop()
        .ok_or_else(|| anyhow::anyhow!("Empty process group"))?;

    let job = Job::new(prepared.spec.clone())?;
    let handles = spawn_workers(workers, &job);
    let result = coordinate(prepared, &mut root).await;
    drop(root);

    join_workers(handles, result).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::distributor::Strategy;
    use crate::input::InputFormat;
    use crate::job::CountKind;
    use crate::output::ReportOrder;
    use std::fs;
    use std::path::Path;

    fn config_for(dir: &Path, contents: &str, size: usize) -> Config {
        let input = dir.join("songs.tsv");
        fs::write(&input, contents).unwrap();

        let mut config = Config::default();
        config.job.input = input;
        config.job.output = dir.join("report.csv");
        config.runtime.size = size;
        config
    }

    fn report_rows(path: &Path) -> (String, Vec<String>) {
        let contents = fs::read_to_string(path).unwrap();
        let mut lines = contents.lines().map(str::to_string);
        let header = lines.next().unwrap();
        let mut rows: Vec<String> = lines.collect();
        rows.sort();
        (header, rows)
    }

    #[tokio::test]
    async fn test_word_report_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), "alice\tlove love war\nbob\tpeace love\n", 3);
        let output = config.job.output.clone();

        let result = run_in_process(config).await.unwrap();
        assert_eq!(result.report_lines, 3);
        assert_eq!(result.outcome.units, 2);

        let (header, rows) = report_rows(&output);
        assert_eq!(header, "word;count");
        assert_eq!(rows, vec!["love;3", "peace;1", "war;1"]);
        assert!(!dir.path().join("report.csv.partial").exists());
    }

    #[tokio::test]
    async fn test_artist_report_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path(), "B\tx\nA\ty\nB\tz\n", 2);
        config.job.kind = CountKind::Artists;
        config.job.strategy = Strategy::Push;
        config.output.order = ReportOrder::ByCount;
        let output = config.job.output.clone();

        run_in_process(config).await.unwrap();
        assert_eq!(fs::read_to_string(output).unwrap(), "artist;num_songs\nB;2\nA;1\n");
    }

    #[tokio::test]
    async fn test_single_participant_leaves_no_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), "alice\tlove\n", 1);
        let output = config.job.output.clone();

        assert!(run_in_process(config).await.is_err());
        assert!(!output.exists());
        assert!(!dir.path().join("report.csv.partial").exists());
    }

    #[tokio::test]
    async fn test_unreadable_input_leaves_no_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path(), "", 2);
        config.job.input = dir.path().join("missing.tsv");
        let output = config.job.output.clone();

        assert!(run_in_process(config).await.is_err());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_json_summary_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path(), "a,s,l,\"love\nlove\"\n", 2);
        config.job.format = InputFormat::Csv;
        config.job.strategy = Strategy::Push;
        let summary = dir.path().join("summary.json");
        config.output.summary_json = Some(summary.clone());

        run_in_process(config).await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(summary).unwrap()).unwrap();
        assert_eq!(value["job"], "wordcount");
        assert_eq!(value["strategy"], "push");
        assert_eq!(value["units"], 1);
        assert_eq!(value["total_count"], 2);
    }

    #[tokio::test]
    async fn test_group_size_must_match_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), "alice\tlove\n", 3);
        let prepared = prepare(config).unwrap();

        let mut group = LocalGroup::create(2);
        assert!(coordinate(prepared, &mut group[0]).await.is_err());
        assert!(!dir.path().join("report.csv").exists());
    }
}
