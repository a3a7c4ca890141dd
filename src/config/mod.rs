//! Configuration module
//!
//! Handles CLI argument parsing, TOML job files, and validation.
//!
//! Only the coordinator needs a full [`Config`]. Workers are started with a
//! rank, the group size and the coordinator address; the job itself arrives
//! in the handshake.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::distributed::distributor::Strategy;
use crate::distributed::tcp::ConnectRetry;
use crate::distributed::wire::WireCodec;
use crate::extract::{KeyLengthPolicy, Stopwords};
use crate::input::InputFormat;
use crate::job::CountKind;
use crate::output::ReportOrder;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub wire: WireConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// What to count and where
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    /// Keys to count
    #[serde(default)]
    pub kind: CountKind,
    /// Corpus shape
    #[serde(default)]
    pub format: InputFormat,
    /// Work distribution strategy
    #[serde(default)]
    pub strategy: Strategy,
    /// Input corpus
    #[serde(default)]
    pub input: PathBuf,
    /// Report file
    #[serde(default)]
    pub output: PathBuf,
    /// Discard the first record of the input
    #[serde(default)]
    pub skip_header: bool,
}

/// Where stopwords come from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopwordSource {
    /// Built-in Portuguese/English list
    #[default]
    Builtin,
    /// No stopword filtering
    None,
    /// One word per line
    File(PathBuf),
}

impl StopwordSource {
    pub fn load(&self) -> Result<Stopwords> {
        match self {
            StopwordSource::Builtin => Ok(Stopwords::builtin()),
            StopwordSource::None => Ok(Stopwords::none()),
            StopwordSource::File(path) => Stopwords::from_file(path),
        }
    }
}

/// Key extraction settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default)]
    pub stopwords: StopwordSource,
    #[serde(default)]
    pub key_length: KeyLengthPolicy,
}

/// Wire format settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireConfig {
    /// Separator between key and count
    #[serde(default = "default_separator")]
    pub separator: char,
}

fn default_separator() -> char {
    '\t'
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
        }
    }
}

impl WireConfig {
    /// Separator as the single byte the codec works with
    pub fn separator_byte(&self) -> Result<u8> {
        let byte = u8::try_from(self.separator)
            .ok()
            .filter(u8::is_ascii)
            .with_context(|| format!("Wire separator must be a single ASCII character, got {:?}", self.separator))?;
        WireCodec::new(byte)?;
        Ok(byte)
    }
}

/// Report and summary settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Order of report lines
    #[serde(default)]
    pub order: ReportOrder,
    /// Print the N most frequent keys after the run (0 disables)
    #[serde(default)]
    pub top: usize,
    /// JSON run summary file
    pub summary_json: Option<PathBuf>,
}

/// Process group settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of participants, coordinator included
    #[serde(default = "default_size")]
    pub size: usize,
    /// Address the coordinator listens on and workers connect to
    #[serde(default = "default_coordinator_addr")]
    pub coordinator_addr: String,
    /// Worker connection attempts
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Pause between connection attempts (milliseconds)
    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,
}

fn default_size() -> usize {
    2
}

fn default_coordinator_addr() -> String {
    "127.0.0.1:7878".to_string()
}

fn default_connect_attempts() -> u32 {
    50
}

fn default_connect_backoff_ms() -> u64 {
    200
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            coordinator_addr: default_coordinator_addr(),
            connect_attempts: default_connect_attempts(),
            connect_backoff_ms: default_connect_backoff_ms(),
        }
    }
}

impl RuntimeConfig {
    pub fn connect_retry(&self) -> ConnectRetry {
        ConnectRetry {
            attempts: self.connect_attempts,
            backoff: Duration::from_millis(self.connect_backoff_ms),
        }
    }
}

impl fmt::Display for StopwordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopwordSource::Builtin => write!(f, "builtin"),
            StopwordSource::None => write!(f, "none"),
            StopwordSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Job:        {} ({})", self.job.kind.job_name(), self.job.kind.as_str())?;
        writeln!(f, "Input:      {} [{}]", self.job.input.display(), self.job.format.as_str())?;
        writeln!(f, "Output:     {}", self.job.output.display())?;
        writeln!(f, "Strategy:   {}", self.job.strategy.as_str())?;
        writeln!(f, "Stopwords:  {}", self.extract.stopwords)?;
        write!(f, "Procs:      {}", self.runtime.size)
    }
}
