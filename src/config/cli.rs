//! CLI argument parsing using clap

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Launch (default) - start N-1 local workers and act as rank 0
    Launch,
    /// Coordinator mode - rank 0, waits for workers to connect
    Coordinator,
    /// Worker mode - rank >= 1, counts whatever the coordinator hands out
    Worker,
    /// Local mode - every participant as a task of one process, no sockets
    Local,
}

/// corpuscount - distributed word and artist counting
#[derive(Parser, Debug)]
#[command(name = "corpuscount")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: launch, coordinator, worker, or local
    #[arg(long, value_enum, default_value = "launch")]
    pub mode: ExecutionMode,

    /// This participant's rank (worker mode only)
    #[arg(long, env = "CORPUSCOUNT_RANK")]
    pub rank: Option<usize>,

    /// Number of participants, coordinator included (at least 2)
    #[arg(short = 'n', long = "procs", env = "CORPUSCOUNT_SIZE")]
    pub size: Option<usize>,

    /// Coordinator address (host:port)
    #[arg(long, env = "CORPUSCOUNT_COORDINATOR")]
    pub coordinator: Option<String>,

    /// Input corpus
    ///
    /// Not required in worker mode (coordinator sends the job)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Report file
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// TOML job file (CLI flags take precedence)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    // === Job Options ===
    /// Keys to count
    #[arg(long, value_enum)]
    pub count: Option<CountKind>,

    /// Input format
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<InputFormat>,

    /// Work distribution strategy
    #[arg(short = 's', long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Discard the first record of the input
    #[arg(long)]
    pub skip_header: bool,

    // === Extraction Options ===
    /// Stopword file (one word per line, # comments)
    #[arg(long, conflicts_with = "no_stopwords")]
    pub stopwords: Option<PathBuf>,

    /// Disable stopword filtering
    #[arg(long)]
    pub no_stopwords: bool,

    /// What to do with oversized keys
    #[arg(long, value_enum)]
    pub key_policy: Option<KeyPolicy>,

    /// Byte limit for --key-policy truncate/reject
    #[arg(long)]
    pub max_key_bytes: Option<usize>,

    /// Separator between key and count on the wire
    #[arg(long)]
    pub separator: Option<char>,

    // === Output Options ===
    /// Order of report lines
    #[arg(long, value_enum)]
    pub order: Option<Order>,

    /// Print the N most frequent keys after the run
    #[arg(long)]
    pub top: Option<usize>,

    /// Write a JSON run summary to this file
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    // === Runtime Options ===
    /// Worker connection attempts
    #[arg(long)]
    pub connect_attempts: Option<u32>,

    /// Pause between connection attempts (milliseconds)
    #[arg(long)]
    pub connect_backoff_ms: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Keys to count
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CountKind {
    /// Words of the text field
    Words,
    /// Songs per artist
    Artists,
}

/// Input format
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum InputFormat {
    /// artist<TAB>text, one record per line
    Tsv,
    /// artist,song,link,"TEXT" with multi-line text
    Csv,
}

/// Work distribution strategy
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Strategy {
    /// Coordinator streams units to workers round-robin
    Push,
    /// Every participant keeps index % N == rank
    Partition,
}

/// Oversized key handling
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KeyPolicy {
    /// Keep keys of any length
    Unlimited,
    /// Cut keys to --max-key-bytes
    Truncate,
    /// Drop keys longer than --max-key-bytes
    Reject,
}

/// Report ordering
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Order {
    /// Table order (fastest)
    Unordered,
    /// Count descending, then key ascending
    Count,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mode == ExecutionMode::Worker {
            match self.rank {
                None => anyhow::bail!("worker mode requires --rank"),
                Some(0) => anyhow::bail!("rank 0 is the coordinator; workers use ranks 1..N"),
                Some(_) => {}
            }
            if self.size.is_none() {
                anyhow::bail!("worker mode requires --procs");
            }
            if self.coordinator.is_none() {
                anyhow::bail!("worker mode requires --coordinator");
            }
            // The coordinator sends the job
            return Ok(());
        }

        if self.rank.is_some_and(|rank| rank != 0) {
            anyhow::bail!("--rank is only valid in worker mode");
        }

        if self.config.is_none() {
            if self.input.is_none() {
                anyhow::bail!("must specify an input file (or --config)");
            }
            if self.output.is_none() {
                anyhow::bail!("must specify --output (or --config)");
            }
        }

        if self.max_key_bytes.is_some() && matches!(self.key_policy, None | Some(KeyPolicy::Unlimited)) {
            anyhow::bail!("--max-key-bytes requires --key-policy truncate or reject");
        }

        Ok(())
    }
}
