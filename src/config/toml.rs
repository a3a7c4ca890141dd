//! TOML job file parsing
//!
//! A job file mirrors [`Config`]:
//!
//! ```toml
//! [job]
//! kind = "words"
//! format = "csv"
//! strategy = "push"
//! input = "lyrics.csv"
//! output = "word_counts.csv"
//! skip_header = true
//!
//! [extract]
//! stopwords = { file = "stopwords.txt" }
//! key_length = { policy = "truncate", max_bytes = 64 }
//!
//! [output]
//! order = "by_count"
//! top = 20
//!
//! [runtime]
//! size = 4
//! ```

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Load the job file named on the command line (if any) and apply CLI flags
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, base)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Job
    if let Some(input) = &cli.input {
        config.job.input = input.clone();
    }
    if let Some(output) = &cli.output {
        config.job.output = output.clone();
    }
    if let Some(kind) = cli.count {
        config.job.kind = convert_count_kind(kind);
    }
    if let Some(format) = cli.format {
        config.job.format = convert_input_format(format);
    }
    if let Some(strategy) = cli.strategy {
        config.job.strategy = convert_strategy(strategy);
    }
    if cli.skip_header {
        config.job.skip_header = true;
    }

    // Extraction
    if cli.no_stopwords {
        config.extract.stopwords = StopwordSource::None;
    } else if let Some(path) = &cli.stopwords {
        config.extract.stopwords = StopwordSource::File(path.clone());
    }
    if let Some(policy) = cli.key_policy {
        config.extract.key_length = convert_key_policy(policy, cli.max_key_bytes)?;
    }
    if let Some(separator) = cli.separator {
        config.wire.separator = separator;
    }

    // Output
    if let Some(order) = cli.order {
        config.output.order = convert_order(order);
    }
    if let Some(top) = cli.top {
        config.output.top = top;
    }
    if let Some(path) = &cli.summary_json {
        config.output.summary_json = Some(path.clone());
    }

    // Runtime
    if let Some(size) = cli.size {
        config.runtime.size = size;
    }
    if let Some(addr) = &cli.coordinator {
        config.runtime.coordinator_addr = addr.clone();
    }
    if let Some(attempts) = cli.connect_attempts {
        config.runtime.connect_attempts = attempts;
    }
    if let Some(backoff) = cli.connect_backoff_ms {
        config.runtime.connect_backoff_ms = backoff;
    }

    Ok(config)
}
