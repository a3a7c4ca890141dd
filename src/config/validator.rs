//! Configuration validation
//!
//! Everything here runs before the coordinator accepts workers or reads a
//! single unit, so a bad configuration never produces a report.

use super::*;
use crate::input;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_runtime(&config.runtime)?;
    validate_job(&config.job)?;
    validate_extract(&config.extract)?;
    validate_wire(&config.wire)?;
    validate_output(&config.output, &config.job)?;

    Ok(())
}

/// Validate process group settings
pub fn validate_runtime(runtime: &RuntimeConfig) -> Result<()> {
    if runtime.size < 2 {
        anyhow::bail!(
            "A run needs at least 2 participants (1 coordinator + workers), got {}",
            runtime.size
        );
    }

    if runtime.coordinator_addr.trim().is_empty() {
        anyhow::bail!("coordinator_addr must not be empty");
    }

    if runtime.connect_attempts == 0 {
        anyhow::bail!("connect_attempts must be greater than 0");
    }

    Ok(())
}

/// Validate the job: paths present, input readable
pub fn validate_job(job: &JobConfig) -> Result<()> {
    if job.input.as_os_str().is_empty() {
        anyhow::bail!("No input file specified");
    }
    if job.output.as_os_str().is_empty() {
        anyhow::bail!("No output file specified");
    }
    if job.input == job.output {
        anyhow::bail!("Output would overwrite the input: {}", job.input.display());
    }

    input::check_readable(&job.input)?;

    Ok(())
}

/// Validate extraction settings
pub fn validate_extract(extract: &ExtractConfig) -> Result<()> {
    match extract.key_length {
        KeyLengthPolicy::Truncate(0) | KeyLengthPolicy::Reject(0) => {
            anyhow::bail!("key length limit must be greater than 0");
        }
        _ => {}
    }

    if let StopwordSource::File(path) = &extract.stopwords {
        if !path.is_file() {
            anyhow::bail!("Stopword file not found: {}", path.display());
        }
    }

    Ok(())
}

/// Validate wire settings
pub fn validate_wire(wire: &WireConfig) -> Result<()> {
    wire.separator_byte()?;
    Ok(())
}

/// Validate output settings
pub fn validate_output(output: &OutputConfig, job: &JobConfig) -> Result<()> {
    if let Some(summary) = &output.summary_json {
        if summary == &job.output || summary == &job.input {
            anyhow::bail!("summary_json must differ from the input and output files");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> (Config, tempfile::NamedTempFile, tempfile::TempDir) {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        writeln!(input, "alice\tlove").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.job.input = input.path().to_path_buf();
        config.job.output = dir.path().join("out.csv");
        (config, input, dir)
    }

    #[test]
    fn test_valid_config() {
        let (config, _input, _dir) = valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_single_participant_rejected() {
        let (mut config, _input, _dir) = valid_config();
        config.runtime.size = 1;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("at least 2 participants"));

        config.runtime.size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_input_rejected() {
        let (mut config, _input, _dir) = valid_config();
        config.job.input = "/nonexistent/songs.tsv".into();
        assert!(validate_config(&config).is_err());

        config.job.input = PathBuf::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_output_same_as_input_rejected() {
        let (mut config, _input, _dir) = valid_config();
        config.job.output = config.job.input.clone();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_key_limit_rejected() {
        let (mut config, _input, _dir) = valid_config();
        config.extract.key_length = KeyLengthPolicy::Truncate(0);
        assert!(validate_config(&config).is_err());

        config.extract.key_length = KeyLengthPolicy::Unlimited;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_missing_stopword_file_rejected() {
        let (mut config, _input, _dir) = valid_config();
        config.extract.stopwords = StopwordSource::File("/nonexistent/stop.txt".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_bad_separator_rejected() {
        let (mut config, _input, _dir) = valid_config();
        config.wire.separator = '\r';
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_connect_attempts_rejected() {
        let mut runtime = RuntimeConfig::default();
        runtime.connect_attempts = 0;
        assert!(validate_runtime(&runtime).is_err());
    }
}
