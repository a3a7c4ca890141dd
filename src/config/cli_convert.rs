//! CLI to Config conversion utilities

use crate::config::cli;
use crate::distributed::distributor::Strategy;
use crate::extract::KeyLengthPolicy;
use crate::input::InputFormat;
use crate::job::CountKind;
use crate::output::ReportOrder;
use anyhow::Result;

/// Default byte limit when a policy is given without --max-key-bytes
pub const DEFAULT_MAX_KEY_BYTES: usize = 4096;

/// Convert CLI CountKind to job CountKind
pub fn convert_count_kind(cli_kind: cli::CountKind) -> CountKind {
    match cli_kind {
        cli::CountKind::Words => CountKind::Words,
        cli::CountKind::Artists => CountKind::Artists,
    }
}

/// Convert CLI InputFormat to input InputFormat
pub fn convert_input_format(cli_format: cli::InputFormat) -> InputFormat {
    match cli_format {
        cli::InputFormat::Tsv => InputFormat::Tsv,
        cli::InputFormat::Csv => InputFormat::Csv,
    }
}

/// Convert CLI Strategy to distributor Strategy
pub fn convert_strategy(cli_strategy: cli::Strategy) -> Strategy {
    match cli_strategy {
        cli::Strategy::Push => Strategy::Push,
        cli::Strategy::Partition => Strategy::Partition,
    }
}

/// Convert CLI Order to ReportOrder
pub fn convert_order(cli_order: cli::Order) -> ReportOrder {
    match cli_order {
        cli::Order::Unordered => ReportOrder::Unordered,
        cli::Order::Count => ReportOrder::ByCount,
    }
}

/// Build a KeyLengthPolicy from --key-policy and --max-key-bytes
pub fn convert_key_policy(policy: cli::KeyPolicy, max_bytes: Option<usize>) -> Result<KeyLengthPolicy> {
    let max = max_bytes.unwrap_or(DEFAULT_MAX_KEY_BYTES);
    match policy {
        cli::KeyPolicy::Unlimited => {
            if max_bytes.is_some() {
                anyhow::bail!("--max-key-bytes has no effect with --key-policy unlimited");
            }
            Ok(KeyLengthPolicy::Unlimited)
        }
        cli::KeyPolicy::Truncate => Ok(KeyLengthPolicy::Truncate(max)),
        cli::KeyPolicy::Reject => Ok(KeyLengthPolicy::Reject(max)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_key_policy() {
        assert_eq!(
            convert_key_policy(cli::KeyPolicy::Truncate, Some(16)).unwrap(),
            KeyLengthPolicy::Truncate(16)
        );
        assert_eq!(
            convert_key_policy(cli::KeyPolicy::Reject, None).unwrap(),
            KeyLengthPolicy::Reject(DEFAULT_MAX_KEY_BYTES)
        );
        assert_eq!(
            convert_key_policy(cli::KeyPolicy::Unlimited, None).unwrap(),
            KeyLengthPolicy::Unlimited
        );
        assert!(convert_key_policy(cli::KeyPolicy::Unlimited, Some(8)).is_err());
    }

    #[test]
    fn test_convert_enums() {
        assert_eq!(convert_count_kind(cli::CountKind::Artists), CountKind::Artists);
        assert_eq!(convert_input_format(cli::InputFormat::Csv), InputFormat::Csv);
        assert_eq!(convert_strategy(cli::Strategy::Push), Strategy::Push);
        assert_eq!(convert_order(cli::Order::Count), ReportOrder::ByCount);
    }
}
