//! corpuscount - distributed key counting over text corpora
//!
//! corpuscount counts words (or songs per artist) in large line-oriented
//! corpora by splitting the work across a fixed group of participants and
//! merging their partial counts at a coordinator.
//!
//! # Architecture
//!
//! - **Key extraction**: ASCII-alphanumeric words, case-folded, stopwords removed
//! - **Local aggregation**: one hash table per participant
//! - **Wire codec**: `key<TAB>count` lines, gathered in one buffer at rank 0
//! - **Distribution**: dynamic push over TCP, or static index partitioning
//! - **Process groups**: TCP star for real runs, in-process channels for tests

pub mod config;
pub mod distributed;
pub mod extract;
pub mod input;
pub mod job;
pub mod logging;
pub mod output;
pub mod run;
pub mod stats;
pub mod util;

// Re-export commonly used types
pub use config::Config;
pub use job::{CountKind, Job, JobSpec};
pub use stats::CountTable;

/// Result type used throughout corpuscount
pub type Result<T> = anyhow::Result<T>;
