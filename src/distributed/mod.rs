//! Distributed counting
//!
//! # Architecture
//!
//! A run has a fixed group of N ≥ 2 participants:
//!
//! - **Coordinator** (rank 0): distributes work or counts its own share,
//!   gathers every partial, merges them into the global table
//! - **Workers** (ranks 1..N): count their assigned units into a local table
//!   and contribute its encoding to the gather
//!
//! # Modules
//!
//! - `group`: process group trait and the in-process implementation
//! - `tcp`: TCP process group (one OS process per participant)
//! - `protocol`: message definitions and framing
//! - `wire`: line-oriented encoding of count tables
//! - `distributor`: push and partition work distribution
//! - `collective`: variable-length gather to the coordinator
//! - `coordinator`, `worker`: the two roles

pub mod collective;
pub mod coordinator;
pub mod distributor;
pub mod group;
pub mod protocol;
pub mod tcp;
pub mod wire;
pub mod worker;

pub use coordinator::{Coordinator, MergeOutcome};
pub use distributor::Strategy;
pub use group::{LocalGroup, ProcessGroup, COORDINATOR_RANK};
pub use protocol::{Message, TransportError, PROTOCOL_VERSION};
pub use tcp::{ConnectRetry, CoordinatorListener, TcpGroup};
pub use wire::{WireCodec, WireError};
pub use worker::{Worker, WorkerReport};

use crate::job::Job;
use anyhow::Result;
use tokio::task::JoinHandle;

/// Start every member of `members` as a worker task running `job`
///
/// Used for in-process runs, where rank 0 stays with the caller.
pub fn spawn_workers<I>(members: I, job: &Job) -> Vec<JoinHandle<Result<WorkerReport>>>
where
    I: IntoIterator<Item = LocalGroup>,
{
    members
        .into_iter()
        .map(|mut member| {
            let job = job.clone();
            tokio::spawn(async move { Worker::new(job).run(&mut member).await })
        })
        .collect()
}

/// Wait for the worker tasks of an in-process run
///
/// The caller drops rank 0's group first so a worker still waiting on it
/// wakes up. Rank 0's own error is returned ahead of any worker error.
pub async fn join_workers<T>(handles: Vec<JoinHandle<Result<WorkerReport>>>, root: Result<T>) -> Result<T> {
    let mut worker_err = None;
    for handle in handles {
        let result = match handle.await {
            Ok(result) => result.map(|_| ()),
            Err(join_err) => Err(join_err.into()),
        };
        if let Err(e) = result {
            worker_err.get_or_insert(e);
        }
    }

    let value = root?;
    match worker_err {
        Some(e) => Err(e),
        None => Ok(value),
    }
}
