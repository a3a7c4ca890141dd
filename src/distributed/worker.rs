//! Worker participant
//!
//! Runs on every rank other than 0. A worker counts the units it is assigned
//! (received from the coordinator under push, or selected from the input
//! under partition), encodes its table once, and hands it to the gather.
//!
//! A worker that fails before the gather tells the coordinator with an ERROR
//! message so the whole run aborts with the cause.

use crate::distributed::collective::gather_partials;
use crate::distributed::distributor::{receive_units, Strategy};
use crate::distributed::group::{ProcessGroup, COORDINATOR_RANK};
use crate::distributed::protocol::{ErrorMessage, Message};
use crate::job::{Job, LocalCount};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// What one worker did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub rank: usize,
    /// Units this worker processed
    pub processed: u64,
    /// Processed units that did not parse
    pub malformed: u64,
    /// Distinct keys in the local table
    pub keys: usize,
    /// Encoded partial size
    pub bytes: u64,
}

/// Rank ≥ 1 of a run
pub struct Worker {
    job: Job,
}

impl Worker {
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    /// Count the assigned units and contribute the partial
    pub async fn run<G: ProcessGroup>(&self, group: &mut G) -> Result<WorkerReport> {
        let rank = group.rank();
        if rank == COORDINATOR_RANK {
            anyhow::bail!("Worker cannot run as rank {}", COORDINATOR_RANK);
        }

        let (local, payload) = match self.local_phase(group).await {
            Ok(result) => result,
            Err(e) => {
                report_failure(group, &e).await;
                return Err(e);
            }
        };

        let report = WorkerReport {
            rank,
            processed: local.processed,
            malformed: local.malformed,
            keys: local.table.len(),
            bytes: payload.len() as u64,
        };
        drop(local);

        gather_partials(group, payload).await?;
        info!(
            rank,
            processed = report.processed,
            malformed = report.malformed,
            keys = report.keys,
            "partial sent"
        );
        Ok(report)
    }

    async fn local_phase<G: ProcessGroup>(&self, group: &mut G) -> Result<(LocalCount, Vec<u8>)> {
        let local = match self.job.spec().strategy {
            Strategy::Push => {
                let job = &self.job;
                let mut local = LocalCount::new();
                receive_units(group, |unit| job.count_unit(unit, &mut local)).await?;
                local
            }
            Strategy::Partition => self.job.count_partition(group.rank(), group.size())?,
        };

        let payload = self
            .job
            .codec()
            .encode(&local.table)
            .with_context(|| format!("Rank {} failed to encode its partial", group.rank()))?;
        Ok((local, payload))
    }
}

/// Tell the coordinator this rank failed
///
/// Best effort: the coordinator may already be gone.
pub async fn report_failure<G: ProcessGroup>(group: &mut G, err: &anyhow::Error) {
    let msg = Message::Error(ErrorMessage {
        rank: group.rank(),
        error: format!("{:#}", err),
    });
    if let Err(send_err) = group.send(COORDINATOR_RANK, msg).await {
        warn!(rank = group.rank(), error = %send_err, "could not report failure to coordinator");
    }
}
