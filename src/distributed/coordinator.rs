//! Coordinator merge engine
//!
//! Runs on rank 0. The coordinator:
//! - Distributes work (push) or counts its own partition
//! - Gathers every participant's encoded partial (size exchange, transfer)
//! - Decodes each partial separately and folds it into the global table
//!
//! Writing the report is left to the caller, once [`Coordinator::run`] has
//! returned and every transfer is complete.

use crate::distributed::collective::gather_partials;
use crate::distributed::distributor::{push_units, Strategy};
use crate::distributed::group::{ProcessGroup, COORDINATOR_RANK};
use crate::job::{Job, LocalCount};
use crate::stats::aggregator::{Contribution, MergeAggregator};
use crate::stats::CountTable;
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{debug, info};

/// Merged result of a run
#[derive(Debug)]
pub struct MergeOutcome {
    /// Global counts
    pub counts: CountTable,
    /// Units read from the input
    pub units: u64,
    /// Participants in the run
    pub participants: usize,
    /// What each participant's partial contributed, in rank order
    pub contributions: Vec<Contribution>,
    /// Malformed wire lines across every partial
    pub dropped: u64,
}

/// Rank 0 of a run
pub struct Coordinator {
    job: Job,
}

impl Coordinator {
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    /// Run the local phase and the merge
    pub async fn run<G: ProcessGroup>(&self, group: &mut G) -> Result<MergeOutcome> {
        if group.rank() != COORDINATOR_RANK {
            anyhow::bail!("Coordinator must run as rank {}, not {}", COORDINATOR_RANK, group.rank());
        }
        let size = group.size();
        if size < 2 {
            anyhow::bail!("A run needs at least 2 participants, got {}", size);
        }

        let start = Instant::now();
        let (local, units) = match self.job.spec().strategy {
            Strategy::Push => {
                let units = self.job.open_units()?;
                let sent = push_units(group, units).await?;
                // The coordinator counts nothing itself under push
                (LocalCount::new(), sent)
            }
            Strategy::Partition => {
                let local = self.job.count_partition(COORDINATOR_RANK, size)?;
                let seen = local.seen;
                (local, seen)
            }
        };
        info!(
            strategy = self.job.spec().strategy.as_str(),
            units,
            local_keys = local.table.len(),
            malformed = local.malformed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "local phase complete"
        );

        let payload = self
            .job
            .codec()
            .encode(&local.table)
            .context("Failed to encode coordinator partial")?;
        drop(local);

        let gathered = gather_partials(group, payload)
            .await?
            .context("Gather returned no buffer on the coordinator")?;
        debug!(bytes = gathered.layout().total(), "partials gathered");

        let mut aggregator = MergeAggregator::new(*self.job.codec());
        for (rank, region) in gathered.regions() {
            aggregator.fold(rank, region);
        }
        drop(gathered);

        let contributions = aggregator.contributions().to_vec();
        let dropped = aggregator.dropped();
        let counts = aggregator.into_global();
        info!(keys = counts.len(), total = counts.total(), dropped, "merge complete");

        Ok(MergeOutcome {
            counts,
            units,
            participants: size,
            contributions,
            dropped,
        })
    }
}
