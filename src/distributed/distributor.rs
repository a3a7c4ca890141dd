//! Work distribution
//!
//! Two strategies decide which participant processes which work unit. Every
//! participant of a run must use the same one.
//!
//! - **Push**: the coordinator reads the input and streams units round-robin
//!   over ranks `1..N`, then sends one END_OF_WORK to every worker. The
//!   coordinator itself processes nothing.
//! - **Partition**: no distribution messages. Every participant reads the
//!   same input and keeps the units whose 0-based index modulo N equals its
//!   rank.
//!
//! Either way every unit lands on exactly one participant.

use crate::distributed::group::{ProcessGroup, COORDINATOR_RANK};
use crate::distributed::protocol::{Message, TransportError};
use crate::input::WorkUnit;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io;
use tracing::debug;

/// How work units reach participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Coordinator streams units to workers
    Push,
    /// Every participant keeps `index % size == rank`
    #[default]
    Partition,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Push => "push",
            Strategy::Partition => "partition",
        }
    }
}

/// Stream `units` round-robin to ranks `1..size`, then end every worker
///
/// Returns the number of units sent.
pub async fn push_units<G, I>(group: &mut G, units: I) -> Result<u64>
where
    G: ProcessGroup,
    I: Iterator<Item = io::Result<WorkUnit>> + Send,
{
    let size = group.size();
    if size < 2 {
        anyhow::bail!("Push distribution needs at least one worker (group size {})", size);
    }

    let workers = size - 1;
    let mut sent = 0u64;

    for unit in units {
        let unit = unit.context("Failed to read input")?;
        let dest = 1 + (sent % workers as u64) as usize;
        group
            .send(dest, Message::WorkUnit(unit.into_bytes()))
            .await
            .with_context(|| format!("Failed to send work unit {} to rank {}", sent, dest))?;
        sent += 1;
    }

    for dest in 1..size {
        group
            .send(dest, Message::EndOfWork)
            .await
            .with_context(|| format!("Failed to end work for rank {}", dest))?;
    }

    debug!(units = sent, workers, "push distribution finished");
    Ok(sent)
}

/// Receive units from the coordinator until END_OF_WORK
///
/// `handle` runs once per unit, in arrival order. Returns the number of units
/// received.
pub async fn receive_units<G, F>(group: &mut G, mut handle: F) -> Result<u64>
where
    G: ProcessGroup,
    F: FnMut(&str) + Send,
{
    let mut received = 0u64;

    loop {
        match group.recv(COORDINATOR_RANK).await? {
            Message::WorkUnit(bytes) => {
                handle(&String::from_utf8_lossy(&bytes));
                received += 1;
            }
            Message::EndOfWork => break,
            Message::Error(err) => {
                anyhow::bail!("Coordinator aborted the run: {}", err.error);
            }
            other => {
                return Err(TransportError::Unexpected {
                    peer: COORDINATOR_RANK,
                    expected: "WORK_UNIT or END_OF_WORK",
                    got: other.kind(),
                }
                .into())
            }
        }
    }

    debug!(rank = group.rank(), units = received, "end of work");
    Ok(received)
}

/// Whether `rank` owns the unit at `index` under static partitioning
pub fn owns(index: u64, rank: usize, size: usize) -> bool {
    index % size as u64 == rank as u64
}

/// Iterator adapter keeping only the units one rank owns
///
/// Read errors are passed through regardless of ownership.
pub struct Partitioned<I> {
    inner: I,
    rank: usize,
    size: usize,
    index: u64,
}

impl<I> Partitioned<I> {
    pub fn new(inner: I, rank: usize, size: usize) -> Self {
        Self {
            inner,
            rank,
            size,
            index: 0,
        }
    }

    /// Units read so far, owned or not
    pub fn seen(&self) -> u64 {
        self.index
    }
}

impl<I> Iterator for Partitioned<I>
where
    I: Iterator<Item = io::Result<WorkUnit>>,
{
    type Item = io::Result<WorkUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.inner.next()?;
            if item.is_err() {
                return Some(item);
            }
            let index = self.index;
            self.index += 1;
            if owns(index, self.rank, self.size) {
                return Some(item);
            }
        }
    }
}
