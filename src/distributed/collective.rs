//! Variable-length gather to the coordinator
//!
//! Every participant contributes one byte payload; the coordinator ends up
//! with all of them concatenated in rank order in a single buffer.
//!
//! # Phases
//!
//! 1. **Size exchange**: each worker sends PARTIAL_LENGTH. The coordinator
//!    records every length (its own included) and computes prefix-sum offsets.
//! 2. **Transfer**: each worker sends PARTIAL_PAYLOAD. The coordinator places
//!    it at its offset. A payload whose length differs from the declared one
//!    is a protocol error.
//!
//! The coordinator receives from ranks in ascending order. Workers send both
//! messages back to back and never wait on the coordinator in between.

use crate::distributed::group::{ProcessGroup, COORDINATOR_RANK};
use crate::distributed::protocol::{Message, TransportError};
use anyhow::{Context, Result};
use std::ops::Range;
use tracing::debug;

/// Per-rank lengths and offsets of a gathered buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherLayout {
    lengths: Vec<u64>,
    offsets: Vec<u64>,
    total: u64,
}

impl GatherLayout {
    /// Compute offsets as the exclusive prefix sum of `lengths`
    pub fn from_lengths(lengths: Vec<u64>) -> Result<Self> {
        let mut offsets = Vec::with_capacity(lengths.len());
        let mut total = 0u64;
        for (rank, &len) in lengths.iter().enumerate() {
            offsets.push(total);
            total = total
                .checked_add(len)
                .with_context(|| format!("Gathered size overflows at rank {}", rank))?;
        }
        Ok(Self {
            lengths,
            offsets,
            total,
        })
    }

    pub fn lengths(&self) -> &[u64] {
        &self.lengths
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Size of the whole receive buffer
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of contributing participants
    pub fn participants(&self) -> usize {
        self.lengths.len()
    }

    /// Byte range of `rank`'s payload in the receive buffer
    pub fn region(&self, rank: usize) -> Range<usize> {
        let start = self.offsets[rank] as usize;
        start..start + self.lengths[rank] as usize
    }
}

/// Result of a gather at the coordinator
#[derive(Debug)]
pub struct Gathered {
    layout: GatherLayout,
    buffer: Vec<u8>,
}

impl Gathered {
    pub fn layout(&self) -> &GatherLayout {
        &self.layout
    }

    /// The whole receive buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Payload contributed by `rank`
    pub fn region(&self, rank: usize) -> &[u8] {
        &self.buffer[self.layout.region(rank)]
    }

    /// Every payload as (rank, bytes), in rank order
    pub fn regions(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        (0..self.layout.participants()).map(move |rank| (rank, self.region(rank)))
    }
}

/// Gather one payload from every participant at the coordinator
///
/// Returns `Some` on the coordinator and `None` on workers.
pub async fn gather_partials<G: ProcessGroup>(group: &mut G, payload: Vec<u8>) -> Result<Option<Gathered>> {
    if group.rank() != COORDINATOR_RANK {
        let rank = group.rank();
        group
            .send(COORDINATOR_RANK, Message::PartialLength(payload.len() as u64))
            .await
            .with_context(|| format!("Rank {} failed to report its partial size", rank))?;
        group
            .send(COORDINATOR_RANK, Message::PartialPayload(payload))
            .await
            .with_context(|| format!("Rank {} failed to send its partial", rank))?;
        return Ok(None);
    }

    let size = group.size();

    // Phase 1: size exchange
    let mut lengths = Vec::with_capacity(size);
    lengths.push(payload.len() as u64);
    for rank in 1..size {
        match expect_from(group, rank, "PARTIAL_LENGTH").await? {
            Message::PartialLength(len) => lengths.push(len),
            other => return Err(unexpected(rank, "PARTIAL_LENGTH", &other)),
        }
    }

    let layout = GatherLayout::from_lengths(lengths)?;
    debug!(total = layout.total(), lengths = ?layout.lengths(), "partial sizes gathered");

    let total = usize::try_from(layout.total()).context("Gathered partials do not fit in memory")?;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(total)
        .with_context(|| format!("Failed to allocate {} bytes for gathered partials", total))?;

    // Phase 2: transfer
    buffer.extend_from_slice(&payload);
    drop(payload);
    for rank in 1..size {
        let bytes = match expect_from(group, rank, "PARTIAL_PAYLOAD").await? {
            Message::PartialPayload(bytes) => bytes,
            other => return Err(unexpected(rank, "PARTIAL_PAYLOAD", &other)),
        };
        let declared = layout.lengths()[rank];
        if bytes.len() as u64 != declared {
            anyhow::bail!(
                "Rank {} declared a {} byte partial but sent {} bytes",
                rank,
                declared,
                bytes.len()
            );
        }
        debug_assert_eq!(buffer.len() as u64, layout.offsets()[rank]);
        buffer.extend_from_slice(&bytes);
    }

    Ok(Some(Gathered { layout, buffer }))
}

/// Receive from `rank`, turning an ERROR report into a failure
async fn expect_from<G: ProcessGroup>(group: &mut G, rank: usize, expected: &'static str) -> Result<Message> {
    let msg = group
        .recv(rank)
        .await
        .with_context(|| format!("Failed to receive {} from rank {}", expected, rank))?;
    if let Message::Error(err) = msg {
        anyhow::bail!("Rank {} failed: {}", err.rank, err.error);
    }
    Ok(msg)
}

fn unexpected(peer: usize, expected: &'static str, got: &Message) -> anyhow::Error {
    TransportError::Unexpected {
        peer,
        expected,
        got: got.kind(),
    }
    .into()
}
