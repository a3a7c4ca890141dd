//! Process groups
//!
//! A process group is the fixed set of participants in one run. Each
//! participant knows its own rank, the group size, and can exchange
//! [`Message`]s with other ranks. Rank 0 is the coordinator.
//!
//! Messages between a fixed sender and receiver arrive in send order. A
//! receive waits until the matching send arrives; there is no timeout.
//!
//! Two implementations exist:
//!
//! - [`TcpGroup`](crate::distributed::tcp::TcpGroup): one OS process per
//!   participant, connected over TCP in a star rooted at rank 0
//! - [`LocalGroup`]: every participant in one process, connected by channels
//!   (used by tests and for embedding)

use crate::distributed::protocol::{Message, TransportError};
use std::future::Future;
use tokio::sync::mpsc::{channel, Receiver, Sender};

/// Rank of the coordinator
pub const COORDINATOR_RANK: usize = 0;

/// Point-to-point messaging between the participants of a run
pub trait ProcessGroup: Send {
    /// This participant's rank (0-based)
    fn rank(&self) -> usize;

    /// Number of participants
    fn size(&self) -> usize;

    /// Send `msg` to `dest`
    fn send(&mut self, dest: usize, msg: Message) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next message from `source`
    fn recv(&mut self, source: usize) -> impl Future<Output = Result<Message, TransportError>> + Send;

    /// Whether this participant is the coordinator
    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR_RANK
    }
}

/// Messages buffered per (sender, receiver) pair before `send` suspends
pub const LOCAL_CHANNEL_CAPACITY: usize = 64;

/// In-process group backed by bounded channels
///
/// There is one channel per ordered (sender, receiver) pair, which keeps the
/// per-pair FIFO guarantee without any cross-pair ordering. A send to a full
/// channel waits for the receiver, like a TCP send against a full socket.
#[derive(Debug)]
pub struct LocalGroup {
    rank: usize,
    size: usize,
    /// `outboxes[dest]` delivers to `dest`
    outboxes: Vec<Sender<Message>>,
    /// `inboxes[source]` receives from `source`
    inboxes: Vec<Receiver<Message>>,
}

impl LocalGroup {
    /// Create all `size` members of a group
    ///
    /// Element `r` of the returned vector is the member with rank `r`.
    pub fn create(size: usize) -> Vec<LocalGroup> {
        // channels[from][to]
        let mut senders: Vec<Vec<Option<Sender<Message>>>> = Vec::with_capacity(size);
        let mut receivers: Vec<Vec<Option<Receiver<Message>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for from in 0..size {
            let mut row = Vec::with_capacity(size);
            for to in 0..size {
                let (tx, rx) = channel(LOCAL_CHANNEL_CAPACITY);
                row.push(Some(tx));
                receivers[to][from] = Some(rx);
            }
            senders.push(row);
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| LocalGroup {
                rank,
                size,
                outboxes: outboxes.into_iter().flatten().collect(),
                inboxes: inboxes.into_iter().flatten().collect(),
            })
            .collect()
    }

    fn check_rank(&self, rank: usize) -> Result<(), TransportError> {
        if rank >= self.size {
            return Err(TransportError::RankOutOfRange {
                rank,
                size: self.size,
            });
        }
        Ok(())
    }
}

impl ProcessGroup for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn send(&mut self, dest: usize, msg: Message) -> Result<(), TransportError> {
        self.check_rank(dest)?;
        self.outboxes[dest]
            .send(msg)
            .await
            .map_err(|_| TransportError::PeerClosed { peer: dest })
    }

    async fn recv(&mut self, source: usize) -> Result<Message, TransportError> {
        self.check_rank(source)?;
        self.inboxes[source]
            .recv()
            .await
            .ok_or(TransportError::PeerClosed { peer: source })
    }
}
