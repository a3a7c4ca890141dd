//! TCP process group
//!
//! One OS process per participant. Rank 0 listens; every other rank connects
//! to it and introduces itself with a HELLO. The result is a star: the
//! coordinator holds one stream per worker and each worker holds one stream to
//! the coordinator. Every message in a run involves the coordinator, so no
//! worker-to-worker route is needed.
//!
//! # Handshake
//!
//! The coordinator rejects a HELLO (answering with ERROR and aborting) when
//! the protocol version differs, the declared group size differs, the rank is
//! out of range or already taken. An accepted worker receives the job in the
//! WELCOME, so workers need no job configuration of their own.

use crate::distributed::group::{ProcessGroup, COORDINATOR_RANK};
use crate::distributed::protocol::*;
use crate::job::JobSpec;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Retry schedule for workers connecting to the coordinator
#[derive(Debug, Clone, Copy)]
pub struct ConnectRetry {
    /// Total connection attempts
    pub attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl ConnectRetry {
    /// Longest a worker keeps trying, saturating at `Duration::MAX`
    pub fn total_wait(&self) -> Duration {
        self.backoff.checked_mul(self.attempts).unwrap_or(Duration::MAX)
    }
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            attempts: 50,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Bound coordinator socket, before workers have joined
pub struct CoordinatorListener {
    listener: TcpListener,
}

impl CoordinatorListener {
    /// Bind the coordinator's listening socket
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind coordinator on {}", addr))?;
        Ok(Self { listener })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read coordinator address")
    }

    /// Accept one connection per worker, complete every handshake and hand
    /// each worker the job
    pub async fn accept_workers(self, size: usize, job: &JobSpec) -> Result<TcpGroup> {
        if size < 2 {
            anyhow::bail!("A run needs at least 2 participants, got {}", size);
        }

        let mut streams: Vec<Option<TcpStream>> = (0..size).map(|_| None).collect();
        let mut joined = 0;

        while joined < size - 1 {
            let (mut stream, addr) = self
                .listener
                .accept()
                .await
                .context("Failed to accept worker connection")?;
            stream.set_nodelay(true).ok();

            let hello = match read_message(&mut stream, usize::MAX).await? {
                Message::Hello(hello) => hello,
                other => {
                    return Err(TransportError::Unexpected {
                        peer: usize::MAX,
                        expected: "HELLO",
                        got: other.kind(),
                    }
                    .into())
                }
            };

            if let Err(reason) = validate_hello(&hello, size, &streams) {
                let reply = Message::Error(ErrorMessage {
                    rank: COORDINATOR_RANK,
                    error: reason.clone(),
                });
                // Best effort: the run aborts either way
                let _ = write_message(&mut stream, &reply).await;
                return Err(TransportError::Handshake(reason).into());
            }

            let welcome = Message::Welcome(WelcomeMessage { job: job.clone() });
            write_message(&mut stream, &welcome).await?;
            info!(rank = hello.rank, node = %hello.node_id, %addr, "worker joined");
            streams[hello.rank] = Some(stream);
            joined += 1;
        }

        Ok(TcpGroup {
            rank: COORDINATOR_RANK,
            size,
            streams,
        })
    }
}

fn validate_hello(hello: &HelloMessage, size: usize, streams: &[Option<TcpStream>]) -> std::result::Result<(), String> {
    if hello.protocol_version != PROTOCOL_VERSION {
        return Err(format!(
            "Protocol version mismatch: coordinator={}, worker={}",
            PROTOCOL_VERSION, hello.protocol_version
        ));
    }
    if hello.size != size {
        return Err(format!(
            "Participant count mismatch: coordinator={}, worker={}",
            size, hello.size
        ));
    }
    if hello.rank == COORDINATOR_RANK || hello.rank >= size {
        return Err(format!("Invalid worker rank {} for a group of {}", hello.rank, size));
    }
    if streams[hello.rank].is_some() {
        return Err(format!("Rank {} joined twice", hello.rank));
    }
    Ok(())
}

/// Participant in a TCP star
pub struct TcpGroup {
    rank: usize,
    size: usize,
    /// Coordinator: one stream per worker rank. Worker: only index 0.
    streams: Vec<Option<TcpStream>>,
}

impl TcpGroup {
    /// Run as worker `rank`: connect to the coordinator at `addr`
    ///
    /// Returns the group together with the job received in the handshake.
    pub async fn worker(addr: &str, rank: usize, size: usize, retry: ConnectRetry) -> Result<(Self, JobSpec)> {
        if size < 2 {
            anyhow::bail!("A run needs at least 2 participants, got {}", size);
        }
        if rank == COORDINATOR_RANK || rank >= size {
            anyhow::bail!("Invalid worker rank {} for a group of {}", rank, size);
        }

        let mut stream = connect_with_retry(addr, retry).await?;
        stream.set_nodelay(true).ok();

        let hello = Message::Hello(HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            rank,
            size,
            node_id: node_id(),
        });
        write_message(&mut stream, &hello).await?;

        let job = match read_message(&mut stream, COORDINATOR_RANK).await? {
            Message::Welcome(welcome) => {
                debug!(rank, "handshake complete");
                welcome.job
            }
            Message::Error(err) => return Err(TransportError::Handshake(err.error).into()),
            other => {
                return Err(TransportError::Unexpected {
                    peer: COORDINATOR_RANK,
                    expected: "WELCOME",
                    got: other.kind(),
                }
                .into())
            }
        };

        let mut streams: Vec<Option<TcpStream>> = (0..size).map(|_| None).collect();
        streams[COORDINATOR_RANK] = Some(stream);

        Ok((Self { rank, size, streams }, job))
    }

    fn stream(&mut self, peer: usize) -> std::result::Result<&mut TcpStream, TransportError> {
        if peer >= self.size {
            return Err(TransportError::RankOutOfRange {
                rank: peer,
                size: self.size,
            });
        }
        let from = self.rank;
        self.streams[peer]
            .as_mut()
            .ok_or(TransportError::NoRoute { from, to: peer })
    }
}

impl ProcessGroup for TcpGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn send(&mut self, dest: usize, msg: Message) -> std::result::Result<(), TransportError> {
        write_message(self.stream(dest)?, &msg).await
    }

    async fn recv(&mut self, source: usize) -> std::result::Result<Message, TransportError> {
        read_message(self.stream(source)?, source).await
    }
}

async fn connect_with_retry(addr: &str, retry: ConnectRetry) -> Result<TcpStream> {
    let attempts = retry.attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(attempt, attempts, error = %e, "coordinator not reachable yet");
                last_err = Some(e);
                if attempt < attempts {
                    sleep(retry.backoff).await;
                }
            }
        }
    }

    let err = last_err.map(anyhow::Error::from).unwrap_or_else(|| anyhow::anyhow!("no attempts made"));
    warn!(addr, attempts, "giving up on coordinator");
    Err(err).with_context(|| format!("Failed to connect to coordinator at {} after {} attempts", addr, attempts))
}

/// Identify this participant in handshakes and logs
fn node_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}:{}", host, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_wait_saturates() {
        let retry = ConnectRetry::default();
        assert_eq!(retry.total_wait(), Duration::from_secs(10));

        let huge = ConnectRetry {
            attempts: u32::MAX,
            backoff: Duration::from_millis(u64::MAX),
        };
        assert_eq!(huge.total_wait(), Duration::MAX);
    }

    #[tokio::test]
    async fn test_star_exchange() {
        let listener = CoordinatorListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut workers = Vec::new();
        for rank in 1..3 {
            let addr = addr.clone();
            workers.push(tokio::spawn(async move {
                let (mut group, job) = TcpGroup::worker(&addr, rank, 3, ConnectRetry::default()).await.unwrap();
                assert_eq!(job, JobSpec::default());
                group.send(0, Message::PartialLength(rank as u64)).await.unwrap();
                group.recv(0).await.unwrap()
            }));
        }

        let mut root = listener.accept_workers(3, &JobSpec::default()).await.unwrap();
        assert_eq!(root.rank(), 0);
        assert_eq!(root.size(), 3);
        assert_eq!(root.recv(2).await.unwrap(), Message::PartialLength(2));
        assert_eq!(root.recv(1).await.unwrap(), Message::PartialLength(1));
        root.send(1, Message::EndOfWork).await.unwrap();
        root.send(2, Message::EndOfWork).await.unwrap();

        for handle in workers {
            assert_eq!(handle.await.unwrap(), Message::EndOfWork);
        }
    }

    #[tokio::test]
    async fn test_size_mismatch_rejected() {
        let listener = CoordinatorListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let worker = tokio::spawn(async move { TcpGroup::worker(&addr, 1, 4, ConnectRetry::default()).await.map(|_| ()) });

        let root = listener.accept_workers(2, &JobSpec::default()).await;
        assert!(root.is_err());

        let err = worker.await.unwrap().err().unwrap();
        assert!(format!("{:#}", err).contains("Participant count mismatch"));
    }

    #[tokio::test]
    async fn test_worker_cannot_reach_other_worker() {
        let listener = CoordinatorListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let worker = tokio::spawn(async move {
            let (mut group, _) = TcpGroup::worker(&addr, 1, 3, ConnectRetry::default()).await.unwrap();
            group.send(2, Message::EndOfWork).await
        });
        let addr2 = listener.local_addr().unwrap().to_string();
        let other = tokio::spawn(async move { TcpGroup::worker(&addr2, 2, 3, ConnectRetry::default()).await.map(|_| ()) });

        let _root = listener.accept_workers(3, &JobSpec::default()).await.unwrap();
        assert!(matches!(worker.await.unwrap(), Err(TransportError::NoRoute { from: 1, to: 2 })));
        other.await.unwrap().unwrap();
    }

    #[test]
    fn test_invalid_rank_rejected_before_connecting() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(TcpGroup::worker("127.0.0.1:1", 0, 3, ConnectRetry::default()));
        assert!(result.is_err());
    }
}
