//! Participant protocol
//!
//! This module defines the messages exchanged between the coordinator (rank 0)
//! and the workers. Message bodies are MessagePack (rmp-serde).
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Coordinator (rank 0)               Worker (rank r)
//!     |                                   |
//!     |<------- HELLO(rank, size) --------|
//!     |-------- WELCOME(job) ------------>|
//!     |                                   |
//!     |-------- WORK_UNIT --------------->|   dynamic push only,
//!     |-------- WORK_UNIT --------------->|   round-robin over workers
//!     |-------- END_OF_WORK ------------->|
//!     |                                   |
//!     |<------- PARTIAL_LENGTH(n) --------|   size exchange
//!     |<------- PARTIAL_PAYLOAD(n bytes) -|   collective transfer
//! ```
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack message]
//! ```
//!
//! Work units and partial payloads are packed as MessagePack `bin`, one byte
//! per payload byte.

use crate::job::JobSpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Coordinator and workers must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame body (256 MiB)
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Transport and framing errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer {peer} closed the connection")]
    PeerClosed { peer: usize },

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("rank {rank} is outside a group of {size}")]
    RankOutOfRange { rank: usize, size: usize },

    #[error("rank {from} cannot message rank {to} directly (star topology rooted at 0)")]
    NoRoute { from: usize, to: usize },

    #[error("unexpected message from rank {peer}: expected {expected}, got {got}")]
    Unexpected {
        peer: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("handshake rejected: {0}")]
    Handshake(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Handshake (Worker → Coordinator)
    Hello(HelloMessage),

    /// Handshake acknowledgment carrying the job (Coordinator → Worker)
    Welcome(WelcomeMessage),

    /// One work unit (Coordinator → Worker, dynamic push)
    WorkUnit(#[serde(with = "serde_bytes")] Vec<u8>),

    /// Sentinel: no more work units will arrive (Coordinator → Worker)
    EndOfWork,

    /// Byte length of the sender's encoded partial counts
    PartialLength(u64),

    /// Encoded partial counts
    PartialPayload(#[serde(with = "serde_bytes")] Vec<u8>),

    /// Fatal error report; the receiver aborts the run
    Error(ErrorMessage),
}

impl Message {
    /// Short name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello(_) => "HELLO",
            Message::Welcome(_) => "WELCOME",
            Message::WorkUnit(_) => "WORK_UNIT",
            Message::EndOfWork => "END_OF_WORK",
            Message::PartialLength(_) => "PARTIAL_LENGTH",
            Message::PartialPayload(_) => "PARTIAL_PAYLOAD",
            Message::Error(_) => "ERROR",
        }
    }
}

/// Handshake message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloMessage {
    /// Protocol version (must match)
    pub protocol_version: u32,

    /// Sender's rank
    pub rank: usize,

    /// Participant count the sender was launched with
    pub size: usize,

    /// Node identifier (hostname and pid)
    pub node_id: String,
}

/// Handshake acknowledgment
///
/// Workers count whatever job the coordinator hands them, so only the
/// coordinator needs the job configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeMessage {
    /// Job every participant runs
    pub job: JobSpec,
}

/// Error message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Sender's rank
    pub rank: usize,

    /// Error description
    pub error: String,
}

/// Serialize a message with its length prefix
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, TransportError> {
    let body = rmp_serde::to_vec_named(msg)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as u32).to_le_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Read one complete message from a stream
///
/// `peer` is the rank on the other end, used to report a closed connection.
pub async fn read_message<R>(stream: &mut R, peer: usize) -> Result<Message, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    if let Err(e) = stream.read_exact(&mut len_buf).await {
        return Err(match e.kind() {
            std::io::ErrorKind::UnexpectedEof => TransportError::PeerClosed { peer },
            _ => TransportError::Io(e),
        });
    }

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len: msg_len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; msg_len];
    if let Err(e) = stream.read_exact(&mut body).await {
        return Err(match e.kind() {
            std::io::ErrorKind::UnexpectedEof => TransportError::PeerClosed { peer },
            _ => TransportError::Io(e),
        });
    }

    Ok(rmp_serde::from_slice(&body)?)
}

/// Write one message to a stream and flush it
pub async fn write_message<W>(stream: &mut W, msg: &Message) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;
    stream.write_all(&framed).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Read the first frame of `bytes`
    async fn decode_frame(bytes: &[u8]) -> Result<Message, TransportError> {
        let mut reader = bytes;
        read_message(&mut reader, 1).await
    }

    #[tokio::test]
    async fn test_serialize_deserialize_hello() {
        let msg = Message::Hello(HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            rank: 3,
            size: 4,
            node_id: "node-a:1234".to_string(),
        });

        let bytes = serialize_message(&msg).unwrap();
        let deserialized = decode_frame(&bytes).await.unwrap();

        match deserialized {
            Message::Hello(hello) => {
                assert_eq!(hello.protocol_version, PROTOCOL_VERSION);
                assert_eq!(hello.rank, 3);
                assert_eq!(hello.size, 4);
                assert_eq!(hello.node_id, "node-a:1234");
            }
            other => panic!("Wrong message type: {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_welcome_carries_job() {
        let job = JobSpec::default();
        let msg = Message::Welcome(WelcomeMessage { job: job.clone() });

        let bytes = serialize_message(&msg).unwrap();
        let deserialized = decode_frame(&bytes).await.unwrap();
        assert_eq!(deserialized, Message::Welcome(WelcomeMessage { job }));
    }

    #[tokio::test]
    async fn test_end_of_work_is_distinct_from_empty_unit() {
        let sentinel = serialize_message(&Message::EndOfWork).unwrap();
        let empty = serialize_message(&Message::WorkUnit(Vec::new())).unwrap();
        assert_ne!(sentinel, empty);

        assert_eq!(decode_frame(&empty).await.unwrap(), Message::WorkUnit(Vec::new()));
    }

    #[test]
    fn test_message_framing() {
        let msg = Message::PartialPayload(b"love\t3\n".to_vec());
        let bytes = serialize_message(&msg).unwrap();

        assert!(bytes.len() >= 4);
        let msg_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(bytes.len(), 4 + msg_len);
    }

    #[tokio::test]
    async fn test_incomplete_frame_rejected() {
        let bytes = serialize_message(&Message::PartialLength(42)).unwrap();
        assert!(matches!(
            decode_frame(&bytes[..bytes.len() - 1]).await,
            Err(TransportError::PeerClosed { peer: 1 })
        ));
        assert!(decode_frame(&bytes[..2]).await.is_err());
    }

    #[tokio::test]
    async fn test_payload_bytes_are_packed_as_binary() {
        let payload = vec![0xffu8; 200];
        let bytes = serialize_message(&Message::PartialPayload(payload.clone())).unwrap();

        // Variant name plus a bin8 header, one byte per payload byte
        assert!(bytes.len() < 4 + payload.len() + 32, "frame was {} bytes", bytes.len());
        assert_eq!(decode_frame(&bytes).await.unwrap(), Message::PartialPayload(payload));
    }

    #[tokio::test]
    async fn test_stream_round_trip_preserves_order() {
        let (mut a, mut b) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            write_message(&mut a, &Message::WorkUnit(b"first".to_vec())).await.unwrap();
            write_message(&mut a, &Message::WorkUnit(b"second".to_vec())).await.unwrap();
            write_message(&mut a, &Message::EndOfWork).await.unwrap();
        });

        assert_eq!(read_message(&mut b, 0).await.unwrap(), Message::WorkUnit(b"first".to_vec()));
        assert_eq!(read_message(&mut b, 0).await.unwrap(), Message::WorkUnit(b"second".to_vec()));
        assert_eq!(read_message(&mut b, 0).await.unwrap(), Message::EndOfWork);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_stream_reports_peer() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);

        match read_message(&mut b, 2).await {
            Err(TransportError::PeerClosed { peer }) => assert_eq!(peer, 2),
            other => panic!("expected PeerClosed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let len = (MAX_FRAME_LEN as u32 + 1).to_le_bytes();
        tokio::io::AsyncWriteExt::write_all(&mut a, &len).await.unwrap();

        assert!(matches!(
            read_message(&mut b, 1).await,
            Err(TransportError::FrameTooLarge { .. })
        ));
    }
}
