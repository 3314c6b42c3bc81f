//! Outbound sink abstraction
//!
//! The registry never touches sockets. Each connection hands it a
//! [`FrameSink`], a non-blocking "queue these encoded bytes" capability, and
//! a way to ask the owner of the socket to shut down.

use bytes::Bytes;
use thiserror::Error;

/// Why a sink refused a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The connection is shutting down or its writer has stopped
    #[error("sink closed")]
    Closed,
    /// The outbound queue is at capacity
    #[error("outbound queue full")]
    Full,
}

/// Destination for encoded frames of one connection
///
/// `send` must not block: it is called while the registry holds its lock.
/// Implementations deliver each call's bytes contiguously, never interleaved
/// with another frame.
pub trait FrameSink: Send + Sync {
    /// Queue one encoded frame
    fn send(&self, frame: Bytes) -> Result<(), SinkError>;

    /// Stop accepting frames and wake whoever drives the transport
    fn close(&self);
}
