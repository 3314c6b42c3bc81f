//! Outbound path of a session
//!
//! The registry queues encoded frames on an [`OutboundQueue`]; one writer
//! task per connection drains the queue onto the socket. Having a single
//! writer per socket keeps frames from interleaving.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::protocol::FrameWriter;
use crate::registry::{ConnectionId, FrameSink, SinkError};

/// Level-triggered close signal shared by a session's tasks
///
/// Once triggered it stays triggered; `wait` returns immediately after that.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create an untriggered signal
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger the signal
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Check if triggered
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until triggered
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            let triggered = *rx.borrow_and_update();
            if triggered {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded queue of encoded frames for one connection
pub struct OutboundQueue {
    tx: mpsc::Sender<Bytes>,
    shutdown: Shutdown,
}

impl OutboundQueue {
    /// Create a queue and the receiver its writer task drains
    pub fn new(capacity: usize, shutdown: Shutdown) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, shutdown }, rx)
    }
}

impl FrameSink for OutboundQueue {
    fn send(&self, frame: Bytes) -> Result<(), SinkError> {
        if self.shutdown.is_triggered() {
            return Err(SinkError::Closed);
        }
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn close(&self) {
        self.shutdown.trigger();
    }
}

/// Drain `rx` onto `writer` until shutdown or a write error
///
/// A failed write trips `shutdown`, which also ends the session's receive
/// loop. Once `shutdown` triggers, frames still queued are written out and a
/// write already in progress is allowed to finish, both within
/// `flush_timeout`. A peer that stops reading cannot hold the writer open
/// past that.
pub async fn drive_outbound<W>(
    session_id: ConnectionId,
    mut writer: FrameWriter<W>,
    mut rx: mpsc::Receiver<Bytes>,
    shutdown: Shutdown,
    flush_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    let mut flush = true;

    loop {
        let encoded = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            next = rx.recv() => match next {
                Some(encoded) => encoded,
                None => break,
            },
        };

        let result = tokio::select! {
            result = writer.write_encoded(&encoded) => result,
            _ = flush_deadline(&shutdown, flush_timeout) => {
                tracing::debug!(session_id = %session_id, "Outbound write abandoned");
                flush = false;
                break;
            }
        };

        if let Err(e) = result {
            tracing::debug!(session_id = %session_id, error = %e, "Outbound write failed");
            shutdown.trigger();
            flush = false;
            break;
        }
    }

    if flush {
        let deadline = Instant::now() + flush_timeout;
        while let Ok(encoded) = rx.try_recv() {
            match tokio::time::timeout_at(deadline, writer.write_encoded(&encoded)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(session_id = %session_id, error = %e, "Flush failed");
                    break;
                }
                Err(_) => {
                    tracing::debug!(session_id = %session_id, "Flush timed out");
                    break;
                }
            }
        }
    }

    let _ = writer.shutdown().await;
    tracing::trace!(session_id = %session_id, "Writer stopped");
}

/// Completes `flush_timeout` after `shutdown` triggers
async fn flush_deadline(shutdown: &Shutdown, flush_timeout: Duration) {
    shutdown.wait().await;
    tokio::time::sleep(flush_timeout).await;
}
