//! Connection entry
//!
//! Per-participant state stored in the registry.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use super::sink::{FrameSink, SinkError};

/// Unique identifier of a connection, assigned by the acceptor
///
/// Usernames are not unique, so this is what the registry keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// One authenticated participant
pub struct Connection {
    id: ConnectionId,

    /// Claimed at login, never changes afterwards
    username: String,

    peer_addr: Option<SocketAddr>,

    sink: Arc<dyn FrameSink>,

    /// True exactly while the connection is in the registry's member set
    live: AtomicBool,

    /// Set once the leave alert has been sent
    leave_announced: AtomicBool,
}

impl Connection {
    /// Create a connection that is not yet registered
    pub fn new(id: ConnectionId, username: impl Into<String>, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            id,
            username: username.into(),
            peer_addr: None,
            sink,
            live: AtomicBool::new(false),
            leave_announced: AtomicBool::new(false),
        }
    }

    /// Attach the remote address
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the username claimed at login
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the remote address, if known
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Whether the connection is currently a registry member
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Ask the connection's owner to shut it down
    pub fn close(&self) {
        self.sink.close();
    }

    /// Only called with the registry's write lock held
    pub(super) fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Release);
    }

    pub(super) fn send(&self, frame: Bytes) -> Result<(), SinkError> {
        self.sink.send(frame)
    }

    /// Returns true the first time only
    pub(super) fn claim_leave_announcement(&self) -> bool {
        !self.leave_announced.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("peer_addr", &self.peer_addr)
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}
