//! Session state machine
//!
//! Tracks a chat session from accept to close:
//!
//! ```text
//! Connecting ──login──► Authenticated ──error/EOF/shutdown──► Closed
//!      │                                                       ▲
//!      └─────────── bad first frame / timeout ─────────────────┘
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use crate::error::ProtocolError;
use crate::registry::ConnectionId;
use crate::stats::SessionStats;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Socket accepted, waiting for the login frame
    Connecting,
    /// Logged in and registered
    Authenticated,
    /// Terminal
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Connection ID assigned by the acceptor
    pub id: ConnectionId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Set once by a successful login
    username: Option<String>,

    /// Time when login completed
    pub authenticated_at: Option<Instant>,

    /// Frame counters
    pub stats: SessionStats,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Connecting,
            username: None,
            authenticated_at: None,
            stats: SessionStats::new(),
        }
    }

    /// Complete the login handshake
    pub fn authenticate(&mut self, username: &str) -> Result<(), ProtocolError> {
        match self.phase {
            SessionPhase::Connecting if username.is_empty() => Err(ProtocolError::EmptyUsername),
            SessionPhase::Connecting => {
                self.username = Some(username.to_owned());
                self.authenticated_at = Some(Instant::now());
                self.phase = SessionPhase::Authenticated;
                Ok(())
            }
            SessionPhase::Authenticated | SessionPhase::Closed => {
                Err(ProtocolError::DuplicateLogin)
            }
        }
    }

    /// Move to `Closed`. Returns false if already closed.
    pub fn close(&mut self) -> bool {
        if self.phase == SessionPhase::Closed {
            return false;
        }
        self.phase = SessionPhase::Closed;
        true
    }

    /// Get the username, once authenticated
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Check if session is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }
}
