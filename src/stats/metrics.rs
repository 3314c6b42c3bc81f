//! Statistics for chat sessions and the relay as a whole

use std::time::{Duration, Instant};

/// Per-session counters, owned by the session task
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Frames decoded from the peer
    pub frames_received: u64,
    /// Encoded bytes of those frames
    pub bytes_received: u64,
    /// Text and file frames relayed to other members
    pub frames_relayed: u64,
    /// Frames dropped as protocol violations
    pub violations: u64,
    /// Session start
    pub started_at: Instant,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            frames_received: 0,
            bytes_received: 0,
            frames_relayed: 0,
            violations: 0,
            started_at: Instant::now(),
        }
    }

    /// Account for one decoded frame of `encoded_len` bytes
    pub fn record_frame(&mut self, encoded_len: usize) {
        self.frames_received += 1;
        self.bytes_received += encoded_len as u64;
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Members right now
    pub active_connections: usize,
    /// Registrations ever
    pub total_registered: u64,
    /// Broadcast calls
    pub broadcasts: u64,
    /// Successful per-recipient deliveries
    pub deliveries: u64,
    /// Recipients removed because their sink refused a frame
    pub dropped_recipients: u64,
}

/// Server-wide statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Sockets accepted
    pub total_connections: u64,
    /// Sockets turned away by the connection limit
    pub rejected_connections: u64,
    /// Registry snapshot
    pub registry: RegistryStats,
    /// Uptime
    pub uptime: Duration,
}
