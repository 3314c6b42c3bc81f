//! Client configuration

use std::time::Duration;

use crate::protocol::constants::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT};

/// Client configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (`host:port`)
    pub server_addr: String,

    /// Name sent in the login frame
    pub username: String,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Upper bound on the size of one frame, sent or received. Should match
    /// the server's limit.
    pub max_frame_size: usize,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,
}

impl ClientConfig {
    /// Create a new config for `username` connecting to `server_addr`
    pub fn new(server_addr: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            username: username.into(),
            connect_timeout: Duration::from_secs(10),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            tcp_nodelay: true,
        }
    }

    /// Config for a server on localhost at the default port
    pub fn localhost(username: impl Into<String>) -> Self {
        Self::new(format!("127.0.0.1:{}", DEFAULT_PORT), username)
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the maximum inbound frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}
