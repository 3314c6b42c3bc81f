//! Chat server listener
//!
//! Handles the TCP accept loop and spawns one session per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::server::config::ServerConfig;
use crate::session::{ConnectionSession, Shutdown};
use crate::stats::ServerStats;

/// Group chat relay server
pub struct ChatServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: Shutdown,
    accepted: AtomicU64,
    rejected: AtomicU64,
    started_at: Instant,
}

impl ChatServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown: Shutdown::new(),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails to bind.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Accept connections on an already bound listener until `shutdown`
    /// completes, then stop every session, logged in or not
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Chat server listening");

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        self.shutdown.trigger();
        self.registry.close_all().await;

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Released when the session task finishes
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = ConnectionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        self.accepted.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = %session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let handle = ConnectionSession::start(
            session_id,
            socket,
            peer_addr,
            Arc::clone(&self.registry),
            self.config.clone(),
            self.shutdown.clone(),
        );

        if let Some(permit) = permit {
            tokio::spawn(async move {
                let _ = handle.await;
                drop(permit);
            });
        }
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Snapshot of server and registry counters
    pub async fn stats(&self) -> ServerStats {
        ServerStats {
            total_connections: self.accepted.load(Ordering::Relaxed),
            rejected_connections: self.rejected.load(Ordering::Relaxed),
            registry: self.registry.stats().await,
            uptime: self.started_at.elapsed(),
        }
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
