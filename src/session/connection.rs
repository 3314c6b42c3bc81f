//! Per-connection session
//!
//! Owns one socket from accept to close. The receive loop runs on the
//! session's own task; outbound frames go through an [`OutboundQueue`] and a
//! dedicated writer task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use super::outbound::{drive_outbound, OutboundQueue, Shutdown};
use super::state::SessionState;
use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{encoded_len, Frame, FrameCodec, FrameReader, FrameWriter};
use crate::registry::{Connection, ConnectionId, ConnectionRegistry};
use crate::server::config::ServerConfig;

/// One client connection's state machine
pub struct ConnectionSession {
    state: SessionState,
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    server_shutdown: Shutdown,
}

impl ConnectionSession {
    /// Create a session for an accepted connection
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        config: ServerConfig,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            state: SessionState::new(id, peer_addr),
            config,
            registry,
            server_shutdown: Shutdown::new(),
        }
    }

    /// Stop the session, whatever its phase, once `shutdown` triggers
    pub fn with_server_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.server_shutdown = shutdown;
        self
    }

    /// Spawn a session task for an accepted socket
    pub fn start(
        id: ConnectionId,
        socket: TcpStream,
        peer_addr: SocketAddr,
        registry: Arc<ConnectionRegistry>,
        config: ServerConfig,
        server_shutdown: Shutdown,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let session = ConnectionSession::new(id, peer_addr, config, registry)
                .with_server_shutdown(server_shutdown);

            if let Err(e) = session.run(socket).await {
                tracing::debug!(session_id = %id, error = %e, "Connection error");
            }

            tracing::debug!(session_id = %id, "Connection closed");
        })
    }

    /// Run the session over a TCP socket until it closes
    pub async fn run(self, socket: TcpStream) -> Result<()> {
        let (reader, writer) = socket.into_split();
        self.run_io(reader, writer).await
    }

    /// Run the session over any byte stream halves
    pub async fn run_io<R, W>(mut self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let codec = FrameCodec::with_max_frame_size(self.config.max_frame_size);
        let mut reader = FrameReader::with_codec(reader, codec);

        // Connecting
        let username = match self.handshake(&mut reader).await {
            Ok(username) => username,
            Err(e) => {
                self.state.close();
                tracing::warn!(
                    session_id = %self.state.id,
                    peer = %self.state.peer_addr,
                    error = %e,
                    "Login rejected"
                );
                return Err(e);
            }
        };

        // Authenticated
        let shutdown = Shutdown::new();
        let (queue, rx) = OutboundQueue::new(self.config.outbound_queue_capacity, shutdown.clone());
        let writer_task = tokio::spawn(drive_outbound(
            self.state.id,
            FrameWriter::new(writer),
            rx,
            shutdown.clone(),
            self.config.flush_timeout,
        ));

        let connection = Arc::new(
            Connection::new(self.state.id, username, Arc::new(queue))
                .with_peer_addr(self.state.peer_addr),
        );

        self.registry.register(Arc::clone(&connection)).await;
        self.registry.announce_join(&connection).await;

        tracing::info!(
            session_id = %self.state.id,
            peer = %self.state.peer_addr,
            username = %connection.username(),
            "User joined"
        );

        let result = self.receive_loop(&mut reader, &connection, &shutdown).await;

        // Closed
        self.state.close();
        self.registry.unregister(connection.id()).await;
        self.registry.announce_leave(&connection).await;
        shutdown.trigger();
        let _ = writer_task.await;

        tracing::info!(
            session_id = %self.state.id,
            username = %connection.username(),
            frames = self.state.stats.frames_received,
            relayed = self.state.stats.frames_relayed,
            duration_secs = self.state.stats.duration().as_secs(),
            "User left"
        );

        result
    }

    /// Wait for the login frame
    async fn handshake<R>(&mut self, reader: &mut FrameReader<R>) -> Result<String>
    where
        R: AsyncRead + Unpin,
    {
        let server_shutdown = self.server_shutdown.clone();
        let first = tokio::select! {
            biased;
            _ = server_shutdown.wait() => return Err(Error::ShuttingDown),
            first = tokio::time::timeout(self.config.login_timeout, reader.read_frame()) => {
                first.map_err(|_| Error::Timeout("login"))??
            }
        };

        // A login that raced with shutdown must not register
        if server_shutdown.is_triggered() {
            return Err(Error::ShuttingDown);
        }

        let frame = first.ok_or(Error::ConnectionClosed)?;
        self.state.stats.record_frame(encoded_len(&frame));

        match frame {
            Frame::Login { username } => {
                self.state.authenticate(&username)?;
                Ok(username)
            }
            other => Err(ProtocolError::LoginRequired { got: other.kind() }.into()),
        }
    }

    /// Relay inbound frames until the peer goes away or shutdown is signalled
    async fn receive_loop<R>(
        &mut self,
        reader: &mut FrameReader<R>,
        connection: &Connection,
        shutdown: &Shutdown,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let idle_timeout = self.config.idle_timeout;
        let server_shutdown = self.server_shutdown.clone();

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    tracing::debug!(session_id = %self.state.id, "Shutdown requested");
                    return Ok(());
                }
                _ = server_shutdown.wait() => {
                    tracing::debug!(session_id = %self.state.id, "Server shutting down");
                    return Ok(());
                }
                next = read_with_timeout(reader, idle_timeout) => next?,
            };

            let Some(frame) = next else {
                tracing::debug!(session_id = %self.state.id, "Peer closed connection");
                return Ok(());
            };

            self.state.stats.record_frame(encoded_len(&frame));
            self.handle_frame(connection, frame).await;
        }
    }

    async fn handle_frame(&mut self, connection: &Connection, frame: Frame) {
        match frame {
            Frame::Text { .. } | Frame::File { .. } => {
                tracing::debug!(
                    session_id = %self.state.id,
                    kind = ?frame.kind(),
                    size = frame.payload_len(),
                    "Relaying"
                );
                self.registry.relay(connection, frame).await;
                self.state.stats.frames_relayed += 1;
            }
            Frame::Login { .. } => self.violation(ProtocolError::DuplicateLogin),
            Frame::Alert { .. } => self.violation(ProtocolError::UnexpectedAlert),
        }
    }

    /// Post-login violations are logged and the frame dropped
    fn violation(&mut self, error: ProtocolError) {
        self.state.stats.violations += 1;
        tracing::warn!(
            session_id = %self.state.id,
            username = self.state.username().unwrap_or_default(),
            error = %error,
            "Ignoring frame"
        );
    }
}

async fn read_with_timeout<R>(
    reader: &mut FrameReader<R>,
    idle_timeout: Option<Duration>,
) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, reader.read_frame())
            .await
            .map_err(|_| Error::Timeout("next frame"))?,
        None => reader.read_frame().await,
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::net::{IpAddr, Ipv4Addr};

    use bytes::Bytes;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    use super::*;
    use crate::error::FrameError;
    use crate::registry::sink::testing::RecordingSink;

    type ClientReader = FrameReader<ReadHalf<DuplexStream>>;
    type ClientWriter = FrameWriter<WriteHalf<DuplexStream>>;

    fn peer() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50_000)
    }

    fn spawn_session(
        registry: &Arc<ConnectionRegistry>,
        id: u64,
        config: ServerConfig,
    ) -> (JoinHandle<Result<()>>, ClientReader, ClientWriter) {
        spawn_session_with_shutdown(registry, id, config, Shutdown::new())
    }

    fn spawn_session_with_shutdown(
        registry: &Arc<ConnectionRegistry>,
        id: u64,
        config: ServerConfig,
        server_shutdown: Shutdown,
    ) -> (JoinHandle<Result<()>>, ClientReader, ClientWriter) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let session = ConnectionSession::new(ConnectionId(id), peer(), config, Arc::clone(registry))
            .with_server_shutdown(server_shutdown);
        let handle = tokio::spawn(session.run_io(server_read, server_write));

        let (client_read, client_write) = tokio::io::split(client);
        (handle, FrameReader::new(client_read), FrameWriter::new(client_write))
    }

    async fn wait_until<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    async fn next_frame(reader: &mut ClientReader) -> Option<Frame> {
        tokio::time::timeout(Duration::from_secs(5), reader.read_frame())
            .await
            .expect("no frame in time")
            .unwrap()
    }

    async fn observer(registry: &ConnectionRegistry) -> Arc<RecordingSink> {
        let sink = RecordingSink::new();
        let conn = Arc::new(Connection::new(ConnectionId(999), "observer", sink.clone()));
        registry.register(conn).await;
        sink
    }

    #[tokio::test]
    async fn test_first_frame_must_be_login() {
        let registry = Arc::new(ConnectionRegistry::new());
        let watcher = observer(&registry).await;
        let (handle, mut reader, mut writer) = spawn_session(&registry, 1, ServerConfig::default());

        writer.write_frame(&Frame::text("alice", "hi")).await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::LoginRequired {
                got: crate::protocol::FrameKind::Text
            }))
        ));
        assert!(!registry.contains(ConnectionId(1)).await);
        assert!(watcher.raw().is_empty());
        // Socket closed without any frame
        assert_eq!(next_frame(&mut reader).await, None);
    }

    #[tokio::test]
    async fn test_empty_username_rejected() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (handle, _reader, mut writer) = spawn_session(&registry, 1, ServerConfig::default());

        writer.write_frame(&Frame::login("")).await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::EmptyUsername))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_first_frame_closes() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (handle, _reader, mut writer) = spawn_session(&registry, 1, ServerConfig::default());

        writer.write_encoded(&[0, 0, 0, 42, 0, 0, 0, 0]).await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(Error::MalformedFrame(FrameError::UnknownKind(42)))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_timeout() {
        let registry = Arc::new(ConnectionRegistry::new());
        let config = ServerConfig::default().login_timeout(Duration::from_millis(50));
        let (handle, _reader, _writer) = spawn_session(&registry, 1, config);

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::Timeout("login"))));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_join_relay_and_leave() {
        let registry = Arc::new(ConnectionRegistry::new());
        let watcher = observer(&registry).await;
        let (handle, _reader, mut writer) = spawn_session(&registry, 1, ServerConfig::default());

        writer.write_frame(&Frame::login("alice")).await.unwrap();
        wait_until(|| {
            let registry = Arc::clone(&registry);
            async move { registry.contains(ConnectionId(1)).await }
        })
        .await;

        // The client-supplied username is replaced by the login name
        writer.write_frame(&Frame::text("someone", "hi")).await.unwrap();
        writer
            .write_frame(&Frame::file("alice", "a.txt", Bytes::from_static(b"abc")))
            .await
            .unwrap();
        writer.shutdown().await.unwrap();

        handle.await.unwrap().unwrap();

        assert_eq!(
            watcher.frames(),
            vec![
                Frame::joined("alice"),
                Frame::text("alice", "hi"),
                Frame::file("alice", "a.txt", Bytes::from_static(b"abc")),
                Frame::left("alice"),
            ]
        );
        assert!(!registry.contains(ConnectionId(1)).await);
    }

    #[tokio::test]
    async fn test_duplicate_login_and_alert_ignored() {
        let registry = Arc::new(ConnectionRegistry::new());
        let watcher = observer(&registry).await;
        let (handle, _reader, mut writer) = spawn_session(&registry, 1, ServerConfig::default());

        writer.write_frame(&Frame::login("alice")).await.unwrap();
        writer.write_frame(&Frame::login("mallory")).await.unwrap();
        writer.write_frame(&Frame::alert("fake notice")).await.unwrap();
        writer.write_frame(&Frame::text("alice", "still here")).await.unwrap();
        writer.shutdown().await.unwrap();

        handle.await.unwrap().unwrap();

        assert_eq!(
            watcher.frames(),
            vec![
                Frame::joined("alice"),
                Frame::text("alice", "still here"),
                Frame::left("alice"),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_after_login_announces_leave() {
        let registry = Arc::new(ConnectionRegistry::new());
        let watcher = observer(&registry).await;
        let config = ServerConfig::default().max_frame_size(64);
        let (handle, _reader, mut writer) = spawn_session(&registry, 1, config);

        writer.write_frame(&Frame::login("alice")).await.unwrap();
        writer.write_frame(&Frame::text("alice", vec![0u8; 128])).await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(Error::MalformedFrame(FrameError::FieldTooLarge { len: 128, max: 64 }))
        ));
        assert_eq!(
            watcher.frames(),
            vec![Frame::joined("alice"), Frame::left("alice")]
        );
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_external_close_interrupts_blocked_read() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (handle, mut reader, mut writer) = spawn_session(&registry, 1, ServerConfig::default());

        writer.write_frame(&Frame::login("alice")).await.unwrap();
        wait_until(|| {
            let registry = Arc::clone(&registry);
            async move { registry.contains(ConnectionId(1)).await }
        })
        .await;

        // The client stays silent; only the close signal can end the read
        registry.close_all().await;

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("session did not stop")
            .unwrap()
            .unwrap();
        assert!(registry.is_empty().await);
        assert_eq!(next_frame(&mut reader).await, None);
    }

    #[tokio::test]
    async fn test_server_shutdown_stops_pending_login() {
        let registry = Arc::new(ConnectionRegistry::new());
        let server_shutdown = Shutdown::new();
        let (handle, mut reader, mut writer) = spawn_session_with_shutdown(
            &registry,
            1,
            ServerConfig::default(),
            server_shutdown.clone(),
        );

        // Still waiting for the login frame when the server stops
        tokio::time::sleep(Duration::from_millis(20)).await;
        server_shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("session did not stop")
            .unwrap();
        assert!(matches!(result, Err(Error::ShuttingDown)));

        // A login arriving afterwards finds the socket closed
        let _ = writer.write_frame(&Frame::login("late")).await;
        assert_eq!(next_frame(&mut reader).await, None);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_server_shutdown_ends_authenticated_session() {
        let registry = Arc::new(ConnectionRegistry::new());
        let watcher = observer(&registry).await;
        let server_shutdown = Shutdown::new();
        let (handle, _reader, mut writer) = spawn_session_with_shutdown(
            &registry,
            1,
            ServerConfig::default(),
            server_shutdown.clone(),
        );

        writer.write_frame(&Frame::login("alice")).await.unwrap();
        wait_until(|| {
            let registry = Arc::clone(&registry);
            async move { registry.contains(ConnectionId(1)).await }
        })
        .await;

        server_shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("session did not stop")
            .unwrap()
            .unwrap();
        assert!(!registry.contains(ConnectionId(1)).await);
        assert_eq!(
            watcher.frames(),
            vec![Frame::joined("alice"), Frame::left("alice")]
        );
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let registry = Arc::new(ConnectionRegistry::new());
        let watcher = observer(&registry).await;
        let config = ServerConfig::default().idle_timeout(Duration::from_millis(50));
        let (handle, _reader, mut writer) = spawn_session(&registry, 1, config);

        writer.write_frame(&Frame::login("alice")).await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::Timeout("next frame"))));
        assert_eq!(
            watcher.frames(),
            vec![Frame::joined("alice"), Frame::left("alice")]
        );
    }

    #[tokio::test]
    async fn test_two_sessions_exchange_messages() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (alice_task, mut alice_rx, mut alice_tx) =
            spawn_session(&registry, 1, ServerConfig::default());
        let (bob_task, mut bob_rx, mut bob_tx) = spawn_session(&registry, 2, ServerConfig::default());

        alice_tx.write_frame(&Frame::login("alice")).await.unwrap();
        wait_until(|| {
            let registry = Arc::clone(&registry);
            async move { registry.len().await == 1 }
        })
        .await;

        bob_tx.write_frame(&Frame::login("bob")).await.unwrap();
        assert_eq!(next_frame(&mut alice_rx).await, Some(Frame::joined("bob")));

        alice_tx.write_frame(&Frame::text("alice", "hi")).await.unwrap();
        assert_eq!(next_frame(&mut bob_rx).await, Some(Frame::text("alice", "hi")));

        alice_tx.shutdown().await.unwrap();
        alice_task.await.unwrap().unwrap();
        assert_eq!(next_frame(&mut bob_rx).await, Some(Frame::left("alice")));

        bob_tx.shutdown().await.unwrap();
        bob_task.await.unwrap().unwrap();

        // Alice's own stream carried only bob's join notice
        assert_eq!(next_frame(&mut alice_rx).await, None);
    }
}
