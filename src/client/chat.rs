//! Chat client
//!
//! Logs in on connect, sends text and file frames, and hands inbound frames
//! to a callback running on its own task.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::config::ClientConfig;
use crate::error::{Error, FrameError, ProtocolError, Result};
use crate::protocol::{Frame, FrameCodec, FrameReader, FrameWriter};

/// Connected chat client
///
/// # Example
/// ```no_run
/// use chat_relay::client::{ChatClient, ClientConfig};
/// use chat_relay::protocol::Frame;
///
/// # async fn example() -> chat_relay::error::Result<()> {
/// let mut client = ChatClient::connect(ClientConfig::localhost("alice")).await?;
///
/// client.on_frame(|frame| match frame {
///     Frame::Text { username, body } => {
///         println!("{}: {}", username, String::from_utf8_lossy(&body));
///     }
///     Frame::Alert { text } => println!("* {}", text),
///     _ => {}
/// })?;
///
/// client.send_text("hello").await?;
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct ChatClient {
    config: ClientConfig,
    local_addr: SocketAddr,
    writer: Arc<Mutex<Option<FrameWriter<OwnedWriteHalf>>>>,
    reader: Option<FrameReader<OwnedReadHalf>>,
}

impl ChatClient {
    /// Connect to the server and log in
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        if config.username.is_empty() {
            return Err(ProtocolError::EmptyUsername.into());
        }

        let socket = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(config.server_addr.as_str()),
        )
        .await
        .map_err(|_| Error::Timeout("connect"))??;

        if config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        let local_addr = socket.local_addr()?;

        let (read_half, write_half) = socket.into_split();
        let reader = FrameReader::with_codec(
            read_half,
            FrameCodec::with_max_frame_size(config.max_frame_size),
        );
        let mut writer = FrameWriter::new(write_half);

        writer.write_frame(&Frame::login(config.username.as_str())).await?;

        tracing::info!(
            server = %config.server_addr,
            username = %config.username,
            "Logged in"
        );

        Ok(Self {
            config,
            local_addr,
            writer: Arc::new(Mutex::new(Some(writer))),
            reader: Some(reader),
        })
    }

    /// Name this client logged in with
    pub fn username(&self) -> &str {
        &self.config.username
    }

    /// Local socket address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a text message
    pub async fn send_text(&self, body: impl Into<Bytes>) -> Result<()> {
        let frame = Frame::text(self.config.username.as_str(), body);
        self.send(&frame).await
    }

    /// Send a file
    ///
    /// `filename` and `contents` must both be empty or both non-empty, and
    /// the frame must fit in `max_frame_size`.
    pub async fn send_file(
        &self,
        filename: impl Into<String>,
        contents: impl Into<Bytes>,
    ) -> Result<()> {
        let frame = Frame::file(self.config.username.as_str(), filename, contents);
        frame.validate().map_err(|_| ProtocolError::InvalidFile)?;
        self.send(&frame).await
    }

    /// Frames over `max_frame_size` are refused here; the server would
    /// drop the connection on receiving one
    async fn send(&self, frame: &Frame) -> Result<()> {
        let size = frame.payload_len();
        if size > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size,
                max: self.config.max_frame_size,
            }
            .into());
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::NotConnected)?;
        writer.write_frame(frame).await
    }

    /// Start the receive loop
    ///
    /// `callback` runs on the spawned task once per inbound text, file or
    /// alert frame. The task ends with `Ok(())` when the server closes the
    /// connection. Only one callback can be installed.
    pub fn on_frame<F>(&mut self, mut callback: F) -> Result<JoinHandle<Result<()>>>
    where
        F: FnMut(Frame) + Send + 'static,
    {
        let mut reader = self.reader.take().ok_or(Error::AlreadyListening)?;
        let username = self.config.username.clone();

        Ok(tokio::spawn(async move {
            while let Some(frame) = reader.read_frame().await? {
                match frame {
                    Frame::Login { .. } => {
                        tracing::warn!(username = %username, "Ignoring login frame from server");
                    }
                    frame => callback(frame),
                }
            }

            tracing::debug!(username = %username, "Server closed connection");
            Ok::<(), Error>(())
        }))
    }

    /// Close the sending side
    ///
    /// The server sees end of stream and announces the leave. Frames the
    /// server queued for this client before then are still written out and
    /// delivered to the callback, within the server's flush timeout.
    pub async fn disconnect(&self) -> Result<()> {
        let writer = self.writer.lock().await.take();
        match writer {
            Some(mut writer) => {
                writer.shutdown().await?;
                tracing::info!(username = %self.config.username, "Disconnected");
                Ok(())
            }
            None => Err(Error::NotConnected),
        }
    }
}
