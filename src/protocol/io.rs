//! Async frame reader and writer
//!
//! Thin adapters between a byte stream and the codec. The reader keeps
//! partially received frames in its buffer across calls, so `read_frame` is
//! safe to race in `tokio::select!`.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::codec::{encode_into, FrameCodec};
use super::constants::READ_CHUNK_SIZE;
use super::frame::Frame;
use crate::error::{FrameError, Result};

/// Reads frames from an async byte stream
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    codec: FrameCodec,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader with the default codec
    pub fn new(inner: R) -> Self {
        Self::with_codec(inner, FrameCodec::new())
    }

    /// Wrap a reader with a specific codec
    pub fn with_codec(inner: R, codec: FrameCodec) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            codec,
        }
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` when the peer closes the stream on a frame
    /// boundary. A close in the middle of a frame is a malformed frame.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buf)? {
                return Ok(Some(frame));
            }

            self.buf.reserve(READ_CHUNK_SIZE);
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(FrameError::Truncated {
                    buffered: self.buf.len(),
                }
                .into());
            }
        }
    }
}

/// Writes frames to an async byte stream
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
        }
    }

    /// Encode and write one frame, then flush
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_into(frame, &mut self.buf);
        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Write bytes that are already a complete encoded frame
    pub async fn write_encoded(&mut self, encoded: &[u8]) -> Result<()> {
        self.inner.write_all(encoded).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
