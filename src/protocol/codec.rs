//! Length-prefixed frame codec
//!
//! Wire layout, all integers big-endian u32:
//!
//! ```text
//! Login: [kind=1][usernameLen][username]
//! Text:  [kind=2][usernameLen][username][bodyLen][body]
//! File:  [kind=3][usernameLen][username][filenameLen][filename][contentLen][content]
//! Alert: [kind=4][textLen][text]
//! ```
//!
//! Decoding is resumable: [`FrameCodec::decode`] leaves the buffer untouched
//! until a whole frame is present. Every length prefix is checked against the
//! configured maximum as soon as it is visible, so a hostile length is rejected
//! before any memory is reserved for it.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::{DEFAULT_MAX_FRAME_SIZE, PREFIX_SIZE};
use super::frame::{Frame, FrameKind};
use crate::error::FrameError;

/// Encode a frame into a fresh buffer
pub fn encode(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(frame));
    encode_into(frame, &mut buf);
    buf.freeze()
}

/// Exact number of bytes `encode` produces for `frame`
pub fn encoded_len(frame: &Frame) -> usize {
    PREFIX_SIZE * (1 + frame.kind().field_count()) + frame.payload_len()
}

/// Append the encoding of `frame` to `buf`
pub fn encode_into(frame: &Frame, buf: &mut BytesMut) {
    buf.reserve(encoded_len(frame));
    buf.put_u32(frame.kind().tag());

    match frame {
        Frame::Login { username } => put_field(buf, username.as_bytes()),
        Frame::Text { username, body } => {
            put_field(buf, username.as_bytes());
            put_field(buf, body);
        }
        Frame::File {
            username,
            filename,
            contents,
        } => {
            put_field(buf, username.as_bytes());
            put_field(buf, filename.as_bytes());
            put_field(buf, contents);
        }
        Frame::Alert { text } => put_field(buf, text.as_bytes()),
    }
}

/// Decode exactly one frame from `data` using the default size limit
pub fn decode(data: &[u8]) -> Result<Frame, FrameError> {
    FrameCodec::new().decode_exact(data)
}

fn put_field(buf: &mut BytesMut, data: &[u8]) {
    debug_assert!(data.len() <= u32::MAX as usize);
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Frame decoder with a size limit
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec with the default 32 MiB limit
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a codec with a custom limit on the summed field lengths
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Get the size limit
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Decode one frame from the front of `buf`
    ///
    /// Returns `Ok(None)` without consuming anything while the frame is
    /// incomplete. On success exactly the frame's bytes are consumed.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let len = match self.frame_len(buf)? {
            Some(len) => len,
            None => return Ok(None),
        };

        let mut data = buf.split_to(len).freeze();
        let kind = FrameKind::from_tag(data.get_u32())?;

        let frame = match kind {
            FrameKind::Login => {
                let username = take_string(&mut data, "username")?;
                Frame::Login { username }
            }
            FrameKind::Text => {
                let username = take_string(&mut data, "username")?;
                let body = take_bytes(&mut data);
                Frame::Text { username, body }
            }
            FrameKind::File => {
                let username = take_string(&mut data, "username")?;
                let filename = take_string(&mut data, "filename")?;
                let contents = take_bytes(&mut data);
                Frame::File {
                    username,
                    filename,
                    contents,
                }
            }
            FrameKind::Alert => {
                let text = take_string(&mut data, "text")?;
                Frame::Alert { text }
            }
        };

        frame.validate()?;
        Ok(Some(frame))
    }

    /// Decode a slice that must hold exactly one frame
    pub fn decode_exact(&self, data: &[u8]) -> Result<Frame, FrameError> {
        let mut buf = BytesMut::from(data);
        match self.decode(&mut buf)? {
            Some(frame) if buf.is_empty() => Ok(frame),
            Some(_) => Err(FrameError::TrailingBytes(buf.len())),
            None => Err(FrameError::Truncated {
                buffered: data.len(),
            }),
        }
    }

    /// Total encoded length of the frame at the front of `buf`, if all of
    /// it has arrived
    fn frame_len(&self, buf: &[u8]) -> Result<Option<usize>, FrameError> {
        if buf.len() < PREFIX_SIZE {
            return Ok(None);
        }

        let kind = FrameKind::from_tag(read_u32(buf, 0))?;
        let mut offset = PREFIX_SIZE;
        let mut payload = 0usize;

        for _ in 0..kind.field_count() {
            if buf.len() < offset + PREFIX_SIZE {
                return Ok(None);
            }

            let len = read_u32(buf, offset) as usize;
            if len > self.max_frame_size {
                return Err(FrameError::FieldTooLarge {
                    len,
                    max: self.max_frame_size,
                });
            }

            payload += len;
            if payload > self.max_frame_size {
                return Err(FrameError::FrameTooLarge {
                    size: payload,
                    max: self.max_frame_size,
                });
            }

            offset += PREFIX_SIZE + len;
        }

        if buf.len() < offset {
            return Ok(None);
        }
        Ok(Some(offset))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn take_bytes(data: &mut Bytes) -> Bytes {
    let len = data.get_u32() as usize;
    data.split_to(len)
}

fn take_string(data: &mut Bytes, field: &'static str) -> Result<String, FrameError> {
    let raw = take_bytes(data);
    String::from_utf8(raw.to_vec()).map_err(|_| FrameError::InvalidUtf8(field))
}
