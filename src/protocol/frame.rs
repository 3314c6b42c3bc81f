//! Frame types
//!
//! A [`Frame`] is the unit exchanged on the wire. Byte payloads are held as
//! `bytes::Bytes` so a decoded body can be relayed without copying.

use bytes::Bytes;

use super::constants::{KIND_ALERT, KIND_FILE, KIND_LOGIN, KIND_TEXT};
use crate::error::FrameError;

/// Discriminant of a frame, as carried in the 4-byte kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Login,
    Text,
    File,
    Alert,
}

impl FrameKind {
    /// Map a wire tag to a kind
    pub fn from_tag(tag: u32) -> Result<Self, FrameError> {
        match tag {
            KIND_LOGIN => Ok(FrameKind::Login),
            KIND_TEXT => Ok(FrameKind::Text),
            KIND_FILE => Ok(FrameKind::File),
            KIND_ALERT => Ok(FrameKind::Alert),
            other => Err(FrameError::UnknownKind(other)),
        }
    }

    /// Wire tag for this kind
    pub fn tag(self) -> u32 {
        match self {
            FrameKind::Login => KIND_LOGIN,
            FrameKind::Text => KIND_TEXT,
            FrameKind::File => KIND_FILE,
            FrameKind::Alert => KIND_ALERT,
        }
    }

    /// Number of length-prefixed fields following the tag
    pub fn field_count(self) -> usize {
        match self {
            FrameKind::Login | FrameKind::Alert => 1,
            FrameKind::Text => 2,
            FrameKind::File => 3,
        }
    }
}

/// One protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Announces a new participant; must be the first frame a client sends
    Login { username: String },

    /// Chat message. An empty body is still a valid frame.
    Text { username: String, body: Bytes },

    /// File attachment. Empty `filename` means no file, and then `contents`
    /// must be empty too.
    File {
        username: String,
        filename: String,
        contents: Bytes,
    },

    /// Server-originated notice with no sender
    Alert { text: String },
}

impl Frame {
    /// Create a login frame
    pub fn login(username: impl Into<String>) -> Self {
        Frame::Login {
            username: username.into(),
        }
    }

    /// Create a text frame
    pub fn text(username: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Frame::Text {
            username: username.into(),
            body: body.into(),
        }
    }

    /// Create a file frame
    pub fn file(
        username: impl Into<String>,
        filename: impl Into<String>,
        contents: impl Into<Bytes>,
    ) -> Self {
        Frame::File {
            username: username.into(),
            filename: filename.into(),
            contents: contents.into(),
        }
    }

    /// Create an alert frame
    pub fn alert(text: impl Into<String>) -> Self {
        Frame::Alert { text: text.into() }
    }

    /// Join notice for `username`
    pub fn joined(username: &str) -> Self {
        Self::alert(format!("{} has entered the chat!", username))
    }

    /// Leave notice for `username`
    pub fn left(username: &str) -> Self {
        Self::alert(format!("{} has left the chat!", username))
    }

    /// Kind of this frame
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Login { .. } => FrameKind::Login,
            Frame::Text { .. } => FrameKind::Text,
            Frame::File { .. } => FrameKind::File,
            Frame::Alert { .. } => FrameKind::Alert,
        }
    }

    /// Sender username, if the frame has one
    pub fn username(&self) -> Option<&str> {
        match self {
            Frame::Login { username }
            | Frame::Text { username, .. }
            | Frame::File { username, .. } => Some(username),
            Frame::Alert { .. } => None,
        }
    }

    /// Return the same frame attributed to `username`. Alerts are unchanged.
    pub fn with_username(self, username: &str) -> Self {
        match self {
            Frame::Login { .. } => Frame::login(username),
            Frame::Text { body, .. } => Frame::Text {
                username: username.to_owned(),
                body,
            },
            Frame::File {
                filename, contents, ..
            } => Frame::File {
                username: username.to_owned(),
                filename,
                contents,
            },
            alert @ Frame::Alert { .. } => alert,
        }
    }

    /// Check the filename/contents coupling of `File` frames
    pub fn validate(&self) -> Result<(), FrameError> {
        if let Frame::File {
            filename, contents, ..
        } = self
        {
            if filename.is_empty() != contents.is_empty() {
                return Err(FrameError::FileMismatch {
                    filename_len: filename.len(),
                    contents_len: contents.len(),
                });
            }
        }
        Ok(())
    }

    /// Sum of field lengths, excluding tag and prefixes
    pub fn payload_len(&self) -> usize {
        match self {
            Frame::Login { username } => username.len(),
            Frame::Text { username, body } => username.len() + body.len(),
            Frame::File {
                username,
                filename,
                contents,
            } => username.len() + filename.len() + contents.len(),
            Frame::Alert { text } => text.len(),
        }
    }
}
