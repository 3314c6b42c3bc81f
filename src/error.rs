//! Error types
//!
//! One crate-wide [`Error`] plus the two domain enums it wraps: [`FrameError`]
//! for framing violations found by the codec and [`ProtocolError`] for
//! well-formed frames that arrive at the wrong point of the session.

use thiserror::Error;

use crate::protocol::FrameKind;

/// Crate result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, Error)]
pub enum Error {
    /// Socket level failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream violated the framing contract
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    /// A valid frame arrived where the session state does not allow it
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// Peer closed the connection or the outbound side failed
    #[error("connection closed")]
    ConnectionClosed,

    /// An operation did not complete in time
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The server stopped before the session finished
    #[error("server is shutting down")]
    ShuttingDown,

    /// Client API used before connecting or after disconnecting
    #[error("not connected")]
    NotConnected,

    /// `on_frame` was already installed for this client
    #[error("a frame listener is already running")]
    AlreadyListening,
}

/// Decode-time violations of the wire format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Kind tag does not name any frame variant
    #[error("unknown frame kind tag {0}")]
    UnknownKind(u32),

    /// A single field declared more bytes than allowed
    #[error("field length {len} exceeds maximum frame size {max}")]
    FieldTooLarge { len: usize, max: usize },

    /// Sum of field lengths exceeds the maximum
    #[error("frame payload {size} exceeds maximum frame size {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Stream ended before the declared bytes arrived
    #[error("stream ended mid-frame ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    /// Extra bytes after a complete frame in a one-shot decode
    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    /// A string field was not UTF-8
    #[error("field `{0}` is not valid UTF-8")]
    InvalidUtf8(&'static str),

    /// `filename` and `contents` must be both empty or both non-empty
    #[error("file frame has filename of {filename_len} bytes but contents of {contents_len} bytes")]
    FileMismatch {
        filename_len: usize,
        contents_len: usize,
    },
}

/// State machine violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// First frame on a connection must be `Login`
    #[error("expected login, got {got:?}")]
    LoginRequired { got: FrameKind },

    /// `Login` after the session is already authenticated
    #[error("duplicate login")]
    DuplicateLogin,

    /// Login with an empty username
    #[error("username must not be empty")]
    EmptyUsername,

    /// Clients may not originate alerts
    #[error("alert frames are server-originated")]
    UnexpectedAlert,

    /// Outgoing file frame breaks the filename/contents coupling
    #[error("file frame needs both a filename and non-empty contents")]
    InvalidFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_converts() {
        let err: Error = FrameError::UnknownKind(9).into();
        assert!(matches!(err, Error::MalformedFrame(FrameError::UnknownKind(9))));
        assert_eq!(err.to_string(), "malformed frame: unknown frame kind tag 9");
    }

    #[test]
    fn test_protocol_error_display() {
        let err: Error = ProtocolError::LoginRequired {
            got: FrameKind::Text,
        }
        .into();
        assert_eq!(err.to_string(), "protocol violation: expected login, got Text");
    }
}
