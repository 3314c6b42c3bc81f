//! Wire protocol
//!
//! Frames are a 4-byte kind tag followed by length-prefixed fields. See
//! [`codec`] for the exact layout.

pub mod codec;
pub mod constants;
pub mod frame;
pub mod io;

pub use codec::{decode, encode, encode_into, encoded_len, FrameCodec};
pub use frame::{Frame, FrameKind};
pub use io::{FrameReader, FrameWriter};
