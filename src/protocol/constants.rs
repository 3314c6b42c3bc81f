//! Wire protocol constants

/// Kind tag for `Login`
pub const KIND_LOGIN: u32 = 1;

/// Kind tag for `Text`
pub const KIND_TEXT: u32 = 2;

/// Kind tag for `File`
pub const KIND_FILE: u32 = 3;

/// Kind tag for `Alert`
pub const KIND_ALERT: u32 = 4;

/// Size of the kind tag and of every field length prefix
pub const PREFIX_SIZE: usize = 4;

/// Default cap on the payload of a single frame (32 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Default server port
pub const DEFAULT_PORT: u16 = 9999;

/// Read buffer growth step for `FrameReader`
pub const READ_CHUNK_SIZE: usize = 8 * 1024;
