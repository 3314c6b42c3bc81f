//! Chat client implementation
//!
//! Provides the client side of the relay protocol:
//! - Logging in and sending text and file frames
//! - Receiving relayed frames and alerts through a callback
//! - Reading attachments from disk and saving received ones

pub mod attachment;
pub mod chat;
pub mod config;

pub use attachment::{read_attachment, save_attachment, Attachment};
pub use chat::ChatClient;
pub use config::ClientConfig;
