//! chat-relay: group chat over a length-prefixed TCP protocol
//!
//! Clients log in with a username, then send text messages and files. The
//! server relays every chat frame to all other logged-in clients and
//! announces joins and leaves with alert frames.
//!
//! # Example
//! ```no_run
//! use chat_relay::{ChatServer, ServerConfig};
//!
//! # async fn example() -> chat_relay::error::Result<()> {
//! let config = ServerConfig::default().max_connections(100);
//! let server = ChatServer::new(config);
//!
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`protocol`]: frame types, codec and async frame IO
//! - [`registry`]: the set of live connections and broadcast
//! - [`session`]: per-connection login, relay loop and writer task
//! - [`server`]: listener and configuration
//! - [`client`]: client API and attachment helpers
//! - [`stats`]: counters

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use client::{ChatClient, ClientConfig};
pub use error::{Error, Result};
pub use protocol::{Frame, FrameKind};
pub use registry::ConnectionRegistry;
pub use server::{ChatServer, ServerConfig};
