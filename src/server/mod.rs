//! Chat relay server
//!
//! Accepts TCP connections and runs one session per client against a shared
//! connection registry.

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::ChatServer;
