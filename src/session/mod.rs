//! Chat session handling
//!
//! A session owns one client socket: it waits for the login frame, registers
//! the connection, relays chat frames through the registry and announces the
//! leave when the socket goes away.

pub mod connection;
pub mod outbound;
pub mod state;

pub use connection::ConnectionSession;
pub use outbound::{drive_outbound, OutboundQueue, Shutdown};
pub use state::{SessionPhase, SessionState};
