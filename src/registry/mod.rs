//! Connection registry for broadcast routing
//!
//! The registry tracks authenticated connections and fans frames out to
//! them. It sees each connection only through a [`FrameSink`], so it has no
//! dependency on sockets or sessions.
//!
//! # Architecture
//!
//! ```text
//!                     Arc<ConnectionRegistry>
//!                ┌──────────────────────────────┐
//!                │ members: RwLock<HashMap<Id,  │
//!                │   Connection {               │
//!                │     username,                │
//!                │     sink: Arc<dyn FrameSink>,│
//!                │     live,                    │
//!                │   }                          │
//!                │ >>                           │
//!                └──────────────┬───────────────┘
//!                               │
//!        ┌──────────────────────┼──────────────────────┐
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//!    [Session A]           [Session B]            [Session C]
//!    read_frame()          outbound rx            outbound rx
//!        │                      │                      │
//!        └──► registry.relay() ─┴─► sink.send() ──► writer task ──► TCP
//! ```
//!
//! # Encoding Once
//!
//! A broadcast encodes its frame into one `bytes::Bytes`. Every recipient
//! queue gets a reference-counted clone of the same allocation.

pub mod entry;
pub mod sink;
pub mod store;

pub use entry::{Connection, ConnectionId};
pub use sink::{FrameSink, SinkError};
pub use store::{BroadcastReport, ConnectionRegistry};
