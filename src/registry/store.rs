//! Connection registry implementation
//!
//! The single source of truth for who is reachable, and the only place that
//! fans frames out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::entry::{Connection, ConnectionId};
use crate::protocol::{encode, Frame};
use crate::stats::RegistryStats;

/// Outcome of one broadcast call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients whose sink accepted the frame
    pub delivered: usize,
    /// Recipients removed because their sink refused it
    pub dropped: usize,
}

#[derive(Default)]
struct Counters {
    registered: AtomicU64,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    dropped: AtomicU64,
}

/// Registry of live connections
///
/// `register` and `unregister` take the write lock. `broadcast` walks the
/// member set under the read lock, so every call sees one consistent
/// snapshot and never a half-applied membership change.
pub struct ConnectionRegistry {
    members: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    counters: Counters,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Add an authenticated connection
    pub async fn register(&self, connection: Arc<Connection>) {
        let mut members = self.members.write().await;

        connection.set_live(true);
        if let Some(previous) = members.insert(connection.id(), Arc::clone(&connection)) {
            if !Arc::ptr_eq(&previous, &connection) {
                previous.set_live(false);
            }
        } else {
            self.counters.registered.fetch_add(1, Ordering::Relaxed);
        }

        tracing::info!(
            session_id = %connection.id(),
            username = %connection.username(),
            members = members.len(),
            "Connection registered"
        );
    }

    /// Remove a connection
    ///
    /// Idempotent: removing an absent connection returns `None` and has no
    /// other effect.
    pub async fn unregister(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut members = self.members.write().await;

        let removed = members.remove(&id)?;
        removed.set_live(false);

        tracing::info!(
            session_id = %id,
            username = %removed.username(),
            members = members.len(),
            "Connection unregistered"
        );

        Some(removed)
    }

    /// Send `frame` to every member except `exclude`
    ///
    /// The frame is encoded once and the same reference-counted bytes are
    /// queued on each sink. A member whose sink refuses the frame is removed
    /// and asked to close; delivery to the others carries on.
    pub async fn broadcast(&self, frame: &Frame, exclude: Option<ConnectionId>) -> BroadcastReport {
        let encoded = encode(frame);
        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();

        {
            let members = self.members.read().await;
            for (id, connection) in members.iter() {
                if Some(*id) == exclude {
                    continue;
                }

                match connection.send(encoded.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        tracing::warn!(
                            session_id = %id,
                            username = %connection.username(),
                            error = %e,
                            "Dropping unreachable recipient"
                        );
                        failed.push(*id);
                    }
                }
            }
        }

        if !failed.is_empty() {
            let mut members = self.members.write().await;
            for id in &failed {
                if let Some(connection) = members.remove(id) {
                    connection.set_live(false);
                    connection.close();
                    report.dropped += 1;
                }
            }
        }

        self.counters.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.counters
            .deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.counters
            .dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);

        tracing::debug!(
            kind = ?frame.kind(),
            exclude = ?exclude,
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast"
        );

        report
    }

    /// Relay a chat frame from `from` to everyone else
    ///
    /// The frame is attributed to the sender's login name whatever username
    /// the client put in it.
    pub async fn relay(&self, from: &Connection, frame: Frame) -> BroadcastReport {
        let frame = frame.with_username(from.username());
        self.broadcast(&frame, Some(from.id())).await
    }

    /// Tell everyone except the joiner that it has arrived
    pub async fn announce_join(&self, connection: &Connection) -> BroadcastReport {
        self.broadcast(&Frame::joined(connection.username()), Some(connection.id()))
            .await
    }

    /// Tell the remaining members that `connection` left
    ///
    /// Sent at most once per connection; later calls return `None`.
    pub async fn announce_leave(&self, connection: &Connection) -> Option<BroadcastReport> {
        if !connection.claim_leave_announcement() {
            return None;
        }
        let report = self
            .broadcast(&Frame::left(connection.username()), Some(connection.id()))
            .await;
        Some(report)
    }

    /// Close every member's sink
    ///
    /// Each session notices, unregisters itself and announces its leave.
    pub async fn close_all(&self) {
        let members = self.members.read().await;
        for connection in members.values() {
            connection.close();
        }
        tracing::info!(members = members.len(), "Closing all connections");
    }

    /// Number of members
    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    /// Whether there are no members
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    /// Whether `id` is a member
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.read().await.contains_key(&id)
    }

    /// Sorted usernames of all members (may contain duplicates)
    pub async fn usernames(&self) -> Vec<String> {
        let members = self.members.read().await;
        let mut names: Vec<String> = members
            .values()
            .map(|c| c.username().to_owned())
            .collect();
        names.sort();
        names
    }

    /// Snapshot of the counters
    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_connections: self.len().await,
            total_registered: self.counters.registered.load(Ordering::Relaxed),
            broadcasts: self.counters.broadcasts.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            dropped_recipients: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
