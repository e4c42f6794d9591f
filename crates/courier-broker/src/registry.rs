//! The shared connection and topic registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use courier_protocol::Frame;
use courier_transport::ConnectionId;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Counter for `message-id` headers. Shared by every broker in the
/// process so ids stay unique even across test servers.
static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Frames a connection may have queued before it counts as a slow
/// consumer.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// Channel sender for delivering frames to one connection's writer.
pub type OutboundSender = mpsc::Sender<Frame>;

/// The receiving half, owned by the connection's dispatcher.
pub type OutboundReceiver = mpsc::Receiver<Frame>;

/// Creates the outbound channel for a new connection, holding at most
/// `capacity` undelivered frames.
pub fn outbound_channel(
    capacity: usize,
) -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(capacity.max(1))
}

fn next_message_id() -> u64 {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Routes frames to connections and fans messages out to topics.
///
/// # Locking
///
/// Both maps are [`DashMap`]s, so operations on different connections or
/// different topics run in parallel. A topic's subscriber map is only
/// ever touched while its shard lock is held, so no caller can observe a
/// half-updated subscriber set. No lock is held while a frame is queued.
///
/// A topic entry exists only while it has at least one subscriber.
///
/// # Slow consumers
///
/// Outbound queues are bounded. A connection whose queue is full when a
/// frame arrives is unregistered on the spot: the frame is dropped, the
/// connection leaves every topic, and its writer sees the channel close
/// once it has drained what was already queued.
#[derive(Debug, Default)]
pub struct Broker {
    connections: DashMap<ConnectionId, OutboundSender>,
    /// topic → (connection → subscription id on that connection)
    topics: DashMap<String, HashMap<ConnectionId, String>>,
}

impl Broker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection's outbound channel. Replaces any previous
    /// sender registered under the same id.
    pub fn register(&self, conn: ConnectionId, sender: OutboundSender) {
        self.connections.insert(conn, sender);
        tracing::debug!(%conn, "connection registered");
    }

    /// Removes a connection and purges it from every topic, dropping
    /// topics left without subscribers.
    pub fn unregister(&self, conn: ConnectionId) {
        self.connections.remove(&conn);
        self.topics.retain(|topic, subscribers| {
            if subscribers.remove(&conn).is_some() && subscribers.is_empty() {
                tracing::debug!(%topic, "topic emptied");
            }
            !subscribers.is_empty()
        });
        tracing::debug!(%conn, "connection unregistered");
    }

    /// Queues `frame` for one connection without waiting.
    ///
    /// Returns `false` if the connection is unknown, its writer is gone,
    /// or its queue is full. A full queue also evicts the connection.
    pub fn send_to_connection(
        &self,
        conn: ConnectionId,
        frame: Frame,
    ) -> bool {
        // The map guard must be gone before eviction touches the map.
        let sent = match self.connections.get(&conn) {
            Some(sender) => sender.try_send(frame),
            None => {
                tracing::trace!(%conn, "send to unknown connection dropped");
                return false;
            }
        };
        match sent {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%conn, "outbound queue full, evicting");
                self.unregister(conn);
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(%conn, "outbound channel closed");
                false
            }
        }
    }

    /// Delivers one copy of `frame` to every subscriber of `topic`.
    ///
    /// Each copy carries the receiver's own `subscription` header and a
    /// fresh `message-id`. Returns the number of copies queued.
    pub fn broadcast(&self, topic: &str, frame: &Frame) -> usize {
        // Snapshot, then deliver with the shard lock released.
        let targets: Vec<(ConnectionId, String)> = match self.topics.get(topic)
        {
            Some(subscribers) => subscribers
                .iter()
                .map(|(conn, sub_id)| (*conn, sub_id.clone()))
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for (conn, sub_id) in targets {
            let mut copy = frame.clone();
            copy.set_header("subscription", sub_id);
            copy.set_header("message-id", next_message_id().to_string());
            if self.send_to_connection(conn, copy) {
                delivered += 1;
            }
        }
        tracing::debug!(%topic, delivered, "broadcast");
        delivered
    }

    /// Records that `conn` receives `topic` under `sub_id`. Subscribing
    /// again overwrites the stored id.
    pub fn subscribe(&self, topic: &str, conn: ConnectionId, sub_id: &str) {
        self.topics
            .entry(topic.to_string())
            .or_default()
            .insert(conn, sub_id.to_string());
        tracing::debug!(%conn, %topic, sub_id, "subscribed");
    }

    /// Stops delivering `topic` to `conn`. Removes the topic if that was
    /// its last subscriber. Unknown pairs are ignored.
    pub fn unsubscribe(&self, topic: &str, conn: ConnectionId) {
        let removed = self.topics.remove_if_mut(topic, |_, subscribers| {
            subscribers.remove(&conn);
            subscribers.is_empty()
        });
        if removed.is_some() {
            tracing::debug!(%topic, "topic emptied");
        }
        tracing::debug!(%conn, %topic, "unsubscribed");
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Number of connections subscribed to `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |subs| subs.len())
    }

    /// The subscription id `conn` holds on `topic`, if any.
    pub fn subscription_id(
        &self,
        topic: &str,
        conn: ConnectionId,
    ) -> Option<String> {
        self.topics.get(topic)?.get(&conn).cloned()
    }

    pub fn is_registered(&self, conn: ConnectionId) -> bool {
        self.connections.contains_key(&conn)
    }
}
