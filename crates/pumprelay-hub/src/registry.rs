//! `SubscriptionRegistry` — open downstream connections and their topics.
//!
//! Thread-safe via `Arc<RwLock<Inner>>`. Two indexes are kept in step:
//! topic → connections (for fan-out) and connection → topics (so removing a
//! connection only touches its own topics). A topic whose set becomes empty
//! is dropped.

use crate::error::{DeliveryError, SubscribeError};
use crate::topic::TopicRule;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{mpsc, Notify};
use tracing::debug;

/// Identity of a downstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

/// Sending side of a downstream connection, shared by the registry and the
/// broadcaster. The connection's own task holds the matching receiver.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<Arc<str>>,
    signal: Arc<CloseSignal>,
}

impl ConnectionHandle {
    fn new(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            outbound,
            signal: Arc::new(CloseSignal::default()),
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message without waiting.
    pub fn try_deliver(&self, message: Arc<str>) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Ask the connection's task to close the socket.
    pub fn close(&self) {
        if !self.signal.closed.swap(true, Ordering::AcqRel) {
            self.signal.notify.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.signal.closed.load(Ordering::Acquire)
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.signal.notify.notified().await;
    }
}

struct Entry {
    handle: ConnectionHandle,
    topics: HashSet<String>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Entry>,
    topics: HashMap<String, HashSet<ConnectionId>>,
    /// Set by `close_all`; later registrations are closed on arrival
    shut_down: bool,
}

impl Inner {
    fn detach(&mut self, topic: &str, id: ConnectionId) -> bool {
        let Some(members) = self.topics.get_mut(topic) else {
            return false;
        };
        let removed = members.remove(&id);
        if members.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    fn handles<'a>(&self, ids: impl IntoIterator<Item = &'a ConnectionId>) -> Vec<ConnectionHandle> {
        ids.into_iter()
            .filter_map(|id| self.connections.get(id))
            .map(|e| e.handle.clone())
            .collect()
    }
}

/// Thread-safe registry of downstream connections and topic subscriptions.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RwLock<Inner>>,
    rule: Arc<TopicRule>,
    next_id: Arc<AtomicU64>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(TopicRule::default())
    }
}

impl SubscriptionRegistry {
    pub fn new(rule: TopicRule) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            rule: Arc::new(rule),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn rule(&self) -> &TopicRule {
        &self.rule
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a newly accepted connection with an outbound queue of
    /// `capacity` messages. The caller owns the returned receiver.
    ///
    /// After [`close_all`](Self::close_all) the handle comes back already
    /// closed and is not recorded.
    pub fn register(&self, capacity: usize) -> (ConnectionHandle, mpsc::Receiver<Arc<str>>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (handle, rx) = ConnectionHandle::new(id, capacity);

        let mut inner = self.write();
        if inner.shut_down {
            drop(inner);
            handle.close();
            debug!(connection = %id, "rejected, registry is shut down");
            return (handle, rx);
        }
        inner.connections.insert(
            id,
            Entry {
                handle: handle.clone(),
                topics: HashSet::new(),
            },
        );
        drop(inner);

        debug!(connection = %id, "registered");
        (handle, rx)
    }

    /// Subscribe `id` to `topic`. Subscribing twice is a no-op.
    pub fn subscribe(&self, topic: &str, id: ConnectionId) -> Result<(), SubscribeError> {
        self.rule.validate(topic)?;

        let mut inner = self.write();
        let entry = inner
            .connections
            .get_mut(&id)
            .filter(|e| !e.handle.is_closed())
            .ok_or(SubscribeError::UnknownConnection(id))?;
        entry.topics.insert(topic.to_string());
        inner.topics.entry(topic.to_string()).or_default().insert(id);
        Ok(())
    }

    /// Remove `id` from `topic`. Returns `true` if it was subscribed.
    pub fn unsubscribe(&self, topic: &str, id: ConnectionId) -> bool {
        let mut inner = self.write();
        if let Some(entry) = inner.connections.get_mut(&id) {
            entry.topics.remove(topic);
        }
        inner.detach(topic, id)
    }

    /// Drop a connection from every topic it belongs to and signal it to
    /// close. Returns `false` if it was not registered.
    pub fn remove_connection(&self, id: ConnectionId) -> bool {
        let mut inner = self.write();
        let Some(entry) = inner.connections.remove(&id) else {
            return false;
        };
        for topic in &entry.topics {
            inner.detach(topic, id);
        }
        drop(inner);

        entry.handle.close();
        debug!(connection = %id, topics = entry.topics.len(), "deregistered");
        true
    }

    /// Connections currently subscribed to `topic`.
    pub fn snapshot_for(&self, topic: &str) -> Vec<ConnectionHandle> {
        let inner = self.read();
        match inner.topics.get(topic) {
            Some(members) => inner.handles(members),
            None => Vec::new(),
        }
    }

    /// Connections subscribed to any topic occurring in one of `addresses`.
    /// Each connection appears once.
    pub fn snapshot_for_addresses(&self, addresses: &[&str]) -> Vec<ConnectionHandle> {
        let inner = self.read();
        let mut seen = HashSet::new();
        let ids: Vec<ConnectionId> = addresses
            .iter()
            .flat_map(|a| self.rule.windows(a))
            .filter_map(|window| inner.topics.get(window))
            .flatten()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        inner.handles(&ids)
    }

    /// Every registered connection.
    pub fn snapshot_all(&self) -> Vec<ConnectionHandle> {
        self.read()
            .connections
            .values()
            .map(|e| e.handle.clone())
            .collect()
    }

    pub fn topics_of(&self, id: ConnectionId) -> Vec<String> {
        self.read()
            .connections
            .get(&id)
            .map(|e| e.topics.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.read().topics.contains_key(topic)
    }

    pub fn topic_count(&self) -> usize {
        self.read().topics.len()
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    /// Deregister and signal every connection, and close any connection
    /// registered afterwards. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let entries: Vec<Entry> = {
            let mut inner = self.write();
            inner.shut_down = true;
            inner.topics.clear();
            inner.connections.drain().map(|(_, e)| e).collect()
        };
        for entry in &entries {
            entry.handle.close();
        }
        entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "gRYvsxhc5D6uDWAivNFZGan56P1tpump";
    const OTHER: &str = "pumpXwBbmkg8ZTbNMqUxvQRAyrZzDsGY";

    #[test]
    fn remove_connection_drops_empty_topic() {
        let reg = SubscriptionRegistry::default();
        let (c, _rx) = reg.register(4);
        reg.subscribe(TOPIC, c.id()).unwrap();
        assert_eq!(reg.snapshot_for(TOPIC).len(), 1);

        assert!(reg.remove_connection(c.id()));
        assert!(reg.snapshot_for(TOPIC).is_empty());
        assert!(!reg.contains_topic(TOPIC));
        assert_eq!(reg.topic_count(), 0);
        assert_eq!(reg.connection_count(), 0);
        assert!(c.is_closed());
        assert!(!reg.remove_connection(c.id()));
    }

    #[test]
    fn remove_connection_keeps_other_subscribers() {
        let reg = SubscriptionRegistry::default();
        let (a, _ra) = reg.register(4);
        let (b, _rb) = reg.register(4);
        reg.subscribe(TOPIC, a.id()).unwrap();
        reg.subscribe(TOPIC, b.id()).unwrap();
        reg.subscribe(OTHER, a.id()).unwrap();

        reg.remove_connection(a.id());
        let left: Vec<_> = reg.snapshot_for(TOPIC).iter().map(|h| h.id()).collect();
        assert_eq!(left, vec![b.id()]);
        assert!(!reg.contains_topic(OTHER));
    }

    #[test]
    fn subscribe_is_idempotent() {
        let reg = SubscriptionRegistry::default();
        let (c, _rx) = reg.register(4);
        reg.subscribe(TOPIC, c.id()).unwrap();
        reg.subscribe(TOPIC, c.id()).unwrap();
        assert_eq!(reg.snapshot_for(TOPIC).len(), 1);
        assert_eq!(reg.topics_of(c.id()), vec![TOPIC.to_string()]);
    }

    #[test]
    fn subscribe_rejects_bad_topics_and_unknown_connections() {
        let reg = SubscriptionRegistry::default();
        let (c, _rx) = reg.register(4);
        assert!(matches!(
            reg.subscribe("short", c.id()),
            Err(SubscribeError::InvalidTopic { .. })
        ));
        assert_eq!(reg.topic_count(), 0);

        let ghost = ConnectionId(999);
        assert_eq!(
            reg.subscribe(TOPIC, ghost),
            Err(SubscribeError::UnknownConnection(ghost))
        );
        assert_eq!(reg.topic_count(), 0);
    }

    #[test]
    fn unsubscribe_removes_empty_topic() {
        let reg = SubscriptionRegistry::default();
        let (c, _rx) = reg.register(4);
        reg.subscribe(TOPIC, c.id()).unwrap();
        assert!(reg.unsubscribe(TOPIC, c.id()));
        assert!(!reg.contains_topic(TOPIC));
        assert!(reg.topics_of(c.id()).is_empty());
        assert!(!reg.unsubscribe(TOPIC, c.id()));
        assert_eq!(reg.connection_count(), 1);
    }

    #[test]
    fn address_snapshot_dedups_connections() {
        let reg = SubscriptionRegistry::default();
        let (c, _rx) = reg.register(4);
        reg.subscribe(TOPIC, c.id()).unwrap();
        let mint = "2qEHjDLDLbuBgRYvsxhc5D6uDWAivNFZGan56P1tpump";
        let hits = reg.snapshot_for_addresses(&[mint, mint]);
        assert_eq!(hits.len(), 1);
        assert!(reg
            .snapshot_for_addresses(&["9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM"])
            .is_empty());
    }

    #[test]
    fn try_deliver_reports_full_and_closed() {
        let reg = SubscriptionRegistry::default();
        let (c, mut rx) = reg.register(1);
        c.try_deliver("a".into()).unwrap();
        assert_eq!(c.try_deliver("b".into()), Err(DeliveryError::QueueFull));
        assert_eq!(&*rx.try_recv().unwrap(), "a");

        c.close();
        assert_eq!(c.try_deliver("c".into()), Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn close_signal_wakes_waiter() {
        let reg = SubscriptionRegistry::default();
        let (c, _rx) = reg.register(1);
        let waiter = {
            let c = c.clone();
            tokio::spawn(async move { c.closed().await })
        };
        assert_eq!(reg.close_all(), 1);
        waiter.await.unwrap();
        assert_eq!(reg.connection_count(), 0);
        // Already closed: resolves immediately
        c.closed().await;
    }

    #[test]
    fn register_after_close_all_is_closed_on_arrival() {
        let reg = SubscriptionRegistry::default();
        reg.close_all();

        let (late, _rx) = reg.register(4);
        assert!(late.is_closed());
        assert_eq!(reg.connection_count(), 0);
        assert_eq!(
            reg.subscribe(TOPIC, late.id()),
            Err(SubscribeError::UnknownConnection(late.id()))
        );
    }
}
