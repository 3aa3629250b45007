//! In-process store with per-connection presence.
//!
//! One [`MemoryStore`] is the shared backend; every client gets its own
//! [`MemoryConnection`] from [`MemoryStore::connect`]. A connection's
//! on-disconnect actions run when it is dropped abruptly
//! ([`MemoryConnection::drop_connection`]) or when its lease expires and
//! [`MemoryStore::reap_expired`] collects it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info};

use super::path::StorePath;
use super::tree;
use super::types::{
    ConditionalOutcome, DisconnectAction, Snapshot, StoreError, Subscription, SubscriptionItem,
};
use super::Store;

// ---------------------------------------------------------------------------
// Shared backend
// ---------------------------------------------------------------------------

struct Listener {
    path: StorePath,
    tx: mpsc::UnboundedSender<SubscriptionItem>,
}

struct ConnectionState {
    alive: bool,
    last_seen: Instant,
    on_disconnect: BTreeMap<StorePath, DisconnectAction>,
}

struct Inner {
    root: Value,
    listeners: Vec<Listener>,
    connections: HashMap<u64, ConnectionState>,
    last_timestamp: i64,
    /// Number of upcoming operations that fail with `Unavailable`.
    injected_failures: u32,
}

impl Inner {
    fn server_now(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    /// Gate every client operation: connection alive, failure injection, lease.
    fn admit(&mut self, conn_id: u64) -> Result<(), StoreError> {
        let conn = self
            .connections
            .get_mut(&conn_id)
            .filter(|c| c.alive)
            .ok_or(StoreError::ConnectionClosed)?;
        conn.last_seen = Instant::now();
        if self.injected_failures > 0 {
            self.injected_failures -= 1;
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn apply_set(&mut self, path: &StorePath, value: Option<Value>) {
        let value = value.map(|mut v| {
            let now = self.server_now();
            tree::resolve_placeholders(&mut v, now);
            v
        });
        tree::set(&mut self.root, path, value);
        self.notify(path);
    }

    fn apply_merge(&mut self, path: &StorePath, mut fields: Map<String, Value>) {
        let now = self.server_now();
        fields
            .values_mut()
            .for_each(|v| tree::resolve_placeholders(v, now));
        tree::merge(&mut self.root, path, fields);
        self.notify(path);
    }

    fn notify(&mut self, changed: &StorePath) {
        let root = &self.root;
        self.listeners.retain(|listener| {
            if listener.tx.is_closed() {
                return false;
            }
            if listener.path.overlaps(changed) {
                let snapshot = tree::get(root, &listener.path).cloned();
                return listener.tx.send(Ok(snapshot)).is_ok();
            }
            true
        });
    }

    fn run_disconnect_actions(&mut self, conn_id: u64) -> usize {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            return 0;
        };
        if !conn.alive {
            return 0;
        }
        conn.alive = false;
        let actions = std::mem::take(&mut conn.on_disconnect);
        let count = actions.len();
        for (path, action) in actions {
            match action {
                DisconnectAction::Set(value) => self.apply_set(&path, Some(value)),
                DisconnectAction::Remove => self.apply_set(&path, None),
                DisconnectAction::Update(fields) => {
                    if tree::get(&self.root, &path).is_some() {
                        self.apply_merge(&path, fields);
                    } else {
                        debug!(path = %path, "Skipping on-disconnect update of absent path");
                    }
                }
            }
        }
        count
    }
}

/// Shared in-memory document store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    next_connection: Arc<AtomicU64>,
    next_key: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let seed = chrono::Utc::now().timestamp_millis().max(0) as u64 * 1000;
        Self {
            inner: Arc::new(Mutex::new(Inner {
                root: Value::Object(Map::new()),
                listeners: Vec::new(),
                connections: HashMap::new(),
                last_timestamp: 0,
                injected_failures: 0,
            })),
            next_connection: Arc::new(AtomicU64::new(1)),
            next_key: Arc::new(AtomicU64::new(seed)),
        }
    }

    /// Open a new client connection.
    pub async fn connect(&self) -> MemoryConnection {
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().await.connections.insert(
            id,
            ConnectionState {
                alive: true,
                last_seen: Instant::now(),
                on_disconnect: BTreeMap::new(),
            },
        );
        debug!(connection = id, "Store connection opened");
        MemoryConnection {
            store: self.clone(),
            id,
        }
    }

    /// Fire the on-disconnect actions of every connection not seen within
    /// `max_age`, and sever those connections. Returns how many were reaped.
    pub async fn reap_expired(&self, max_age: Duration) -> usize {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let expired: Vec<u64> = inner
            .connections
            .iter()
            .filter(|(_, c)| c.alive && now.duration_since(c.last_seen) > max_age)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            let fired = inner.run_disconnect_actions(*id);
            info!(connection = id, actions = fired, "Reaped expired connection lease");
        }
        expired.len()
    }

    /// Make the next `count` client operations fail with a transient error.
    pub async fn fail_next(&self, count: u32) {
        self.inner.lock().await.injected_failures = count;
    }

    /// Deliver `error` to every subscriber of exactly `path`.
    pub async fn inject_subscription_error(&self, path: &StorePath, error: StoreError) {
        let inner = self.inner.lock().await;
        for listener in inner.listeners.iter().filter(|l| &l.path == path) {
            let _ = listener.tx.send(Err(error.clone()));
        }
    }

    /// Current value at `path`, bypassing connections.
    pub async fn snapshot(&self, path: &StorePath) -> Snapshot {
        tree::get(&self.inner.lock().await.root, path).cloned()
    }

    /// Number of connections still alive.
    pub async fn live_connections(&self) -> usize {
        self.inner
            .lock()
            .await
            .connections
            .values()
            .filter(|c| c.alive)
            .count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Client connection
// ---------------------------------------------------------------------------

/// One client's handle on a [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryConnection {
    store: MemoryStore,
    id: u64,
}

impl MemoryConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Refresh this connection's lease.
    pub async fn heartbeat(&self) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock().await;
        let conn = inner
            .connections
            .get_mut(&self.id)
            .filter(|c| c.alive)
            .ok_or(StoreError::ConnectionClosed)?;
        conn.last_seen = Instant::now();
        Ok(())
    }

    /// Simulate an abrupt network loss: armed actions run, every later
    /// operation on this connection fails with `ConnectionClosed`.
    pub async fn drop_connection(&self) {
        let fired = self
            .store
            .inner
            .lock()
            .await
            .run_disconnect_actions(self.id);
        info!(connection = self.id, actions = fired, "Connection dropped");
    }

    /// Close the connection for good. Armed actions run as for any other
    /// disconnect, then the connection is forgotten.
    pub async fn release(self) {
        let mut inner = self.store.inner.lock().await;
        let fired = inner.run_disconnect_actions(self.id);
        inner.connections.remove(&self.id);
        debug!(connection = self.id, actions = fired, "Connection released");
    }

    /// Paths with an armed on-disconnect action.
    pub async fn armed_paths(&self) -> Vec<StorePath> {
        self.store
            .inner
            .lock()
            .await
            .connections
            .get(&self.id)
            .map(|c| c.on_disconnect.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryConnection {
    async fn read(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        let mut inner = self.store.inner.lock().await;
        inner.admit(self.id)?;
        Ok(tree::get(&inner.root, path).cloned())
    }

    async fn query_children(
        &self,
        path: &StorePath,
        field: &str,
        equals: &Value,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let mut inner = self.store.inner.lock().await;
        inner.admit(self.id)?;
        let Some(children) = tree::get(&inner.root, path).and_then(Value::as_object) else {
            return Ok(Vec::new());
        };
        let mut matches: Vec<(String, Value)> = children
            .iter()
            .filter(|(_, child)| child.get(field) == Some(equals))
            .map(|(key, child)| (key.clone(), child.clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        let mut inner = self.store.inner.lock().await;
        inner.admit(self.id)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(tree::get(&inner.root, path).cloned()));
        inner.listeners.push(Listener {
            path: path.clone(),
            tx,
        });
        Ok(Subscription::new(path.clone(), rx))
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock().await;
        inner.admit(self.id)?;
        inner.apply_set(path, Some(value));
        Ok(())
    }

    async fn update(
        &self,
        path: &StorePath,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock().await;
        inner.admit(self.id)?;
        inner.apply_merge(path, fields);
        Ok(())
    }

    async fn conditional_update(
        &self,
        path: &StorePath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<ConditionalOutcome, StoreError> {
        let mut inner = self.store.inner.lock().await;
        inner.admit(self.id)?;
        if tree::get(&inner.root, path) != expected {
            return Ok(ConditionalOutcome::Conflict);
        }
        inner.apply_set(path, Some(new));
        Ok(ConditionalOutcome::Applied)
    }

    async fn conditional_remove(
        &self,
        path: &StorePath,
        expected: &Value,
    ) -> Result<ConditionalOutcome, StoreError> {
        let mut inner = self.store.inner.lock().await;
        inner.admit(self.id)?;
        if tree::get(&inner.root, path) != Some(expected) {
            return Ok(ConditionalOutcome::Conflict);
        }
        inner.apply_set(path, None);
        Ok(ConditionalOutcome::Applied)
    }

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock().await;
        inner.admit(self.id)?;
        if tree::get(&inner.root, path).is_some() {
            inner.apply_set(path, None);
        }
        Ok(())
    }

    fn push_key(&self, path: &StorePath) -> Result<String, StoreError> {
        if path.is_root() {
            return Err(StoreError::KeyGeneration(path.to_string()));
        }
        let n = self.store.next_key.fetch_add(1, Ordering::Relaxed);
        Ok(format!("-{n:016x}"))
    }

    async fn arm_on_disconnect(
        &self,
        path: &StorePath,
        action: DisconnectAction,
    ) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock().await;
        inner.admit(self.id)?;
        if let Some(conn) = inner.connections.get_mut(&self.id) {
            conn.on_disconnect.insert(path.clone(), action);
        }
        Ok(())
    }

    async fn disarm(&self, path: &StorePath) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock().await;
        inner.admit(self.id)?;
        if let Some(conn) = inner.connections.get_mut(&self.id) {
            conn.on_disconnect.remove(path);
        }
        Ok(())
    }
}
