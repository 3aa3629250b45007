//! Store wrappers for exercising races and call ordering.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Barrier;

use crate::store::{
    ConditionalOutcome, DisconnectAction, Snapshot, Store, StoreError, StorePath, Subscription,
};

/// Holds every caller at a barrier right after `query_children`, so
/// concurrent matchmakers all act on the same candidate list.
pub(crate) struct GatedStore {
    inner: Arc<dyn Store>,
    gate: Arc<Barrier>,
}

impl GatedStore {
    pub(crate) fn new(inner: Arc<dyn Store>, gate: Arc<Barrier>) -> Self {
        Self { inner, gate }
    }
}

/// Records arm and disarm calls in order.
pub(crate) struct RecordingStore {
    inner: Arc<dyn Store>,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingStore {
    pub(crate) fn new(inner: Arc<dyn Store>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                log: Arc::clone(&log),
            },
            log,
        )
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Store for GatedStore {
    async fn read(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        self.inner.read(path).await
    }

    async fn query_children(
        &self,
        path: &StorePath,
        field: &str,
        equals: &Value,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let result = self.inner.query_children(path, field, equals, limit).await;
        self.gate.wait().await;
        result
    }

    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        self.inner.subscribe(path).await
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.inner.write(path, value).await
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.inner.update(path, fields).await
    }

    async fn conditional_update(
        &self,
        path: &StorePath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<ConditionalOutcome, StoreError> {
        self.inner.conditional_update(path, expected, new).await
    }

    async fn conditional_remove(
        &self,
        path: &StorePath,
        expected: &Value,
    ) -> Result<ConditionalOutcome, StoreError> {
        self.inner.conditional_remove(path, expected).await
    }

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        self.inner.remove(path).await
    }

    fn push_key(&self, path: &StorePath) -> Result<String, StoreError> {
        self.inner.push_key(path)
    }

    async fn arm_on_disconnect(
        &self,
        path: &StorePath,
        action: DisconnectAction,
    ) -> Result<(), StoreError> {
        self.inner.arm_on_disconnect(path, action).await
    }

    async fn disarm(&self, path: &StorePath) -> Result<(), StoreError> {
        self.inner.disarm(path).await
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn read(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        self.inner.read(path).await
    }

    async fn query_children(
        &self,
        path: &StorePath,
        field: &str,
        equals: &Value,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let result = self.inner.query_children(path, field, equals, limit).await;
        result
    }

    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        self.inner.subscribe(path).await
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.inner.write(path, value).await
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.inner.update(path, fields).await
    }

    async fn conditional_update(
        &self,
        path: &StorePath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<ConditionalOutcome, StoreError> {
        self.inner.conditional_update(path, expected, new).await
    }

    async fn conditional_remove(
        &self,
        path: &StorePath,
        expected: &Value,
    ) -> Result<ConditionalOutcome, StoreError> {
        self.inner.conditional_remove(path, expected).await
    }

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        self.inner.remove(path).await
    }

    fn push_key(&self, path: &StorePath) -> Result<String, StoreError> {
        self.inner.push_key(path)
    }

    async fn arm_on_disconnect(
        &self,
        path: &StorePath,
        action: DisconnectAction,
    ) -> Result<(), StoreError> {
        self.record(format!("arm {path}"));
        self.inner.arm_on_disconnect(path, action).await
    }

    async fn disarm(&self, path: &StorePath) -> Result<(), StoreError> {
        self.record(format!("disarm {path}"));
        self.inner.disarm(path).await
    }
}
