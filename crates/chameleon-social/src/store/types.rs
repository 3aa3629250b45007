//! Value, error, and subscription types shared by every store.

use chameleon_common::ChameleonError;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::path::StorePath;

/// Full value at a path; `None` when the path is absent.
pub type Snapshot = Option<Value>;

/// One delivery on a subscription.
pub type SubscriptionItem = Result<Snapshot, StoreError>;

const SERVER_VALUE_KEY: &str = ".sv";
const SERVER_TIMESTAMP: &str = "timestamp";

/// Placeholder the store replaces with its own clock at write time.
pub fn server_timestamp() -> Value {
    let mut placeholder = Map::new();
    placeholder.insert(SERVER_VALUE_KEY.into(), Value::from(SERVER_TIMESTAMP));
    Value::Object(placeholder)
}

pub(crate) fn is_server_timestamp(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| {
        obj.len() == 1 && obj.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some(SERVER_TIMESTAMP)
    })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out: {0}")]
    Timeout(String),

    #[error("store rejected the operation: {0}")]
    Rejected(String),

    #[error("malformed value at {path}: {message}")]
    Decode { path: String, message: String },

    #[error("could not generate a key under {0}")]
    KeyGeneration(String),

    #[error("store connection closed")]
    ConnectionClosed,
}

impl From<StoreError> for ChameleonError {
    fn from(err: StoreError) -> Self {
        ChameleonError::Store(err.to_string())
    }
}

impl StoreError {
    /// Whether re-issuing the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

// ---------------------------------------------------------------------------
// Write outcomes and disconnect actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalOutcome {
    Applied,
    /// The current value no longer matched the expected one.
    Conflict,
}

/// What the store does at a path when a client vanishes.
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectAction {
    Set(Value),
    /// Merge fields, skipped if the path no longer exists.
    Update(Map<String, Value>),
    Remove,
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Live feed of full values at one path.
///
/// Dropping the subscription (or calling [`Subscription::cancel`]) stops
/// delivery; anything still buffered is discarded.
pub struct Subscription {
    path: StorePath,
    rx: mpsc::UnboundedReceiver<SubscriptionItem>,
}

impl Subscription {
    pub fn new(path: StorePath, rx: mpsc::UnboundedReceiver<SubscriptionItem>) -> Self {
        Self { path, rx }
    }

    /// Next delivery, `None` once the store side hangs up or after cancel.
    pub async fn recv(&mut self) -> Option<SubscriptionItem> {
        self.rx.recv().await
    }

    pub fn cancel(&mut self) {
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
