//! Shared document store seam.
//!
//! The coordinator only ever talks to the store through the [`Store`]
//! trait: path-addressed JSON documents, full-value subscriptions, a
//! conditional write for the matchmaking claim, and server-side
//! on-disconnect actions. [`MemoryStore`] is the in-process
//! implementation used by tests and the simulator.

mod memory;
mod path;
mod tree;
mod types;

pub use memory::{MemoryConnection, MemoryStore};
pub use path::StorePath;
pub use types::{
    server_timestamp, ConditionalOutcome, DisconnectAction, Snapshot, StoreError, Subscription,
    SubscriptionItem,
};

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Contract every backing store must provide.
///
/// All writes accept [`server_timestamp`] placeholders anywhere in the
/// value; the store resolves them to a monotonically increasing number of
/// milliseconds at write time.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read the current value at `path`, `None` if absent.
    async fn read(&self, path: &StorePath) -> Result<Snapshot, StoreError>;

    /// Children of `path` whose `field` equals `equals`, ordered by key,
    /// at most `limit` of them.
    async fn query_children(
        &self,
        path: &StorePath,
        field: &str,
        equals: &Value,
        limit: usize,
    ) -> Result<Vec<(String, Value)>, StoreError>;

    /// Subscribe to the full value at `path`. The current value is
    /// delivered first, then again after every change (including removal).
    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError>;

    /// Replace the value at `path`.
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// Shallow-merge `fields` into the object at `path`. A `null` field
    /// removes that child.
    async fn update(&self, path: &StorePath, fields: Map<String, Value>)
        -> Result<(), StoreError>;

    /// Replace the value at `path` with `new` only if it currently equals
    /// `expected` (`None` meaning absent).
    async fn conditional_update(
        &self,
        path: &StorePath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<ConditionalOutcome, StoreError>;

    /// Remove the value at `path` only if it currently equals `expected`.
    async fn conditional_remove(
        &self,
        path: &StorePath,
        expected: &Value,
    ) -> Result<ConditionalOutcome, StoreError>;

    /// Remove the value at `path`. Removing an absent path succeeds.
    async fn remove(&self, path: &StorePath) -> Result<(), StoreError>;

    /// Generate a fresh child key under `path`. Keys sort in generation order.
    fn push_key(&self, path: &StorePath) -> Result<String, StoreError>;

    /// Register `action` to run against `path` if this client's connection
    /// ends without a matching [`Store::disarm`]. Re-arming a path replaces
    /// the previous action.
    async fn arm_on_disconnect(
        &self,
        path: &StorePath,
        action: DisconnectAction,
    ) -> Result<(), StoreError>;

    /// Cancel the on-disconnect action registered for `path`, if any.
    async fn disarm(&self, path: &StorePath) -> Result<(), StoreError>;
}
