//! Message channel for an active session.
//!
//! Messages are append-only children of the session's `messages` node.
//! Subscribers always receive the whole list and rebuild the ordered
//! transcript from it.

use std::sync::Arc;

use chameleon_common::{ClientId, MessageId, SessionId};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::{ChatMessage, MessageRecord, SessionPaths};
use crate::store::{server_timestamp, Store, StoreError};

/// Trimmed text, or `None` if nothing is left to send.
pub fn normalize_text(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Rebuild the transcript from a full `messages` snapshot.
///
/// Sorted by store timestamp, then by message id so equal timestamps keep
/// insertion order. Messages whose timestamp has not resolved yet sort
/// last. Malformed entries are dropped.
pub fn order_messages(snapshot: Option<&Value>) -> Vec<ChatMessage> {
    let Some(entries) = snapshot.and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut messages: Vec<ChatMessage> = entries
        .iter()
        .filter_map(|(key, value)| {
            match serde_json::from_value::<MessageRecord>(value.clone()) {
                Ok(record) => Some(ChatMessage::from_record(MessageId::new(key.as_str()), record)),
                Err(e) => {
                    debug!(message = %key, error = %e, "Dropping malformed message");
                    None
                }
            }
        })
        .collect();

    messages.sort_by(|a, b| {
        let ta = a.timestamp.unwrap_or(i64::MAX);
        let tb = b.timestamp.unwrap_or(i64::MAX);
        ta.cmp(&tb).then_with(|| a.id.cmp(&b.id))
    });
    messages
}

/// Appends messages to a session.
pub struct MessageChannel {
    store: Arc<dyn Store>,
    paths: SessionPaths,
}

impl MessageChannel {
    pub fn new(store: Arc<dyn Store>, paths: SessionPaths) -> Self {
        Self { store, paths }
    }

    /// Append `text` from `sender`. The caller is responsible for checking
    /// that the session is active and the text is non-empty.
    pub async fn append(
        &self,
        session_id: &SessionId,
        sender: &ClientId,
        text: &str,
    ) -> Result<MessageId, StoreError> {
        let messages = self.paths.messages(session_id);
        let id = MessageId::new(self.store.push_key(&messages)?);
        self.store
            .write(&messages.child(id.as_str()), MessageRecord::document(sender, text))
            .await?;

        let mut touch = Map::new();
        touch.insert("updatedAt".into(), server_timestamp());
        if let Err(e) = self.store.update(&self.paths.session(session_id), touch).await {
            warn!(session = %session_id, error = %e, "Failed to bump session updatedAt");
        }

        debug!(session = %session_id, message = %id, "Message appended");
        Ok(id)
    }
}
