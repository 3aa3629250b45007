//! Session and message records.
//!
//! `SessionRecord` and `MessageRecord` mirror the stored documents field
//! for field. `ChatSession` is the decoded view the coordinator works
//! with: the partner slot lives inside the `Active` phase, so an active
//! session without a second participant cannot be represented.

use std::collections::BTreeMap;

use chameleon_common::{ClientId, MessageId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::{server_timestamp, StoreError, StorePath};

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Record layout under the sessions root.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    root: StorePath,
}

impl SessionPaths {
    pub fn new(sessions_path: &str) -> Self {
        Self {
            root: StorePath::parse(sessions_path),
        }
    }

    pub fn root(&self) -> &StorePath {
        &self.root
    }

    pub fn session(&self, id: &SessionId) -> StorePath {
        self.root.child(id.as_str())
    }

    pub fn messages(&self, id: &SessionId) -> StorePath {
        self.session(id).child("messages")
    }

    pub fn typing_map(&self, id: &SessionId) -> StorePath {
        self.session(id).child("typingStatus")
    }

    pub fn typing(&self, id: &SessionId, client: &ClientId) -> StorePath {
        self.typing_map(id).child(client.as_str())
    }
}

impl Default for SessionPaths {
    fn default() -> Self {
        Self::new("sessions")
    }
}

// ---------------------------------------------------------------------------
// Stored documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

/// A session document as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub participant_a: Option<ClientId>,
    pub participant_b: Option<ClientId>,
    pub alias_a: Option<String>,
    pub alias_b: Option<String>,
    pub status: SessionStatus,
    pub closed_by: Option<ClientId>,
    #[serde(default)]
    pub typing_status: BTreeMap<ClientId, bool>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl SessionRecord {
    pub fn decode(path: &StorePath, value: &Value) -> Result<Self, StoreError> {
        serde_json::from_value(value.clone()).map_err(|e| StoreError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// An active record whose second slot has not been observed yet.
    pub fn is_unsettled_claim(&self) -> bool {
        self.status == SessionStatus::Active && self.participant_b.is_none()
    }
}

/// Document for a freshly created waiting session.
pub fn waiting_document(host: &ClientId, alias: &str) -> Value {
    let mut typing = Map::new();
    typing.insert(host.to_string(), Value::Bool(false));
    serde_json::json!({
        "participantA": host,
        "aliasA": alias,
        "status": SessionStatus::Waiting.as_str(),
        "typingStatus": typing,
        "createdAt": server_timestamp(),
        "updatedAt": server_timestamp(),
    })
}

/// `current` with the second slot filled by `guest`.
pub fn claimed_document(current: &Value, host: &ClientId, guest: &ClientId, alias: &str) -> Value {
    let mut doc = current.as_object().cloned().unwrap_or_default();
    let mut typing = Map::new();
    typing.insert(guest.to_string(), Value::Bool(false));
    typing.insert(host.to_string(), Value::Bool(false));
    doc.insert("participantB".into(), Value::from(guest.as_str()));
    doc.insert("aliasB".into(), Value::from(alias));
    doc.insert("status".into(), Value::from(SessionStatus::Active.as_str()));
    doc.insert("typingStatus".into(), Value::Object(typing));
    doc.insert("updatedAt".into(), server_timestamp());
    Value::Object(doc)
}

/// `current` reset to waiting with the second slot cleared.
pub fn reverted_document(current: &Value) -> Value {
    let mut doc = current.as_object().cloned().unwrap_or_default();
    doc.remove("participantB");
    doc.remove("aliasB");
    doc.insert("status".into(), Value::from(SessionStatus::Waiting.as_str()));
    doc.insert("updatedAt".into(), server_timestamp());
    Value::Object(doc)
}

/// Fields marking a session closed by `closer`.
pub fn closed_fields(closer: &ClientId) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("status".into(), Value::from(SessionStatus::Closed.as_str()));
    fields.insert("closedBy".into(), Value::from(closer.as_str()));
    fields.insert("updatedAt".into(), server_timestamp());
    fields
}

/// `current` with the closed fields of [`closed_fields`] merged in.
pub fn closed_document(current: &Value, closer: &ClientId) -> Value {
    let mut doc = current.as_object().cloned().unwrap_or_default();
    doc.extend(closed_fields(closer));
    Value::Object(doc)
}

/// A message document as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub sender_id: ClientId,
    pub text: String,
    /// `None` until the store has resolved the write.
    pub timestamp: Option<i64>,
}

impl MessageRecord {
    pub fn document(sender: &ClientId, text: &str) -> Value {
        serde_json::json!({
            "senderId": sender,
            "text": text,
            "timestamp": server_timestamp(),
        })
    }
}

// ---------------------------------------------------------------------------
// Decoded views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ClientId,
    pub alias: Option<String>,
}

impl Participant {
    pub fn new(id: ClientId, alias: Option<String>) -> Self {
        Self { id, alias }
    }

    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or("Stranger")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Waiting,
    Active { guest: Participant },
    Closed {
        guest: Option<Participant>,
        closed_by: Option<ClientId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: SessionId,
    pub host: Participant,
    pub phase: SessionPhase,
    pub typing: BTreeMap<ClientId, bool>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl ChatSession {
    /// Decode a stored record. An active record with an empty second slot
    /// decodes as `Waiting`; a record without a host is rejected.
    pub fn from_record(id: SessionId, record: SessionRecord) -> Result<Self, StoreError> {
        let Some(host_id) = record.participant_a else {
            return Err(StoreError::Decode {
                path: id.to_string(),
                message: "session has no participantA".into(),
            });
        };
        let host = Participant::new(host_id, record.alias_a);
        let guest = record
            .participant_b
            .map(|guest_id| Participant::new(guest_id, record.alias_b));

        let phase = match (record.status, guest) {
            (SessionStatus::Waiting, _) | (SessionStatus::Active, None) => SessionPhase::Waiting,
            (SessionStatus::Active, Some(guest)) => SessionPhase::Active { guest },
            (SessionStatus::Closed, guest) => SessionPhase::Closed {
                guest,
                closed_by: record.closed_by,
            },
        };

        Ok(Self {
            id,
            host,
            phase,
            typing: record.typing_status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    pub fn guest(&self) -> Option<&Participant> {
        match &self.phase {
            SessionPhase::Waiting => None,
            SessionPhase::Active { guest } => Some(guest),
            SessionPhase::Closed { guest, .. } => guest.as_ref(),
        }
    }

    pub fn is_participant(&self, client: &ClientId) -> bool {
        self.host.id == *client || self.guest().is_some_and(|g| g.id == *client)
    }

    /// The other participant from `me`'s point of view.
    pub fn partner_of(&self, me: &ClientId) -> Option<&Participant> {
        if self.host.id == *me {
            self.guest()
        } else if self.guest().is_some_and(|g| g.id == *me) {
            Some(&self.host)
        } else {
            None
        }
    }

    pub fn is_typing(&self, client: &ClientId) -> bool {
        self.typing.get(client).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: ClientId,
    pub text: String,
    pub timestamp: Option<i64>,
}

impl ChatMessage {
    pub fn from_record(id: MessageId, record: MessageRecord) -> Self {
        Self {
            id,
            sender_id: record.sender_id,
            text: record.text,
            timestamp: record.timestamp,
        }
    }

    pub fn is_from(&self, client: &ClientId) -> bool {
        self.sender_id == *client
    }
}
