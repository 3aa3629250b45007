use std::sync::Arc;

use chameleon_common::{ClientId, SessionId};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::{closed_fields, SessionPaths};
use crate::store::{DisconnectAction, Store, StoreError};

/// Arms and disarms the on-disconnect actions for at most one session.
pub struct PresenceManager {
    store: Arc<dyn Store>,
    paths: SessionPaths,
    armed: Option<(SessionId, ClientId)>,
}

impl PresenceManager {
    pub fn new(store: Arc<dyn Store>, paths: SessionPaths) -> Self {
        Self {
            store,
            paths,
            armed: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn armed_session(&self) -> Option<&SessionId> {
        self.armed.as_ref().map(|(session, _)| session)
    }

    /// Arm the actions for `session_id`. Actions for any other session
    /// are cancelled first; re-arming the same session is a no-op.
    pub async fn arm(&mut self, session_id: &SessionId, client: &ClientId) -> Result<(), StoreError> {
        if let Some((armed, _)) = &self.armed {
            if armed == session_id {
                return Ok(());
            }
            let previous = armed.clone();
            self.disarm(&previous).await;
        }

        let session_path = self.paths.session(session_id);
        self.store
            .arm_on_disconnect(&session_path, DisconnectAction::Update(closed_fields(client)))
            .await?;

        let mut typing = Map::new();
        typing.insert(client.to_string(), Value::Bool(false));
        if let Err(e) = self
            .store
            .arm_on_disconnect(
                &self.paths.typing_map(session_id),
                DisconnectAction::Update(typing),
            )
            .await
        {
            if let Err(undo) = self.store.disarm(&session_path).await {
                warn!(session = %session_id, error = %undo, "Failed to undo partial presence arm");
            }
            return Err(e);
        }

        debug!(session = %session_id, client = %client, "Presence armed");
        self.armed = Some((session_id.clone(), client.clone()));
        Ok(())
    }

    /// Cancel the actions for `session_id` if they are the armed ones.
    /// Store failures are logged, never returned.
    pub async fn disarm(&mut self, session_id: &SessionId) {
        match &self.armed {
            Some((armed, _)) if armed == session_id => {}
            _ => return,
        }
        self.armed = None;

        for path in [
            self.paths.session(session_id),
            self.paths.typing_map(session_id),
        ] {
            if let Err(e) = self.store.disarm(&path).await {
                warn!(session = %session_id, path = %path, error = %e, "Failed to disarm presence");
            }
        }
        debug!(session = %session_id, "Presence disarmed");
    }

    /// Disarm whatever is armed.
    pub async fn disarm_all(&mut self) {
        if let Some((session, _)) = self.armed.clone() {
            self.disarm(&session).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StorePath};
    use serde_json::json;

    async fn setup() -> (MemoryStore, crate::store::MemoryConnection, PresenceManager) {
        let store = MemoryStore::new();
        let conn = store.connect().await;
        let presence = PresenceManager::new(Arc::new(conn.clone()), SessionPaths::default());
        (store, conn, presence)
    }

    #[tokio::test]
    async fn vanished_client_closes_session_and_clears_typing() {
        let (store, conn, mut presence) = setup().await;
        let sid = SessionId::from("s1");
        let me = ClientId::from("user_a");
        conn.write(
            &StorePath::parse("sessions/s1"),
            json!({
                "participantA": "user_a",
                "participantB": "user_b",
                "status": "active",
                "typingStatus": { "user_a": true, "user_b": false }
            }),
        )
        .await
        .unwrap();

        presence.arm(&sid, &me).await.unwrap();
        conn.drop_connection().await;

        let record = store.snapshot(&StorePath::parse("sessions/s1")).await.unwrap();
        assert_eq!(record["status"], json!("closed"));
        assert_eq!(record["closedBy"], json!("user_a"));
        assert_eq!(record["typingStatus"]["user_a"], json!(false));
        assert!(record["updatedAt"].is_i64());
    }

    #[tokio::test]
    async fn rearming_other_session_disarms_previous() {
        let (_store, conn, mut presence) = setup().await;
        let me = ClientId::from("user_a");
        presence.arm(&SessionId::from("s1"), &me).await.unwrap();
        presence.arm(&SessionId::from("s2"), &me).await.unwrap();

        let armed = conn.armed_paths().await;
        assert_eq!(armed.len(), 2);
        assert!(armed
            .iter()
            .all(|p| p.segments().get(1).map(String::as_str) == Some("s2")));
        assert_eq!(presence.armed_session(), Some(&SessionId::from("s2")));
    }

    #[tokio::test]
    async fn arm_same_session_is_idempotent() {
        let (_store, conn, mut presence) = setup().await;
        let me = ClientId::from("user_a");
        let sid = SessionId::from("s1");
        presence.arm(&sid, &me).await.unwrap();
        presence.arm(&sid, &me).await.unwrap();
        assert_eq!(conn.armed_paths().await.len(), 2);
    }

    #[tokio::test]
    async fn disarm_ignores_other_sessions() {
        let (_store, conn, mut presence) = setup().await;
        let me = ClientId::from("user_a");
        presence.arm(&SessionId::from("s1"), &me).await.unwrap();
        presence.disarm(&SessionId::from("other")).await;
        assert_eq!(conn.armed_paths().await.len(), 2);

        presence.disarm_all().await;
        assert!(conn.armed_paths().await.is_empty());
        assert!(presence.armed_session().is_none());
    }

    #[tokio::test]
    async fn disarm_failure_still_clears_local_state() {
        let (_store, conn, mut presence) = setup().await;
        let sid = SessionId::from("s1");
        presence.arm(&sid, &ClientId::from("user_a")).await.unwrap();
        conn.drop_connection().await;
        presence.disarm(&sid).await;
        assert!(presence.armed_session().is_none());
    }
}
