//! Find-or-create rendezvous.
//!
//! A client first tries to claim an existing waiting session with a
//! conditional write; the store lets exactly one claimant win per record.
//! Losing a race is expected and just moves on to the next candidate.
//! With nothing left to claim, the client creates its own waiting record.

use std::sync::Arc;

use chameleon_common::{ChameleonError, ClientId, SessionId};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::identity::ClientIdentity;
use crate::model::{
    claimed_document, closed_document, waiting_document, Participant, SessionPaths,
    SessionRecord, SessionStatus,
};
use crate::retry::RetryPolicy;
use crate::store::{ConditionalOutcome, Store, StoreError};

#[derive(Debug, Clone)]
pub struct MatchmakerConfig {
    /// Waiting records inspected per attempt.
    pub candidate_limit: usize,
    /// Remove this client's own leftover waiting records found while
    /// scanning candidates.
    pub cleanup_stale_self_sessions: bool,
    pub retry: RetryPolicy,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 5,
            cleanup_stale_self_sessions: true,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Joined someone else's waiting session.
    Claimed {
        session_id: SessionId,
        partner: Participant,
    },
    /// No claimable session; a new waiting one was created.
    Created { session_id: SessionId },
}

impl MatchOutcome {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Claimed { session_id, .. } | Self::Created { session_id } => session_id,
        }
    }
}

/// What happened to a session its host withdrew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Withdrawal {
    /// Nobody had joined; the record is gone.
    Removed,
    /// A guest claimed it first. It was closed on the host's behalf so the
    /// guest sees a departure rather than a vanished record.
    Closed { guest: ClientId },
    /// Already gone, unreadable, or not hosted by this client.
    Untouched,
}

/// Rounds of read then conditional write before giving up on a record
/// that keeps changing underneath the host.
const WITHDRAW_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not allocate a session key: {0}")]
    KeyGeneration(StoreError),
}

impl From<MatchError> for ChameleonError {
    fn from(err: MatchError) -> Self {
        ChameleonError::Matchmaking(err.to_string())
    }
}

pub struct Matchmaker {
    store: Arc<dyn Store>,
    paths: SessionPaths,
    config: MatchmakerConfig,
}

impl Matchmaker {
    pub fn new(store: Arc<dyn Store>, paths: SessionPaths, config: MatchmakerConfig) -> Self {
        Self {
            store,
            paths,
            config,
        }
    }

    pub async fn find_or_create_session(
        &self,
        me: &ClientIdentity,
    ) -> Result<MatchOutcome, MatchError> {
        let candidates = self.waiting_candidates().await?;
        debug!(client = %me.id, count = candidates.len(), "Scanning waiting sessions");

        for (key, value) in candidates {
            let session_id = SessionId::new(key);
            let record = match SessionRecord::decode(&self.paths.session(&session_id), &value) {
                Ok(record) => record,
                Err(e) => {
                    debug!(session = %session_id, error = %e, "Skipping undecodable candidate");
                    continue;
                }
            };
            let Some(host) = record.participant_a.clone() else {
                continue;
            };

            if host == me.id {
                if self.config.cleanup_stale_self_sessions {
                    self.remove_stale_self_session(&session_id, &me.id).await;
                }
                continue;
            }
            if record.participant_b.is_some() || record.status != SessionStatus::Waiting {
                continue;
            }

            let claimed = claimed_document(&value, &host, &me.id, &me.alias);
            match self
                .store
                .conditional_update(&self.paths.session(&session_id), Some(&value), claimed)
                .await
            {
                Ok(ConditionalOutcome::Applied) => {
                    info!(session = %session_id, client = %me.id, host = %host, "Claimed waiting session");
                    return Ok(MatchOutcome::Claimed {
                        session_id,
                        partner: Participant::new(host, record.alias_a),
                    });
                }
                Ok(ConditionalOutcome::Conflict) => {
                    debug!(session = %session_id, "Claim lost to another client");
                }
                Err(e) => {
                    warn!(session = %session_id, error = %e, "Claim attempt failed, trying next candidate");
                }
            }
        }

        self.create_waiting_session(me).await
    }

    async fn waiting_candidates(&self) -> Result<Vec<(String, Value)>, StoreError> {
        let status = Value::from(SessionStatus::Waiting.as_str());
        let root = self.paths.root();
        self.config
            .retry
            .run("query_waiting", || {
                self.store
                    .query_children(root, "status", &status, self.config.candidate_limit)
            })
            .await
    }

    /// Take back a session `host` created. An unclaimed record is removed;
    /// one a guest has already claimed is closed by `host` instead. Both
    /// writes are conditional on the record read just before.
    pub async fn withdraw(
        &self,
        session_id: &SessionId,
        host: &ClientId,
    ) -> Result<Withdrawal, StoreError> {
        let path = self.paths.session(session_id);
        for _ in 0..WITHDRAW_ATTEMPTS {
            let current = self
                .config
                .retry
                .run("read_session", || self.store.read(&path))
                .await?;
            let Some(value) = current else {
                return Ok(Withdrawal::Untouched);
            };
            let record = match SessionRecord::decode(&path, &value) {
                Ok(record) => record,
                Err(e) => {
                    debug!(session = %session_id, error = %e, "Not withdrawing undecodable session");
                    return Ok(Withdrawal::Untouched);
                }
            };
            if record.participant_a.as_ref() != Some(host) {
                return Ok(Withdrawal::Untouched);
            }

            match (record.participant_b, record.status) {
                (Some(guest), SessionStatus::Active) => {
                    let closed = closed_document(&value, host);
                    let outcome = self
                        .store
                        .conditional_update(&path, Some(&value), closed)
                        .await?;
                    if outcome == ConditionalOutcome::Applied {
                        info!(session = %session_id, guest = %guest, "Closed session claimed during withdrawal");
                        return Ok(Withdrawal::Closed { guest });
                    }
                }
                _ => {
                    if self.store.conditional_remove(&path, &value).await?
                        == ConditionalOutcome::Applied
                    {
                        return Ok(Withdrawal::Removed);
                    }
                }
            }
            debug!(session = %session_id, "Session changed during withdrawal, re-reading");
        }
        Err(StoreError::Rejected(format!(
            "{path} kept changing while it was withdrawn"
        )))
    }

    async fn remove_stale_self_session(&self, session_id: &SessionId, me: &ClientId) {
        match self.withdraw(session_id, me).await {
            Ok(Withdrawal::Removed) => {
                info!(session = %session_id, "Removed stale self-created waiting session")
            }
            Ok(outcome) => debug!(session = %session_id, ?outcome, "Stale session withdrawn"),
            Err(e) => warn!(session = %session_id, error = %e, "Failed to remove stale session"),
        }
    }

    async fn create_waiting_session(&self, me: &ClientIdentity) -> Result<MatchOutcome, MatchError> {
        let key = self
            .store
            .push_key(self.paths.root())
            .map_err(MatchError::KeyGeneration)?;
        let session_id = SessionId::new(key);
        let path = self.paths.session(&session_id);

        self.config
            .retry
            .run("create_session", || {
                self.store.write(&path, waiting_document(&me.id, &me.alias))
            })
            .await?;

        info!(session = %session_id, client = %me.id, "Created waiting session");
        Ok(MatchOutcome::Created { session_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StorePath};
    use chameleon_common::ClientId;
    use serde_json::json;

    fn identity(id: &str) -> ClientIdentity {
        ClientIdentity::new(ClientId::from(id), format!("alias_{id}"))
    }

    async fn matchmaker(store: &MemoryStore) -> Matchmaker {
        Matchmaker::new(
            Arc::new(store.connect().await),
            SessionPaths::default(),
            MatchmakerConfig::default(),
        )
    }

    #[tokio::test]
    async fn creates_when_nothing_waits_then_second_client_claims() {
        let store = MemoryStore::new();
        let a = matchmaker(&store).await;
        let b = matchmaker(&store).await;

        let created = a.find_or_create_session(&identity("user_a")).await.unwrap();
        let MatchOutcome::Created { session_id } = created.clone() else {
            panic!("expected a new session, got {created:?}");
        };

        let claimed = b.find_or_create_session(&identity("user_b")).await.unwrap();
        assert_eq!(
            claimed,
            MatchOutcome::Claimed {
                session_id: session_id.clone(),
                partner: Participant::new(ClientId::from("user_a"), Some("alias_user_a".into())),
            }
        );

        let record = store
            .snapshot(&StorePath::parse("sessions").child(session_id.as_str()))
            .await
            .unwrap();
        assert_eq!(record["status"], json!("active"));
        assert_eq!(record["participantB"], json!("user_b"));
        assert_eq!(record["aliasB"], json!("alias_user_b"));
        assert_eq!(record["typingStatus"], json!({ "user_a": false, "user_b": false }));
    }

    #[tokio::test]
    async fn never_matches_itself_and_cleans_stale_record() {
        let store = MemoryStore::new();
        let a = matchmaker(&store).await;
        let me = identity("user_a");

        let first = a.find_or_create_session(&me).await.unwrap();
        let second = a.find_or_create_session(&me).await.unwrap();

        assert!(matches!(second, MatchOutcome::Created { .. }));
        assert_ne!(first.session_id(), second.session_id());
        let stale = StorePath::parse("sessions").child(first.session_id().as_str());
        assert!(store.snapshot(&stale).await.is_none());
    }

    #[tokio::test]
    async fn stale_self_record_kept_when_cleanup_disabled() {
        let store = MemoryStore::new();
        let a = Matchmaker::new(
            Arc::new(store.connect().await),
            SessionPaths::default(),
            MatchmakerConfig {
                cleanup_stale_self_sessions: false,
                ..MatchmakerConfig::default()
            },
        );
        let me = identity("user_a");
        let first = a.find_or_create_session(&me).await.unwrap();
        a.find_or_create_session(&me).await.unwrap();
        let stale = StorePath::parse("sessions").child(first.session_id().as_str());
        assert!(store.snapshot(&stale).await.is_some());
    }

    #[tokio::test]
    async fn withdraw_removes_unclaimed_session() {
        let store = MemoryStore::new();
        let a = matchmaker(&store).await;
        let me = identity("user_a");
        let created = a.find_or_create_session(&me).await.unwrap();

        let outcome = a.withdraw(created.session_id(), &me.id).await.unwrap();
        assert_eq!(outcome, Withdrawal::Removed);
        let path = StorePath::parse("sessions").child(created.session_id().as_str());
        assert!(store.snapshot(&path).await.is_none());
    }

    #[tokio::test]
    async fn withdraw_closes_session_claimed_in_the_meantime() {
        let store = MemoryStore::new();
        let a = matchmaker(&store).await;
        let b = matchmaker(&store).await;
        let me = identity("user_a");
        let created = a.find_or_create_session(&me).await.unwrap();
        b.find_or_create_session(&identity("user_b")).await.unwrap();

        let outcome = a.withdraw(created.session_id(), &me.id).await.unwrap();
        assert_eq!(
            outcome,
            Withdrawal::Closed {
                guest: ClientId::from("user_b")
            }
        );
        let path = StorePath::parse("sessions").child(created.session_id().as_str());
        let record = store.snapshot(&path).await.unwrap();
        assert_eq!(record["status"], json!("closed"));
        assert_eq!(record["closedBy"], json!("user_a"));
        assert_eq!(record["participantB"], json!("user_b"));
    }

    #[tokio::test]
    async fn withdraw_ignores_sessions_hosted_by_others() {
        let store = MemoryStore::new();
        let a = matchmaker(&store).await;
        let created = a.find_or_create_session(&identity("user_a")).await.unwrap();

        let outcome = a
            .withdraw(created.session_id(), &ClientId::from("user_b"))
            .await
            .unwrap();
        assert_eq!(outcome, Withdrawal::Untouched);
        let path = StorePath::parse("sessions").child(created.session_id().as_str());
        assert!(store.snapshot(&path).await.is_some());
    }

    #[tokio::test]
    async fn skips_candidate_that_already_has_partner() {
        let store = MemoryStore::new();
        let seed = store.connect().await;
        seed.write(
            &StorePath::parse("sessions/-a"),
            json!({ "participantA": "user_x", "status": "waiting" }),
        )
        .await
        .unwrap();
        seed.write(
            &StorePath::parse("sessions/-b"),
            json!({ "participantA": "user_y", "status": "waiting" }),
        )
        .await
        .unwrap();
        seed.write(&StorePath::parse("sessions/-a/participantB"), json!("user_z"))
            .await
            .unwrap();

        let b = matchmaker(&store).await;
        let outcome = b.find_or_create_session(&identity("user_b")).await.unwrap();
        assert_eq!(outcome.session_id(), &SessionId::from("-b"));
    }

    #[tokio::test]
    async fn undecodable_candidates_are_skipped() {
        let store = MemoryStore::new();
        let seed = store.connect().await;
        seed.write(
            &StorePath::parse("sessions/-bad"),
            json!({ "status": "waiting", "typingStatus": "garbage" }),
        )
        .await
        .unwrap();

        let b = matchmaker(&store).await;
        let outcome = b.find_or_create_session(&identity("user_b")).await.unwrap();
        assert!(matches!(outcome, MatchOutcome::Created { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_query_failures_are_retried() {
        let store = MemoryStore::new();
        let a = matchmaker(&store).await;
        store.fail_next(2).await;
        let outcome = a.find_or_create_session(&identity("user_a")).await;
        assert!(matches!(outcome, Ok(MatchOutcome::Created { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_store_error() {
        let store = MemoryStore::new();
        let a = matchmaker(&store).await;
        store.fail_next(10).await;
        let outcome = a.find_or_create_session(&identity("user_a")).await;
        assert!(matches!(outcome, Err(MatchError::Store(StoreError::Unavailable(_)))));
    }

    #[test]
    fn match_errors_convert_to_chameleon_error() {
        let err: ChameleonError = MatchError::Store(StoreError::Timeout("query".into())).into();
        assert!(matches!(err, ChameleonError::Matchmaking(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn key_generation_failure_is_reported() {
        let store = MemoryStore::new();
        let a = Matchmaker::new(
            Arc::new(store.connect().await),
            SessionPaths::new(""),
            MatchmakerConfig::default(),
        );
        let outcome = a.find_or_create_session(&identity("user_a")).await;
        assert!(matches!(outcome, Err(MatchError::KeyGeneration(_))));
    }
}
