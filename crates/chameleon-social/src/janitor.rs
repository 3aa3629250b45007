//! Removal of closed sessions nobody acknowledged.
//!
//! A closed record normally disappears when the remaining participant
//! acknowledges the departure. If that client is gone too, the record
//! would linger; the sweep removes it once it has been closed for longer
//! than the grace period.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::{SessionPaths, SessionStatus};
use crate::store::{Store, StoreError};

/// Remove closed sessions last updated more than `grace` before
/// `now_millis`. Records without `updatedAt` are treated as expired.
/// Returns how many were removed.
pub async fn sweep_closed_sessions(
    store: &dyn Store,
    paths: &SessionPaths,
    grace: Duration,
    now_millis: i64,
) -> Result<usize, StoreError> {
    let closed = Value::from(SessionStatus::Closed.as_str());
    let candidates = store
        .query_children(paths.root(), "status", &closed, usize::MAX)
        .await?;

    let cutoff = now_millis.saturating_sub(grace.as_millis() as i64);
    let mut removed = 0;
    for (key, record) in candidates {
        let updated_at = record.get("updatedAt").and_then(Value::as_i64);
        if updated_at.is_some_and(|t| t > cutoff) {
            continue;
        }
        let path = paths.root().child(&key);
        match store.remove(&path).await {
            Ok(()) => {
                info!(session = %key, "Swept closed session");
                removed += 1;
            }
            Err(e) => warn!(session = %key, error = %e, "Failed to sweep closed session"),
        }
    }
    debug!(removed, "Closed-session sweep finished");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StorePath};
    use serde_json::json;

    #[tokio::test]
    async fn sweeps_only_expired_closed_sessions() {
        let store = MemoryStore::new();
        let conn = store.connect().await;
        let docs = [
            ("old", json!({ "status": "closed", "updatedAt": 1_000 })),
            ("fresh", json!({ "status": "closed", "updatedAt": 95_000 })),
            ("undated", json!({ "status": "closed" })),
            ("live", json!({ "status": "active", "updatedAt": 1_000 })),
        ];
        for (key, doc) in docs {
            conn.write(&StorePath::parse("sessions").child(key), doc)
                .await
                .unwrap();
        }

        let removed = sweep_closed_sessions(
            &conn,
            &SessionPaths::default(),
            Duration::from_secs(10),
            100_000,
        )
        .await
        .unwrap();

        assert_eq!(removed, 2);
        let remaining = store.snapshot(&StorePath::parse("sessions")).await.unwrap();
        let mut keys: Vec<&String> = remaining.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["fresh", "live"]);
    }

    #[tokio::test]
    async fn empty_store_sweeps_nothing() {
        let store = MemoryStore::new();
        let conn = store.connect().await;
        let removed = sweep_closed_sessions(&conn, &SessionPaths::default(), Duration::ZERO, 0)
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }
}
