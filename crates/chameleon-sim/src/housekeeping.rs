//! Background loops standing in for the store's server side.

use std::time::Duration;

use chameleon_social::{sweep_closed_sessions, MemoryStore, SessionPaths};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Periodically fire the on-disconnect actions of expired leases.
pub fn spawn_reaper(
    store: MemoryStore,
    lease: Duration,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let reaped = store.reap_expired(lease).await;
                    let live = store.live_connections().await;
                    tracing::debug!(reaped, live, "Reaper tick");
                }
            }
        }
    })
}

/// Periodically remove closed sessions past their grace period.
pub fn spawn_janitor(
    store: MemoryStore,
    paths: SessionPaths,
    grace: Duration,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let conn = store.connect().await;
                    let now = chrono::Utc::now().timestamp_millis();
                    match sweep_closed_sessions(&conn, &paths, grace, now).await {
                        Ok(removed) => tracing::debug!(removed, "Janitor tick"),
                        Err(e) => tracing::warn!(error = %e, "Janitor sweep failed"),
                    }
                    conn.release().await;
                }
            }
        }
    })
}
