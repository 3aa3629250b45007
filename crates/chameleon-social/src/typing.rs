//! Typing indicator for the local participant.
//!
//! Each keystroke notification sets the flag and restarts an expiry
//! timer; if no further notification arrives before it fires, the flag is
//! cleared. Only one timer is ever pending.

use std::sync::Arc;
use std::time::Duration;

use chameleon_common::{ClientId, SessionId};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::model::SessionPaths;
use crate::store::{Store, StorePath};

pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_millis(3000);

pub struct TypingSignal {
    store: Arc<dyn Store>,
    paths: SessionPaths,
    timeout: Duration,
    pending: Option<JoinHandle<()>>,
}

impl TypingSignal {
    pub fn new(store: Arc<dyn Store>, paths: SessionPaths, timeout: Duration) -> Self {
        Self {
            store,
            paths,
            timeout,
            pending: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn has_pending_timer(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Set the flag and (re)start the expiry timer.
    pub async fn notify_typing(&mut self, session_id: &SessionId, client: &ClientId) {
        self.cancel();
        let path = self.paths.typing(session_id, client);
        write_flag(self.store.as_ref(), &path, true).await;

        let store = Arc::clone(&self.store);
        let timeout = self.timeout;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            write_flag(store.as_ref(), &path, false).await;
        }));
    }

    /// Cancel the timer and clear the flag now.
    pub async fn clear(&mut self, session_id: &SessionId, client: &ClientId) {
        self.cancel();
        write_flag(self.store.as_ref(), &self.paths.typing(session_id, client), false).await;
    }

    /// Cancel the timer without touching the store.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for TypingSignal {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn write_flag(store: &dyn Store, path: &StorePath, typing: bool) {
    if let Err(e) = store.write(path, Value::Bool(typing)).await {
        warn!(path = %path, typing, error = %e, "Failed to write typing flag");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    async fn flag(store: &MemoryStore) -> Option<Value> {
        store
            .snapshot(&StorePath::parse("sessions/s1/typingStatus/user_a"))
            .await
    }

    async fn signal(store: &MemoryStore) -> TypingSignal {
        TypingSignal::new(
            Arc::new(store.connect().await),
            SessionPaths::default(),
            DEFAULT_TYPING_TIMEOUT,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn flag_expires_after_timeout() {
        let store = MemoryStore::new();
        let mut typing = signal(&store).await;
        let (sid, me) = (SessionId::from("s1"), ClientId::from("user_a"));

        typing.notify_typing(&sid, &me).await;
        assert_eq!(flag(&store).await, Some(json!(true)));

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(flag(&store).await, Some(json!(true)));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(flag(&store).await, Some(json!(false)));
        assert!(!typing.has_pending_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_notifications_restart_timer() {
        let store = MemoryStore::new();
        let mut typing = signal(&store).await;
        let (sid, me) = (SessionId::from("s1"), ClientId::from("user_a"));

        typing.notify_typing(&sid, &me).await;
        tokio::time::sleep(Duration::from_millis(2000)).await;
        typing.notify_typing(&sid, &me).await;
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(flag(&store).await, Some(json!(true)));

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(flag(&store).await, Some(json!(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_timer_immediately() {
        let store = MemoryStore::new();
        let mut typing = signal(&store).await;
        let (sid, me) = (SessionId::from("s1"), ClientId::from("user_a"));

        typing.notify_typing(&sid, &me).await;
        typing.clear(&sid, &me).await;
        assert_eq!(flag(&store).await, Some(json!(false)));
        assert!(!typing.has_pending_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_leaves_flag_untouched() {
        let store = MemoryStore::new();
        let mut typing = signal(&store).await;
        let (sid, me) = (SessionId::from("s1"), ClientId::from("user_a"));

        typing.notify_typing(&sid, &me).await;
        typing.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(flag(&store).await, Some(json!(true)));
    }
}
