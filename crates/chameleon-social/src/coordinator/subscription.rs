//! Scoped subscriptions for one session.
//!
//! Both store feeds (the session record and its message list) are pumped
//! by forwarder tasks into one channel, every item tagged with the session
//! it belongs to. Closing the subscription aborts the forwarders, which
//! drops the store subscriptions with them.

use std::sync::Arc;

use chameleon_common::SessionId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::model::SessionPaths;
use crate::retry::RetryPolicy;
use crate::store::{Store, StoreError, StorePath, Subscription, SubscriptionItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Record,
    Messages,
}

/// One delivery from a session feed.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub feed: Feed,
    pub item: SubscriptionItem,
}

pub(crate) struct SessionSubscription {
    session_id: SessionId,
    forwarders: Vec<JoinHandle<()>>,
}

impl SessionSubscription {
    pub(crate) async fn open(
        store: &Arc<dyn Store>,
        paths: &SessionPaths,
        session_id: &SessionId,
        retry: &RetryPolicy,
        tx: &mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self, StoreError> {
        let record = subscribe(store, retry, &paths.session(session_id)).await?;
        let messages = subscribe(store, retry, &paths.messages(session_id)).await?;

        let forwarders = vec![
            spawn_forwarder(record, session_id.clone(), Feed::Record, tx.clone()),
            spawn_forwarder(messages, session_id.clone(), Feed::Messages, tx.clone()),
        ];
        debug!(session = %session_id, "Session feeds subscribed");
        Ok(Self {
            session_id: session_id.clone(),
            forwarders,
        })
    }

    pub(crate) fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub(crate) fn close(&mut self) {
        if self.forwarders.is_empty() {
            return;
        }
        for handle in self.forwarders.drain(..) {
            handle.abort();
        }
        debug!(session = %self.session_id, "Session feeds closed");
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

async fn subscribe(
    store: &Arc<dyn Store>,
    retry: &RetryPolicy,
    path: &StorePath,
) -> Result<Subscription, StoreError> {
    retry.run("subscribe", || store.subscribe(path)).await
}

fn spawn_forwarder(
    mut subscription: Subscription,
    session_id: SessionId,
    feed: Feed,
    tx: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = subscription.recv().await {
            let event = SessionEvent {
                session_id: session_id.clone(),
                feed,
                item,
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    })
}
