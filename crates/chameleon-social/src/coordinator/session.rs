//! Per-client session state machine.

use std::sync::Arc;
use std::time::Duration;

use chameleon_common::{ClientId, MessageId, SessionId};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::chat::{normalize_text, order_messages, MessageChannel};
use crate::identity::ClientIdentity;
use crate::matchmaker::{MatchOutcome, Matchmaker, MatchmakerConfig, Withdrawal};
use crate::model::{
    closed_fields, reverted_document, ChatMessage, ChatSession, SessionPaths, SessionPhase,
    SessionRecord,
};
use crate::presence::PresenceManager;
use crate::retry::RetryPolicy;
use crate::store::{ConditionalOutcome, Snapshot, Store, StoreError};
use crate::typing::{TypingSignal, DEFAULT_TYPING_TIMEOUT};

use super::status::{ClientView, ConnectionStatus};
use super::subscription::{Feed, SessionEvent, SessionSubscription};

pub(crate) const REASON_ENDED_ABRUPTLY: &str = "Chat session ended abruptly.";
pub(crate) const REASON_CLOSED_UNEXPECTEDLY: &str = "Chat session was closed unexpectedly.";
pub(crate) const REASON_NOT_PARTICIPANT: &str = "This chat session no longer includes you.";
pub(crate) const REASON_MALFORMED: &str = "Chat session data could not be read.";
pub(crate) const REASON_NO_IDENTITY: &str =
    "No client identity is available. Check that local storage is writable and try again.";

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub paths: SessionPaths,
    pub matchmaker: MatchmakerConfig,
    pub typing_timeout: Duration,
    /// Retry policy for subscribe and cleanup calls.
    pub retry: RetryPolicy,
    /// Consecutive transient feed errors tolerated before giving up.
    pub max_resubscribe_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            paths: SessionPaths::default(),
            matchmaker: MatchmakerConfig::default(),
            typing_timeout: DEFAULT_TYPING_TIMEOUT,
            retry: RetryPolicy::default(),
            max_resubscribe_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent(MessageId),
    /// Not connected, or nothing to send.
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("message could not be delivered: {0}")]
    Store(#[from] StoreError),
}

/// Drives one client through matchmaking, the live session, and teardown.
///
/// All transitions of [`ConnectionStatus`] happen here. Remote changes
/// arrive as [`SessionEvent`]s; events for any session other than the one
/// currently attached are discarded.
pub struct SessionCoordinator {
    store: Arc<dyn Store>,
    config: CoordinatorConfig,
    identity: Option<ClientIdentity>,

    matchmaker: Matchmaker,
    presence: PresenceManager,
    channel: MessageChannel,
    typing: TypingSignal,

    status: ConnectionStatus,
    messages: Vec<ChatMessage>,
    partner_typing: bool,

    active_session: Option<SessionId>,
    subscription: Option<SessionSubscription>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    feed_failures: u32,

    view_tx: watch::Sender<ClientView>,
}

impl SessionCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        identity: Option<ClientIdentity>,
        config: CoordinatorConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(ClientView::default());
        Self {
            matchmaker: Matchmaker::new(
                Arc::clone(&store),
                config.paths.clone(),
                config.matchmaker.clone(),
            ),
            presence: PresenceManager::new(Arc::clone(&store), config.paths.clone()),
            channel: MessageChannel::new(Arc::clone(&store), config.paths.clone()),
            typing: TypingSignal::new(
                Arc::clone(&store),
                config.paths.clone(),
                config.typing_timeout,
            ),
            store,
            config,
            identity,
            status: ConnectionStatus::Idle,
            messages: Vec::new(),
            partner_typing: false,
            active_session: None,
            subscription: None,
            events_tx,
            events_rx,
            feed_failures: 0,
            view_tx,
        }
    }

    // -- Accessors --------------------------------------------------------

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn partner_typing(&self) -> bool {
        self.partner_typing
    }

    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    pub fn active_session(&self) -> Option<&SessionId> {
        self.active_session.as_ref()
    }

    pub fn view(&self) -> ClientView {
        self.view_tx.borrow().clone()
    }

    /// Receiver that sees every published [`ClientView`].
    pub fn watch_view(&self) -> watch::Receiver<ClientView> {
        self.view_tx.subscribe()
    }

    // -- User actions -----------------------------------------------------

    /// Start a new match. Whatever session this client was in is left
    /// deliberately first. Ignored while an attempt is already running.
    pub async fn connect(&mut self) -> &ConnectionStatus {
        if matches!(self.status, ConnectionStatus::Connecting) {
            debug!("Connect ignored, attempt already in flight");
            return &self.status;
        }
        self.leave().await;

        let Some(identity) = self.identity.as_mut() else {
            warn!("Connect attempted without a client identity");
            self.set_status(ConnectionStatus::Error {
                reason: REASON_NO_IDENTITY.into(),
            });
            return &self.status;
        };
        *identity = identity.with_fresh_alias();
        let me = identity.clone();

        self.set_status(ConnectionStatus::Connecting);
        let outcome = match self.matchmaker.find_or_create_session(&me).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(client = %me.id, error = %e, "Matchmaking failed");
                self.set_status(ConnectionStatus::Error {
                    reason: format!("Connection error: {e}"),
                });
                return &self.status;
            }
        };

        let session_id = outcome.session_id().clone();
        if let Err(e) = self.attach(&session_id, &me.id).await {
            warn!(session = %session_id, error = %e, "Failed to attach to session");
            self.detach().await;
            self.abandon(&outcome, &me.id).await;
            self.set_status(ConnectionStatus::Error {
                reason: format!("Connection error: {e}"),
            });
            return &self.status;
        }

        let status = match outcome {
            MatchOutcome::Created { session_id } => ConnectionStatus::Waiting { session_id },
            MatchOutcome::Claimed {
                session_id,
                partner,
            } => ConnectionStatus::Connected {
                session_id,
                partner,
            },
        };
        self.set_status(status);
        &self.status
    }

    /// Leave the current session deliberately and reset to `Idle`.
    pub async fn leave(&mut self) {
        let me = self.identity.as_ref().map(|i| i.id.clone());
        match (self.status.clone(), me) {
            (ConnectionStatus::Waiting { session_id }, Some(me)) => {
                self.detach().await;
                self.withdraw(&session_id, &me).await;
            }
            (ConnectionStatus::Connected { session_id, .. }, Some(me)) => {
                self.typing.clear(&session_id, &me).await;
                self.detach().await;
                let path = self.config.paths.session(&session_id);
                let result = self
                    .config
                    .retry
                    .run("close_session", || self.store.update(&path, closed_fields(&me)))
                    .await;
                match result {
                    Ok(()) => info!(session = %session_id, "Left session"),
                    Err(e) => warn!(session = %session_id, error = %e, "Failed to mark session closed"),
                }
            }
            (ConnectionStatus::PartnerLeft { session_id, .. }, _) => {
                self.detach().await;
                self.remove_record(&session_id).await;
                info!(session = %session_id, "Acknowledged partner departure");
            }
            _ => self.detach().await,
        }
        self.reset();
    }

    /// Send `text` to the partner. Rejected unless connected and the text
    /// is non-blank.
    pub async fn send_message(&mut self, text: &str) -> Result<Delivery, CoordinatorError> {
        let (ConnectionStatus::Connected { session_id, .. }, Some(identity)) =
            (&self.status, &self.identity)
        else {
            debug!(status = %self.status, "Send rejected, not connected");
            return Ok(Delivery::Rejected);
        };
        let Some(text) = normalize_text(text) else {
            return Ok(Delivery::Rejected);
        };
        let session_id = session_id.clone();
        let me = identity.id.clone();

        self.typing.clear(&session_id, &me).await;
        let id = self.channel.append(&session_id, &me, text).await?;
        Ok(Delivery::Sent(id))
    }

    /// Mark this client as typing. No-op unless connected.
    pub async fn notify_typing(&mut self) {
        let (ConnectionStatus::Connected { session_id, .. }, Some(identity)) =
            (&self.status, &self.identity)
        else {
            return;
        };
        let (session_id, me) = (session_id.clone(), identity.id.clone());
        self.typing.notify_typing(&session_id, &me).await;
    }

    /// Leave and release everything held in the store.
    pub async fn shutdown(&mut self) {
        self.leave().await;
        debug!("Coordinator shut down");
    }

    // -- Remote updates ---------------------------------------------------

    /// Wait for the next feed event. Returns `None` when no session is
    /// attached. Cancel safe.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.subscription.is_none() {
            self.drain_events();
            return None;
        }
        self.events_rx.recv().await
    }

    /// Apply one feed event and return the resulting status.
    pub async fn apply_event(&mut self, event: SessionEvent) -> &ConnectionStatus {
        if self.active_session.as_ref() != Some(&event.session_id) {
            debug!(session = %event.session_id, "Dropping event for inactive session");
            return &self.status;
        }
        let session_id = event.session_id;
        match (event.feed, event.item) {
            (Feed::Record, Ok(snapshot)) => {
                self.feed_failures = 0;
                self.apply_record(session_id, snapshot).await;
            }
            (Feed::Messages, Ok(snapshot)) => {
                self.feed_failures = 0;
                self.messages = order_messages(snapshot.as_ref());
                self.publish();
            }
            (feed, Err(e)) => self.on_feed_error(session_id, feed, e).await,
        }
        &self.status
    }

    /// Wait for and apply the next feed event.
    pub async fn next_update(&mut self) -> Option<ConnectionStatus> {
        let event = self.next_event().await?;
        Some(self.apply_event(event).await.clone())
    }

    async fn apply_record(&mut self, session_id: SessionId, snapshot: Snapshot) {
        let Some(me) = self.identity.as_ref().map(|i| i.id.clone()) else {
            return;
        };
        let Some(value) = snapshot else {
            warn!(session = %session_id, "Session record vanished");
            self.fail_session(REASON_ENDED_ABRUPTLY).await;
            return;
        };

        let path = self.config.paths.session(&session_id);
        let decoded = SessionRecord::decode(&path, &value).and_then(|record| {
            let unsettled = record.is_unsettled_claim();
            ChatSession::from_record(session_id.clone(), record).map(|s| (s, unsettled))
        });
        let (session, unsettled) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(session = %session_id, error = %e, "Undecodable session record");
                self.fail_session(REASON_MALFORMED).await;
                return;
            }
        };

        if !session.is_participant(&me) {
            warn!(session = %session_id, client = %me, "Client is not a participant of its session");
            self.fail_session(REASON_NOT_PARTICIPANT).await;
            return;
        }

        match &session.phase {
            SessionPhase::Waiting => {
                if unsettled && session.host.id == me {
                    self.revert_unsettled_claim(&session_id, &value).await;
                }
                self.partner_typing = false;
                self.set_status(ConnectionStatus::Waiting { session_id });
            }
            SessionPhase::Active { .. } => {
                let Some(partner) = session.partner_of(&me).cloned() else {
                    return;
                };
                self.partner_typing = session.is_typing(&partner.id);
                self.set_status(ConnectionStatus::Connected {
                    session_id,
                    partner,
                });
            }
            SessionPhase::Closed { closed_by, .. } => {
                self.apply_closed(&session, closed_by.clone(), &me).await;
            }
        }
    }

    async fn apply_closed(&mut self, session: &ChatSession, closed_by: Option<ClientId>, me: &ClientId) {
        let partner = session.partner_of(me).cloned();
        match (closed_by, partner) {
            (Some(closer), Some(partner)) if closer == partner.id => {
                info!(session = %session.id, partner = %partner.id, "Partner left the session");
                self.detach().await;
                self.partner_typing = false;
                self.set_status(ConnectionStatus::PartnerLeft {
                    session_id: session.id.clone(),
                    partner,
                });
            }
            (Some(closer), _) if closer == *me => {
                info!(session = %session.id, "Session closed on this client's behalf");
                self.detach().await;
                self.reset();
            }
            (closer, _) => {
                warn!(session = %session.id, closed_by = ?closer, "Session closed by unknown party");
                self.fail_session(REASON_CLOSED_UNEXPECTEDLY).await;
            }
        }
    }

    /// An active record with no second participant goes back to waiting,
    /// but only if nobody has touched it since it was observed.
    async fn revert_unsettled_claim(&self, session_id: &SessionId, observed: &Value) {
        let path = self.config.paths.session(session_id);
        match self
            .store
            .conditional_update(&path, Some(observed), reverted_document(observed))
            .await
        {
            Ok(ConditionalOutcome::Applied) => {
                info!(session = %session_id, "Reset unsettled claim to waiting");
            }
            Ok(ConditionalOutcome::Conflict) => {
                debug!(session = %session_id, "Unsettled claim changed before reset");
            }
            Err(e) => warn!(session = %session_id, error = %e, "Failed to reset unsettled claim"),
        }
    }

    async fn on_feed_error(&mut self, session_id: SessionId, feed: Feed, error: StoreError) {
        if !error.is_transient() || self.feed_failures >= self.config.max_resubscribe_attempts {
            warn!(session = %session_id, ?feed, error = %error, "Session feed failed");
            self.fail_session(&format!("Connection error: {error}")).await;
            return;
        }

        self.feed_failures += 1;
        warn!(
            session = %session_id,
            ?feed,
            attempt = self.feed_failures,
            error = %error,
            "Transient feed error, resubscribing"
        );
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
        match SessionSubscription::open(
            &self.store,
            &self.config.paths,
            &session_id,
            &self.config.retry,
            &self.events_tx,
        )
        .await
        {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => self.fail_session(&format!("Connection error: {e}")).await,
        }
    }

    // -- Attach / detach --------------------------------------------------

    async fn attach(&mut self, session_id: &SessionId, me: &ClientId) -> Result<(), StoreError> {
        self.active_session = Some(session_id.clone());
        self.feed_failures = 0;
        self.presence.arm(session_id, me).await?;
        let subscription = SessionSubscription::open(
            &self.store,
            &self.config.paths,
            session_id,
            &self.config.retry,
            &self.events_tx,
        )
        .await?;
        self.subscription = Some(subscription);
        debug!(session = %session_id, "Attached to session");
        Ok(())
    }

    /// Stop listening, cancel timers, and disarm presence. The status and
    /// transcript are left alone.
    async fn detach(&mut self) {
        self.active_session = None;
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
            debug!(session = %subscription.session_id(), "Detached from session");
        }
        self.typing.cancel();
        self.presence.disarm_all().await;
        self.drain_events();
    }

    /// Cancel a waiting session. A guest who claimed it before this client
    /// noticed is told the host left.
    async fn withdraw(&self, session_id: &SessionId, me: &ClientId) {
        match self.matchmaker.withdraw(session_id, me).await {
            Ok(Withdrawal::Closed { guest }) => {
                info!(session = %session_id, guest = %guest, "Cancelled waiting session after it was claimed")
            }
            Ok(_) => info!(session = %session_id, "Cancelled waiting session"),
            Err(e) => warn!(session = %session_id, error = %e, "Failed to cancel waiting session"),
        }
    }

    /// Undo a match whose feeds could not be set up.
    async fn abandon(&self, outcome: &MatchOutcome, me: &ClientId) {
        let session_id = outcome.session_id();
        match outcome {
            MatchOutcome::Created { .. } => self.withdraw(session_id, me).await,
            MatchOutcome::Claimed { .. } => {
                let path = self.config.paths.session(session_id);
                if let Err(e) = self.store.update(&path, closed_fields(me)).await {
                    warn!(session = %session_id, error = %e, "Failed to abandon session");
                }
            }
        }
    }

    async fn fail_session(&mut self, reason: &str) {
        self.detach().await;
        self.partner_typing = false;
        self.set_status(ConnectionStatus::Error {
            reason: reason.to_string(),
        });
    }

    async fn remove_record(&self, session_id: &SessionId) {
        let path = self.config.paths.session(session_id);
        if let Err(e) = self
            .config
            .retry
            .run("remove_session", || self.store.remove(&path))
            .await
        {
            warn!(session = %session_id, error = %e, "Failed to remove session record");
        }
    }

    fn drain_events(&mut self) {
        while self.events_rx.try_recv().is_ok() {}
    }

    // -- State ------------------------------------------------------------

    fn reset(&mut self) {
        self.messages.clear();
        self.partner_typing = false;
        self.set_status(ConnectionStatus::Idle);
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            info!(from = %self.status, to = %status, "Connection status changed");
            self.status = status;
        }
        self.publish();
    }

    fn publish(&self) {
        self.view_tx.send_replace(ClientView {
            status: self.status.clone(),
            messages: self.messages.clone(),
            partner_typing: self.partner_typing,
        });
    }
}
