//! Rendezvous and session lifecycle for random two-party chat.
//!
//! Clients are paired through a shared document store: the matchmaker
//! claims or creates a waiting session, the presence manager arms
//! server-side cleanup in case the client vanishes, and the session
//! coordinator turns remote record changes into a single client-facing
//! [`ConnectionStatus`].

pub mod chat;
pub mod coordinator;
pub mod identity;
pub mod janitor;
pub mod matchmaker;
pub mod model;
pub mod names;
pub mod presence;
pub mod retry;
pub mod store;
pub mod typing;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{normalize_text, order_messages, MessageChannel};
pub use coordinator::{
    ClientView, ConnectionStatus, CoordinatorConfig, CoordinatorError, Delivery, Feed,
    SessionCoordinator, SessionEvent, StatusKind,
};
pub use identity::{ClientIdentity, IdentityError};
pub use janitor::sweep_closed_sessions;
pub use matchmaker::{MatchError, MatchOutcome, Matchmaker, MatchmakerConfig, Withdrawal};
pub use model::{
    ChatMessage, ChatSession, Participant, SessionPaths, SessionPhase, SessionRecord,
    SessionStatus,
};
pub use names::random_alias;
pub use presence::PresenceManager;
pub use retry::RetryPolicy;
pub use store::{MemoryConnection, MemoryStore, Store, StoreError, StorePath};
pub use typing::{TypingSignal, DEFAULT_TYPING_TIMEOUT};
