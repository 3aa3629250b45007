//! Server-side presence for the active session.
//!
//! While a client holds a session it keeps two on-disconnect actions
//! armed in the store: one marking the session closed by this client,
//! one clearing its typing flag. If the client vanishes without leaving,
//! the store runs them and the partner sees the session end.

mod manager;

pub use manager::PresenceManager;
