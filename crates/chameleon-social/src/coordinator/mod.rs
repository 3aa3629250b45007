//! Session coordinator.
//!
//! Owns the client-visible [`ConnectionStatus`] and every transition of
//! it: matchmaking, attaching to a session (presence plus feeds), reacting
//! to remote record changes, and deliberate leave.

mod session;
mod status;
mod subscription;


pub use session::{CoordinatorConfig, CoordinatorError, Delivery, SessionCoordinator};
pub use status::{ClientView, ConnectionStatus, StatusKind};
pub use subscription::{Feed, SessionEvent};
