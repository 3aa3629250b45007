//! Client-facing connection state.

use chameleon_common::SessionId;

use crate::model::{ChatMessage, Participant};

/// The single connection state a client shows.
///
/// The partner travels inside the states that have one, so a connected
/// client without a partner cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Waiting {
        session_id: SessionId,
    },
    Connected {
        session_id: SessionId,
        partner: Participant,
    },
    /// The partner closed the session. The transcript stays visible.
    PartnerLeft {
        session_id: SessionId,
        partner: Participant,
    },
    Error {
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Idle,
    Connecting,
    Waiting,
    Connected,
    PartnerLeft,
    Error,
}

impl ConnectionStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Idle => StatusKind::Idle,
            Self::Connecting => StatusKind::Connecting,
            Self::Waiting { .. } => StatusKind::Waiting,
            Self::Connected { .. } => StatusKind::Connected,
            Self::PartnerLeft { .. } => StatusKind::PartnerLeft,
            Self::Error { .. } => StatusKind::Error,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Waiting { session_id }
            | Self::Connected { session_id, .. }
            | Self::PartnerLeft { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    pub fn partner(&self) -> Option<&Participant> {
        match self {
            Self::Connected { partner, .. } | Self::PartnerLeft { partner, .. } => Some(partner),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn error_reason(&self) -> Option<&str> {
        match self {
            Self::Error { reason } => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Waiting { session_id } => write!(f, "waiting ({session_id})"),
            Self::Connected { partner, .. } => write!(f, "connected to {}", partner.display_name()),
            Self::PartnerLeft { partner, .. } => write!(f, "{} left", partner.display_name()),
            Self::Error { reason } => write!(f, "error: {reason}"),
        }
    }
}

/// Everything a UI needs to render one client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientView {
    pub status: ConnectionStatus,
    pub messages: Vec<ChatMessage>,
    pub partner_typing: bool,
}
