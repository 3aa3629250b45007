//! Store layout and matchmaking configuration types.

use serde::{Deserialize, Serialize};

/// Where session records live in the shared store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Top-level path holding one child per session.
    pub sessions_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sessions_path: "sessions".into(),
        }
    }
}

/// Matchmaker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    /// Waiting records fetched per attempt (valid range: 1-50).
    pub candidate_limit: u32,
    /// Remove this client's own leftover waiting records while scanning.
    pub cleanup_stale_self_sessions: bool,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 5,
            cleanup_stale_self_sessions: true,
        }
    }
}
