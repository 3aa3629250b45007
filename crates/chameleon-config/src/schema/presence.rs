//! Presence lease and closed-session cleanup configuration types.

use serde::{Deserialize, Serialize};

/// Presence lease configuration.
///
/// A connection that has not been seen for `lease_secs` is treated as
/// dropped and its on-disconnect actions fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub lease_secs: u32,
    pub reaper_interval_secs: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            lease_secs: 30,
            reaper_interval_secs: 10,
        }
    }
}

/// Removal of closed sessions nobody acknowledged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    pub closed_grace_secs: u32,
    pub sweep_interval_secs: u32,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            closed_grace_secs: 120,
            sweep_interval_secs: 60,
        }
    }
}
