//! System configuration types: logging and the simulator.

use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "chameleon=info".into(),
        }
    }
}

/// Simulator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of simulated strangers (valid range: 2-64).
    pub clients: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { clients: 4 }
    }
}
