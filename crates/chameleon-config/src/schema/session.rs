//! Per-session behavior: typing indicator expiry and store retry policy.

use serde::{Deserialize, Serialize};

/// Typing indicator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    /// Milliseconds after the last keystroke before the flag clears (valid range: 500-30000).
    pub timeout_ms: u32,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self { timeout_ms: 3000 }
    }
}

/// Retry policy for transient store failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u32,
    pub max_delay_ms: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}
