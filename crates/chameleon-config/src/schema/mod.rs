//! Configuration schema types for Chameleon.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the coordinator was tuned for.

mod presence;
mod session;
mod store;
mod system;

pub use presence::*;
pub use session::*;
pub use store::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Chameleon.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ChameleonConfig {
    pub store: StoreConfig,
    pub matchmaking: MatchmakingConfig,
    pub typing: TypingConfig,
    pub retry: RetryConfig,
    pub presence: PresenceConfig,
    pub janitor: JanitorConfig,
    pub logging: LoggingConfig,
    pub sim: SimConfig,
}

// =============================================================================
// Tests
// =============================================================================
