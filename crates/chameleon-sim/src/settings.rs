//! Translation of the loaded config into runtime settings.

use std::time::Duration;

use chameleon_config::ChameleonConfig;
use chameleon_social::{CoordinatorConfig, MatchmakerConfig, RetryPolicy, SessionPaths};

#[derive(Debug, Clone)]
pub struct SimSettings {
    pub coordinator: CoordinatorConfig,
    pub lease: Duration,
    pub reaper_interval: Duration,
    pub closed_grace: Duration,
    pub sweep_interval: Duration,
    /// How long a client waits for a partner before giving up on a round.
    pub match_timeout: Duration,
}

impl SimSettings {
    pub fn from_config(config: &ChameleonConfig) -> Self {
        let retry = RetryPolicy {
            max_attempts: config.retry.max_attempts,
            base_delay: Duration::from_millis(config.retry.base_delay_ms.into()),
            max_delay: Duration::from_millis(config.retry.max_delay_ms.into()),
        };
        let lease = Duration::from_secs(config.presence.lease_secs.into());
        Self {
            coordinator: CoordinatorConfig {
                paths: SessionPaths::new(&config.store.sessions_path),
                matchmaker: MatchmakerConfig {
                    candidate_limit: config.matchmaking.candidate_limit as usize,
                    cleanup_stale_self_sessions: config.matchmaking.cleanup_stale_self_sessions,
                    retry,
                },
                typing_timeout: Duration::from_millis(config.typing.timeout_ms.into()),
                retry,
                ..CoordinatorConfig::default()
            },
            lease,
            reaper_interval: Duration::from_secs(config.presence.reaper_interval_secs.into()),
            closed_grace: Duration::from_secs(config.janitor.closed_grace_secs.into()),
            sweep_interval: Duration::from_secs(config.janitor.sweep_interval_secs.into()),
            match_timeout: lease,
        }
    }
}
