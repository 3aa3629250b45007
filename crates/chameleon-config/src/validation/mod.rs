//! Full configuration validation.
//!
//! Validates all numeric ranges and the store path format. Each domain has
//! its own submodule; this orchestrator calls them all and collects errors
//! into a single `ConfigError`.

mod helpers;
mod misc;
mod session;
mod store;

#[cfg(test)]
mod tests;

use crate::schema::ChameleonConfig;
use chameleon_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ChameleonConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    store::validate_store(&mut errors, config);
    store::validate_matchmaking(&mut errors, config);
    session::validate_typing(&mut errors, config);
    session::validate_retry(&mut errors, config);
    misc::validate_presence(&mut errors, config);
    misc::validate_janitor(&mut errors, config);
    misc::validate_logging(&mut errors, config);
    misc::validate_sim(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
