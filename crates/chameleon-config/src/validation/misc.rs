//! Validation for smaller config sections: presence, janitor, logging, sim.

use crate::schema::ChameleonConfig;

use super::helpers::validate_range;

/// Validate presence lease constraints.
pub(crate) fn validate_presence(errors: &mut Vec<String>, config: &ChameleonConfig) {
    validate_range(
        errors,
        "presence.lease_secs",
        config.presence.lease_secs,
        5,
        600,
    );
    validate_range(
        errors,
        "presence.reaper_interval_secs",
        config.presence.reaper_interval_secs,
        1,
        300,
    );
}

/// Validate janitor constraints.
pub(crate) fn validate_janitor(errors: &mut Vec<String>, config: &ChameleonConfig) {
    validate_range(
        errors,
        "janitor.closed_grace_secs",
        config.janitor.closed_grace_secs,
        10,
        86_400,
    );
    validate_range(
        errors,
        "janitor.sweep_interval_secs",
        config.janitor.sweep_interval_secs,
        5,
        3600,
    );
}

/// Validate logging constraints.
pub(crate) fn validate_logging(errors: &mut Vec<String>, config: &ChameleonConfig) {
    if config.logging.level.trim().is_empty() {
        errors.push("logging.level must not be empty".into());
    }
}

/// Validate simulator constraints.
pub(crate) fn validate_sim(errors: &mut Vec<String>, config: &ChameleonConfig) {
    validate_range(errors, "sim.clients", config.sim.clients, 2, 64);
}
