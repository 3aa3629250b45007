//! Validation for typing expiry and the retry policy.

use crate::schema::ChameleonConfig;

use super::helpers::validate_range;

/// Validate typing constraints.
pub(crate) fn validate_typing(errors: &mut Vec<String>, config: &ChameleonConfig) {
    validate_range(
        errors,
        "typing.timeout_ms",
        config.typing.timeout_ms,
        500,
        30_000,
    );
}

/// Validate retry constraints.
pub(crate) fn validate_retry(errors: &mut Vec<String>, config: &ChameleonConfig) {
    validate_range(errors, "retry.max_attempts", config.retry.max_attempts, 1, 10);
    validate_range(
        errors,
        "retry.base_delay_ms",
        config.retry.base_delay_ms,
        10,
        10_000,
    );
    validate_range(
        errors,
        "retry.max_delay_ms",
        config.retry.max_delay_ms,
        10,
        60_000,
    );
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        errors.push(format!(
            "retry.base_delay_ms = {} exceeds retry.max_delay_ms = {}",
            config.retry.base_delay_ms, config.retry.max_delay_ms
        ));
    }
}
