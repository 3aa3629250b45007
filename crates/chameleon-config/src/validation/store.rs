//! Validation for store layout and matchmaking.

use std::sync::LazyLock;

use regex::Regex;

use crate::schema::ChameleonConfig;

use super::helpers::validate_range;

static PATH_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// A sessions path is a single store path segment.
pub(crate) fn validate_store(errors: &mut Vec<String>, config: &ChameleonConfig) {
    if !PATH_SEGMENT_RE.is_match(&config.store.sessions_path) {
        errors.push(format!(
            "store.sessions_path = {:?} must match ^[A-Za-z0-9_-]+$",
            config.store.sessions_path
        ));
    }
}

/// Validate matchmaking constraints.
pub(crate) fn validate_matchmaking(errors: &mut Vec<String>, config: &ChameleonConfig) {
    validate_range(
        errors,
        "matchmaking.candidate_limit",
        config.matchmaking.candidate_limit,
        1,
        50,
    );
}
