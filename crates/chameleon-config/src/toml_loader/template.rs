//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Chameleon Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[store]
# sessions_path = "sessions"   # letters, digits, '_' and '-'

[matchmaking]
# candidate_limit = 5          # 1-50
# cleanup_stale_self_sessions = true

[typing]
# timeout_ms = 3000            # 500-30000

[retry]
# max_attempts = 3             # 1-10
# base_delay_ms = 100          # 10-10000
# max_delay_ms = 2000          # 10-60000

[presence]
# lease_secs = 30              # 5-600
# reaper_interval_secs = 10    # 1-300

[janitor]
# closed_grace_secs = 120      # 10-86400
# sweep_interval_secs = 60     # 5-3600

[logging]
# level = "chameleon=info"     # any tracing filter directive

[sim]
# clients = 4                  # 2-64
"##
    .to_string()
}
