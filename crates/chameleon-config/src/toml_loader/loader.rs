//! Reading `config.toml`. Validation is left to the caller.

use std::io::ErrorKind;
use std::path::Path;

use chameleon_common::ConfigError;
use tracing::debug;

use super::paths::{create_default_config, default_config_path};
use crate::schema::ChameleonConfig;

/// Parse the file at `path`. Sections and keys it leaves out keep their
/// defaults; values are not range checked here.
pub fn load_from_path(path: &Path) -> Result<ChameleonConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    let config = toml::from_str::<ChameleonConfig>(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Load from [`default_config_path`]. A missing file is seeded with the
/// template and the defaults are returned.
pub fn load_default() -> Result<ChameleonConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(ChameleonConfig::default())
        }
        loaded => loaded,
    }
}
