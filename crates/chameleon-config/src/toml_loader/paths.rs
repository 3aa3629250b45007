//! Where `config.toml` lives, and seeding it with the documented template.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chameleon_common::ConfigError;
use tracing::{debug, info};

use super::template::default_config_toml;

/// Points at a config file to use instead of the platform default.
pub const CONFIG_PATH_ENV: &str = "CHAMELEON_CONFIG";

const APP_DIR: &str = "chameleon";
const CONFIG_FILE: &str = "config.toml";

/// `$CHAMELEON_CONFIG` if set, otherwise `chameleon/config.toml` under the
/// platform config directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
        .ok_or_else(|| ConfigError::ParseError("no config directory on this platform".into()))
}

/// Write the template to `path` unless something is already there, e.g.
/// written by another simulator started at the same time. Returns whether
/// this call created the file.
pub fn create_default_config(path: &Path) -> Result<bool, ConfigError> {
    let io_error =
        |action: &str, e: std::io::Error| ConfigError::ParseError(format!("{action} {}: {e}", path.display()));

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_error("cannot create directory for", e))?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "Config appeared before it could be created");
            return Ok(false);
        }
        Err(e) => return Err(io_error("cannot create", e)),
    };
    file.write_all(default_config_toml().as_bytes())
        .map_err(|e| io_error("cannot write", e))?;

    info!(path = %path.display(), "Wrote default config");
    Ok(true)
}
