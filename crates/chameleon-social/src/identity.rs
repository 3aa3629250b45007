//! Stable per-device client identity.
//!
//! The client id is generated once and persisted as a small JSON file so
//! the same device keeps its id across runs. The alias is not persisted:
//! a fresh one is picked for every session.

use std::path::{Path, PathBuf};

use chameleon_common::{ChameleonError, ClientId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::names::random_alias;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("identity file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("no data directory available for the identity file")]
    NoDataDir,
}

impl From<IdentityError> for ChameleonError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Io(e) => ChameleonError::Io(e),
            other => ChameleonError::Identity(other.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredIdentity {
    client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub id: ClientId,
    pub alias: String,
}

impl ClientIdentity {
    pub fn new(id: ClientId, alias: impl Into<String>) -> Self {
        Self {
            id,
            alias: alias.into(),
        }
    }

    /// A brand new identity, not persisted anywhere.
    pub fn generate() -> Self {
        Self::new(ClientId::generate(), random_alias())
    }

    /// Platform location of the identity file.
    pub fn default_path() -> Result<PathBuf, IdentityError> {
        dirs::data_dir()
            .map(|dir| dir.join("chameleon").join("identity.json"))
            .ok_or(IdentityError::NoDataDir)
    }

    /// Read the client id from `path`, creating the file with a new id if
    /// it does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self, IdentityError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let stored: StoredIdentity =
                    serde_json::from_str(&contents).map_err(|e| IdentityError::Corrupt {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                if stored.client_id.as_str().is_empty() {
                    return Err(IdentityError::Corrupt {
                        path: path.to_path_buf(),
                        message: "empty client id".into(),
                    });
                }
                debug!(path = %path.display(), client = %stored.client_id, "Loaded identity");
                Ok(Self::new(stored.client_id, random_alias()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let identity = Self::generate();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let stored = StoredIdentity {
                    client_id: identity.id.clone(),
                };
                let json = serde_json::to_string_pretty(&stored).map_err(|e| {
                    IdentityError::Corrupt {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    }
                })?;
                std::fs::write(path, json)?;
                info!(path = %path.display(), client = %identity.id, "Created new identity");
                Ok(identity)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Same id, new alias.
    pub fn with_fresh_alias(&self) -> Self {
        Self::new(self.id.clone(), random_alias())
    }
}
