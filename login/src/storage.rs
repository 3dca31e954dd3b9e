//! Cached credentials on disk.
//!
//! Location: `~/.config/docshare/goog-cred.json`. The directory is created
//! with mode 0700 and the file is written with mode 0600.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::oauth::TokenResponse;

const CONFIG_DIR: &str = ".config/docshare";
const TOKEN_FILE: &str = "goog-cred.json";

/// Access tokens this close to expiry are treated as expired.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absent means the token never expires.
    #[serde(default, rename = "expiry", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = response
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .map(|secs| now + Duration::seconds(secs));
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_BUFFER_SECS) >= expires_at,
            None => false,
        }
    }

    /// Refresh responses usually omit the refresh token; keep the old one.
    pub fn retain_refresh_token(mut self, previous: &str) -> Self {
        if self.refresh_token.as_deref().is_none_or(str::is_empty) {
            self.refresh_token = Some(previous.to_string());
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct TokenStorage {
    file_path: PathBuf,
}

impl TokenStorage {
    /// Storage at the default location under the home directory.
    pub fn new() -> Self {
        let base = match dirs::home_dir() {
            Some(home) => home,
            None => {
                warn!("home directory not found, storing credentials relative to the working directory");
                PathBuf::new()
            }
        };
        Self::with_path(base.join(CONFIG_DIR).join(TOKEN_FILE))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { file_path: path }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// `Ok(None)` when nothing has been stored yet.
    pub fn load(&self) -> Result<Option<StoredToken>, StorageError> {
        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, token: &StoredToken) -> Result<(), StorageError> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
            restrict(parent, 0o700).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(token)?;
        fs::write(&self.file_path, content).map_err(|source| self.io_error(source))?;
        restrict(&self.file_path, 0o600).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.file_path.clone(),
            source,
        }
    }
}

impl Default for TokenStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn restrict(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
