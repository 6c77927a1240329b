//! Engine configuration.
//!
//! Stored as JSON next to the other client settings and overridable through
//! `QUILL_*` environment variables. Binaries resolve the file location; this
//! module only knows how to read, validate and write it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::SyncOptions;
use crate::util::{is_http_url, normalize_text_option};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_REMOTE_URL: &str = "http://127.0.0.1:8787";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

pub const ENV_DB_PATH: &str = "QUILL_DB_PATH";
pub const ENV_REMOTE_URL: &str = "QUILL_REMOTE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "QUILL_REQUEST_TIMEOUT_SECS";
pub const ENV_SYNC_INTERVAL_SECS: &str = "QUILL_SYNC_INTERVAL_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Local database file; binaries pick a platform default when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Period of the reachability probe and background pull
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            remote_url: default_remote_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
        }
    }
}

impl EngineConfig {
    /// Load the config at `path`, or defaults when the file does not exist
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        normalized.validate()?;
        std::fs::write(path, serde_json::to_string_pretty(&normalized)?)?;
        Ok(())
    }

    /// Apply `QUILL_*` overrides read through `lookup`
    ///
    /// Blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| normalize_text_option(lookup(key));

        if let Some(path) = read(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(url) = read(ENV_REMOTE_URL) {
            self.remote_url = url;
        }
        if let Some(raw) = read(ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_secs(ENV_REQUEST_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = read(ENV_SYNC_INTERVAL_SECS) {
            self.sync_interval_secs = parse_secs(ENV_SYNC_INTERVAL_SECS, &raw)?;
        }

        self.normalize();
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.remote_url) {
            return Err(Error::Config(format!(
                "remote_url must include http:// or https:// (got '{}')",
                self.remote_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::Config(
                "sync_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            sync_interval: Duration::from_secs(self.sync_interval_secs),
        }
    }

    fn normalize(&mut self) {
        self.remote_url = self.remote_url.trim().trim_end_matches('/').to_string();
        if self
            .database_path
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            self.database_path = None;
        }
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|error| Error::Config(format!("{key} must be a whole number of seconds: {error}")))
}
