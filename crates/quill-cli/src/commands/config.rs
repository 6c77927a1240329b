use std::path::{Path, PathBuf};

use quill_core::EngineConfig;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::common::{load_config, resolve_db_path};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct EffectiveConfig<'a> {
    config_path: &'a Path,
    database_path: PathBuf,
    remote_url: &'a str,
    request_timeout_secs: u64,
    sync_interval_secs: u64,
}

pub fn run_config(
    command: ConfigCommands,
    config_path: &Path,
    cli_db_path: Option<PathBuf>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let config = load_config(config_path)?;
            let effective = EffectiveConfig {
                config_path,
                database_path: resolve_db_path(cli_db_path, &config)?,
                remote_url: &config.remote_url,
                request_timeout_secs: config.request_timeout_secs,
                sync_interval_secs: config.sync_interval_secs,
            };
            println!("{}", serde_json::to_string_pretty(&effective)?);
        }
        ConfigCommands::Path => println!("{}", config_path.display()),
        ConfigCommands::Set {
            remote_url,
            database_path,
            request_timeout_secs,
            sync_interval_secs,
        } => {
            let updates = ConfigUpdates {
                remote_url,
                database_path,
                request_timeout_secs,
                sync_interval_secs,
            };
            if updates.is_empty() {
                return Err(CliError::Config(
                    "Nothing to set; pass at least one option".to_string(),
                ));
            }
            set_config_values(config_path, updates)?;
            println!("Updated {}", config_path.display());
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct ConfigUpdates {
    pub remote_url: Option<String>,
    pub database_path: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub sync_interval_secs: Option<u64>,
}

impl ConfigUpdates {
    const fn is_empty(&self) -> bool {
        self.remote_url.is_none()
            && self.database_path.is_none()
            && self.request_timeout_secs.is_none()
            && self.sync_interval_secs.is_none()
    }
}

/// Write `updates` into the file at `config_path`.
///
/// Environment overrides are not persisted.
pub fn set_config_values(
    config_path: &Path,
    updates: ConfigUpdates,
) -> Result<EngineConfig, CliError> {
    let mut config = EngineConfig::load_from_path(config_path)?;

    if let Some(remote_url) = updates.remote_url {
        config.remote_url = remote_url;
    }
    if let Some(database_path) = updates.database_path {
        config.database_path = Some(database_path);
    }
    if let Some(secs) = updates.request_timeout_secs {
        config.request_timeout_secs = secs;
    }
    if let Some(secs) = updates.sync_interval_secs {
        config.sync_interval_secs = secs;
    }

    config.save_to_path(config_path)?;
    Ok(EngineConfig::load_from_path(config_path)?)
}
