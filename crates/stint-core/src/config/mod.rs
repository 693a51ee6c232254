//! Runtime configuration.
//!
//! Values come from an optional JSON file, then environment overrides. The
//! result decides where the local replica lives and whether a remote replica
//! is reconciled against it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::StoreDescriptor;
use crate::sync::{ReconcilerOptions, DEFAULT_INTERVAL};
use crate::util::{normalize_text_option, parse_flag};

const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR: &str = "stint";
const DEFAULT_DB_FILE: &str = "stint.db";

pub const ENV_LOCAL_STORE: &str = "STINT_LOCAL_STORE";
pub const ENV_REMOTE_STORE: &str = "STINT_REMOTE_STORE";
pub const ENV_SYNC_ENABLED: &str = "STINT_SYNC_ENABLED";
pub const ENV_SYNC_INTERVAL: &str = "STINT_SYNC_INTERVAL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Local store descriptor; defaults to a SQLite file in the data dir
    #[serde(default)]
    pub local: Option<String>,
    /// Remote store descriptor; reconciliation is off without one
    #[serde(default)]
    pub remote: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Duration string such as `60s` or `5m`
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default = "default_true")]
    pub propagate_deletes: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: None,
            propagate_deletes: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// What the configuration asks the reconciler to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// Reconciliation is off; the reason is shown to the user
    Disabled(String),
    Enabled {
        remote: StoreDescriptor,
        options: ReconcilerOptions,
    },
}

/// Location of the config file when `--config` is not given
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
}

fn default_local_descriptor() -> Result<StoreDescriptor> {
    let dir = dirs::data_dir()
        .ok_or_else(|| Error::Config("could not resolve a data directory".into()))?;
    Ok(StoreDescriptor::Sqlite(dir.join(APP_DIR).join(DEFAULT_DB_FILE)))
}

impl AppConfig {
    /// Load the file at `path` (or the default location) and apply the
    /// process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        let values: HashMap<String, String> = std::env::vars().collect();
        config.apply_overrides(|name| values.get(name).cloned());
        Ok(config)
    }

    /// Parse a config file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file; using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("failed to read {}: {error}", path.display()))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!("failed to parse {}: {error}", path.display()))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!(
                    "failed to create config directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized).map_err(|error| {
            Error::Config(format!("failed to write {}: {error}", path.display()))
        })
    }

    /// Apply `STINT_*` overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(local) = normalize_text_option(lookup(ENV_LOCAL_STORE)) {
            self.storage.local = Some(local);
        }
        if let Some(remote) = normalize_text_option(lookup(ENV_REMOTE_STORE)) {
            self.storage.remote = Some(remote);
        }
        if let Some(enabled) = normalize_text_option(lookup(ENV_SYNC_ENABLED)) {
            self.sync.enabled = parse_flag(&enabled);
        }
        if let Some(interval) = normalize_text_option(lookup(ENV_SYNC_INTERVAL)) {
            self.sync.interval = Some(interval);
        }
    }

    pub fn local_descriptor(&self) -> Result<StoreDescriptor> {
        match &self.storage.local {
            Some(raw) => raw.parse(),
            None => default_local_descriptor(),
        }
    }

    pub fn remote_descriptor(&self) -> Result<Option<StoreDescriptor>> {
        self.storage.remote.as_deref().map(str::parse).transpose()
    }

    /// Interval between scheduled passes.
    ///
    /// An unparsable or zero value falls back to the default with a warning.
    pub fn sync_interval(&self) -> Duration {
        let Some(raw) = self.sync.interval.as_deref() else {
            return DEFAULT_INTERVAL;
        };
        match humantime::parse_duration(raw) {
            Ok(interval) if !interval.is_zero() => interval,
            Ok(_) => {
                tracing::warn!(interval = raw, "Sync interval must be positive; using default");
                DEFAULT_INTERVAL
            }
            Err(error) => {
                tracing::warn!(interval = raw, error = %error, "Invalid sync interval; using default");
                DEFAULT_INTERVAL
            }
        }
    }

    pub fn reconciler_options(&self) -> ReconcilerOptions {
        ReconcilerOptions {
            interval: self.sync_interval(),
            propagate_deletes: self.sync.propagate_deletes,
        }
    }

    pub fn plan(&self) -> Result<ReconcilePlan> {
        if !self.sync.enabled {
            return Ok(ReconcilePlan::Disabled("sync is disabled".into()));
        }
        match self.remote_descriptor()? {
            Some(remote) => Ok(ReconcilePlan::Enabled {
                remote,
                options: self.reconciler_options(),
            }),
            None => Ok(ReconcilePlan::Disabled("no remote store configured".into())),
        }
    }

    /// Like [`AppConfig::plan`], but a disabled plan is an error
    pub fn require_remote(&self) -> Result<(StoreDescriptor, ReconcilerOptions)> {
        match self.plan()? {
            ReconcilePlan::Enabled { remote, options } => Ok((remote, options)),
            ReconcilePlan::Disabled(reason) => Err(Error::ConfigurationMissing(reason)),
        }
    }

    fn normalize(&mut self) {
        self.storage.local = normalize_text_option(self.storage.local.take());
        self.storage.remote = normalize_text_option(self.storage.remote.take());
        self.sync.interval = normalize_text_option(self.sync.interval.take());
    }
}
