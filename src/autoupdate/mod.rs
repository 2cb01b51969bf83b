// src/autoupdate/mod.rs

//! Auto-update configuration, persisted per user
//!
//! The configuration lives in a single JSON file under the config directory
//! and is re-read on every scheduler tick, so changes made by one-shot CLI
//! invocations are picked up by a running service without a restart.

pub mod scheduler;

pub use scheduler::{CheckReport, Scheduler, UpdateOutcome};

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

/// Default interval between update checks
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Smallest accepted check interval
pub const MIN_INTERVAL: Duration = Duration::from_secs(3600);

/// Current schema version of the persisted file
const CONFIG_VERSION: u32 = 1;

/// The persisted auto-update configuration and statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoUpdateConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    pub enabled: bool,
    /// Seconds between checks
    pub interval_secs: u64,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checked_count: u64,
    #[serde(default)]
    pub updated_count: u64,
    /// Only report updates, never install them
    #[serde(default)]
    pub notify_only: bool,
    #[serde(default)]
    pub include_prerelease: bool,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for AutoUpdateConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            enabled: false,
            interval_secs: DEFAULT_INTERVAL.as_secs(),
            last_check: None,
            last_update: None,
            checked_count: 0,
            updated_count: 0,
            notify_only: false,
            include_prerelease: false,
        }
    }
}

impl AutoUpdateConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Handle on the persisted configuration file
pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<AutoUpdateConfig>,
}

impl ConfigStore {
    /// Open the store at `path`, loading the existing file when present
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self {
            path: path.into(),
            config: RwLock::new(AutoUpdateConfig::default()),
        };
        let _ = store.reload();
        store
    }

    /// Re-read the file from disk; a missing file keeps the defaults
    pub fn reload(&self) -> Result<()> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let parsed: AutoUpdateConfig = serde_json::from_slice(&data)?;
        if let Ok(mut config) = self.config.write() {
            *config = parsed;
        }
        Ok(())
    }

    fn save(&self, config: &AutoUpdateConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(config)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    /// A copy of the current configuration
    pub fn get(&self) -> AutoUpdateConfig {
        self.config
            .read()
            .map(|config| config.clone())
            .unwrap_or_default()
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.mutate(|config| {
            config.enabled = enabled;
            Ok(())
        })
    }

    /// Set the check interval; rejects anything under one hour
    pub fn set_interval(&self, interval: Duration) -> Result<()> {
        if interval < MIN_INTERVAL {
            return Err(Error::Config(
                "auto-update interval must be at least 1 hour".to_string(),
            ));
        }
        self.mutate(|config| {
            config.interval_secs = interval.as_secs();
            Ok(())
        })
    }

    pub fn set_notify_only(&self, notify_only: bool) -> Result<()> {
        self.mutate(|config| {
            config.notify_only = notify_only;
            Ok(())
        })
    }

    pub fn set_include_prerelease(&self, include: bool) -> Result<()> {
        self.mutate(|config| {
            config.include_prerelease = include;
            Ok(())
        })
    }

    /// Record a completed check cycle and its applied-update count
    pub fn record_check(&self, updated_count: u64) -> Result<()> {
        self.mutate(|config| {
            config.last_check = Some(Utc::now());
            config.checked_count += 1;
            if updated_count > 0 {
                config.last_update = Some(Utc::now());
                config.updated_count += updated_count;
            }
            Ok(())
        })
    }

    /// Whether a sweep is due: enabled, and either never checked or the
    /// interval has elapsed since the last check.
    pub fn should_check(&self) -> bool {
        let config = self.get();
        if !config.enabled {
            return false;
        }
        match config.last_check {
            None => true,
            Some(last) => {
                let elapsed = Utc::now().signed_duration_since(last);
                elapsed.to_std().map(|e| e >= config.interval()).unwrap_or(false)
            }
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut AutoUpdateConfig) -> Result<()>) -> Result<()> {
        let mut config = self
            .config
            .write()
            .map_err(|_| Error::Internal("auto-update config lock poisoned".to_string()))?;
        f(&mut config)?;
        self.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("config/autoupdate.json"));
        (dir, store)
    }

    #[test]
    fn test_defaults() {
        let (_dir, store) = temp_store();
        let config = store.get();
        assert!(!config.enabled);
        assert_eq!(config.interval(), DEFAULT_INTERVAL);
        assert!(config.last_check.is_none());
        assert!(!store.should_check());
    }

    #[test]
    fn test_enable_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoupdate.json");

        let store = ConfigStore::open(&path);
        store.set_enabled(true).unwrap();
        store.set_notify_only(true).unwrap();

        let reopened = ConfigStore::open(&path);
        let config = reopened.get();
        assert!(config.enabled);
        assert!(config.notify_only);
        assert_eq!(config.version, 1);
    }

    #[test]
    fn test_interval_minimum() {
        let (_dir, store) = temp_store();
        assert!(store.set_interval(Duration::from_secs(60)).is_err());
        store.set_interval(Duration::from_secs(3600)).unwrap();
        assert_eq!(store.get().interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_should_check_semantics() {
        let (_dir, store) = temp_store();

        // Disabled never checks.
        assert!(!store.should_check());

        // Enabled with no prior check is immediately due.
        store.set_enabled(true).unwrap();
        assert!(store.should_check());

        // A fresh check within the interval is not due again.
        store.record_check(0).unwrap();
        assert!(!store.should_check());
    }

    #[test]
    fn test_record_check_counters() {
        let (_dir, store) = temp_store();
        store.record_check(0).unwrap();
        let config = store.get();
        assert_eq!(config.checked_count, 1);
        assert_eq!(config.updated_count, 0);
        assert!(config.last_check.is_some());
        assert!(config.last_update.is_none());

        store.record_check(3).unwrap();
        let config = store.get();
        assert_eq!(config.checked_count, 2);
        assert_eq!(config.updated_count, 3);
        assert!(config.last_update.is_some());
    }

    #[test]
    fn test_external_edit_visible_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoupdate.json");

        let store = ConfigStore::open(&path);
        store.set_enabled(false).unwrap();

        // Another process flips the flag on disk.
        let other = ConfigStore::open(&path);
        other.set_enabled(true).unwrap();

        assert!(!store.get().enabled);
        store.reload().unwrap();
        assert!(store.get().enabled);
    }
}
