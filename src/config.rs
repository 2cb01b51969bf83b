// src/config.rs

//! Application directories and runtime configuration
//!
//! All paths are derived once into an [`AppDirs`] value and carried through
//! constructors; nothing in the crate reads directories from global state.
//! `GLIX_DB_PATH` overrides the data directory, otherwise the OS per-user
//! cache root is used.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Application name, used for directory and database naming
pub const APP_NAME: &str = "glix";

/// Default RPC port for the background service
pub const DEFAULT_PORT: u16 = 9742;

/// Default time the on-demand service stays alive after last activity
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Every directory the application touches
#[derive(Debug, Clone)]
pub struct AppDirs {
    /// Root data directory (`$GLIX_DB_PATH` or `<cache-root>/glix`)
    pub data_dir: PathBuf,
    /// Embedded database file (`<data>/glix.db`)
    pub database_path: PathBuf,
    /// Configuration directory (`<data>/config`)
    pub config_dir: PathBuf,
    /// Parent for per-invocation scratch directories (`<data>/cache`)
    pub cache_dir: PathBuf,
    /// Directory installable binaries are placed in (`$GOBIN` or `<gopath>/bin`)
    pub bin_dir: PathBuf,
}

impl AppDirs {
    /// Derive the directory layout from the environment
    pub fn resolve() -> Result<Self> {
        let data_dir = match std::env::var("GLIX_DB_PATH") {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => {
                let cache_root = dirs::cache_dir().ok_or_else(|| {
                    Error::Config("unable to determine the user cache directory".to_string())
                })?;
                cache_root.join(APP_NAME)
            }
        };
        Ok(Self::for_data_dir(data_dir))
    }

    /// Build the layout under an explicit data directory (used by tests)
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            database_path: data_dir.join(format!("{}.db", APP_NAME)),
            config_dir: data_dir.join("config"),
            cache_dir: data_dir.join("cache"),
            bin_dir: user_bin_dir(),
            data_dir,
        }
    }

    /// Create every directory the layout names
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.config_dir, &self.cache_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Allocate a unique scratch directory under the cache root.
    ///
    /// The directory is removed when the returned guard drops, on every exit
    /// path.
    pub fn scratch_dir(&self, prefix: &str) -> Result<TempDir> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.cache_dir)?;
        Ok(dir)
    }

    /// Path of the persisted auto-update configuration
    pub fn autoupdate_config_path(&self) -> PathBuf {
        self.config_dir.join("autoupdate.json")
    }
}

/// The ecosystem-standard user bin directory: `$GOBIN`, else `$GOPATH/bin`,
/// else `<home>/go/bin`.
fn user_bin_dir() -> PathBuf {
    if let Ok(gobin) = std::env::var("GOBIN") {
        if !gobin.is_empty() {
            return PathBuf::from(gobin);
        }
    }
    let gopath = match std::env::var("GOPATH") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join("go"),
    };
    gopath.join("bin")
}

/// Configuration of the background service
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Logical namespace reported in status (defaults to the host name)
    pub namespace: String,
    /// Database file the service owns
    pub database_path: PathBuf,
    /// TCP port to bind (0 picks an ephemeral port)
    pub port: u16,
    /// Bind address
    pub bind_address: String,
    /// Shut down after this much inactivity; `None` disables the idle monitor
    pub idle_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Defaults for the given directory layout
    pub fn new(dirs: &AppDirs) -> Self {
        Self {
            namespace: default_namespace(),
            database_path: dirs.database_path.clone(),
            port: DEFAULT_PORT,
            bind_address: "localhost".to_string(),
            idle_timeout: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// Configuration for locating or spawning the background service
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub address: String,
    pub port: u16,
    /// Idle timeout passed to a spawned service
    pub idle_timeout: Duration,
    /// Overall budget for waiting on a spawned service
    pub start_timeout: Duration,
    /// Number of connection attempts after spawning
    pub connection_retry: u32,
    /// Delay between attempts; also the direct-connect dial timeout
    pub retry_delay: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: DEFAULT_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            start_timeout: Duration::from_secs(30),
            connection_retry: 10,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Default namespace for the service: the host name, or `"default"` when it
/// cannot be determined.
pub fn default_namespace() -> String {
    #[cfg(unix)]
    {
        if let Ok(name) = nix::unistd::gethostname() {
            if let Ok(name) = name.into_string() {
                if !name.is_empty() {
                    return name;
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Ok(name) = std::env::var("COMPUTERNAME") {
            if !name.is_empty() {
                return name;
            }
        }
    }
    "default".to_string()
}

/// Parse a duration string like `30s`, `5m`, `2h`, `1d`, `1w`
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Duration::from_secs(0));
    }

    let (num_str, unit) = s.split_at(s.len() - 1);
    let num: u64 = num_str
        .parse()
        .map_err(|_| Error::Config(format!("invalid duration number: {}", num_str)))?;

    let seconds = match unit {
        "s" => num,
        "m" => num * 60,
        "h" => num * 3600,
        "d" => num * 86400,
        "w" => num * 604800,
        _ => return Err(Error::Config(format!("invalid duration unit: {}", unit))),
    };

    Ok(Duration::from_secs(seconds))
}

/// Render a duration in the largest whole unit `parse_duration` accepts
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs % 604800 == 0 && secs >= 604800 {
        format!("{}w", secs / 604800)
    } else if secs % 86400 == 0 && secs >= 86400 {
        format!("{}d", secs / 86400)
    } else if secs % 3600 == 0 && secs >= 3600 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 && secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_derivation() {
        let dirs = AppDirs::for_data_dir("/tmp/glix-test");
        assert_eq!(dirs.database_path, PathBuf::from("/tmp/glix-test/glix.db"));
        assert_eq!(dirs.config_dir, PathBuf::from("/tmp/glix-test/config"));
        assert_eq!(
            dirs.autoupdate_config_path(),
            PathBuf::from("/tmp/glix-test/config/autoupdate.json")
        );
    }

    #[test]
    fn test_scratch_dir_is_unique_and_cleaned() {
        let root = tempfile::tempdir().unwrap();
        let dirs = AppDirs::for_data_dir(root.path());

        let a = dirs.scratch_dir("install-").unwrap();
        let b = dirs.scratch_dir("install-").unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(&dirs.cache_dir));

        let path = a.path().to_path_buf();
        drop(a);
        assert!(!path.exists());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_duration("1w").unwrap(), Duration::from_secs(604800));
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn test_format_duration_round_trips() {
        for input in ["45s", "5m", "12h", "1d", "2w"] {
            let d = parse_duration(input).unwrap();
            assert_eq!(format_duration(d), input);
        }
    }

    #[test]
    fn test_discovery_defaults() {
        let cfg = DiscoveryConfig::default();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.connection_retry, 10);
        assert_eq!(cfg.retry_delay, Duration::from_millis(500));
    }
}
