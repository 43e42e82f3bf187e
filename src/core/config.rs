//! Configuration management for Magic Eye.
//!
//! The configuration is a plain value: it is built once (from defaults, a
//! JSON file, or CLI overrides) and handed to the watcher and sniffer at
//! construction time.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settle delay applied to modify events, in milliseconds.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;

/// Default number of leading bytes captured as the magic-byte sample.
pub const DEFAULT_SAMPLE_SIZE: usize = 16;

/// Largest accepted magic-byte sample.
pub const MAX_SAMPLE_SIZE: usize = 4096;

/// Largest accepted settle delay, in milliseconds.
pub const MAX_SETTLE_DELAY_MS: u64 = 60_000;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder watching settings
    pub watch: WatchConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load configuration from default location, or create default if not exists.
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(&Self::default_config_path())
    }

    /// Load configuration from `path`, falling back to defaults.
    ///
    /// Defaults are written only when no file exists; a file that fails to
    /// load is left untouched.
    pub fn load_or_default_from(path: &Path) -> Self {
        if path.exists() {
            return match Self::load(path).and_then(|c| c.validate().map(|_| c)) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Failed to load config, using defaults: {}", e);
                    Self::default()
                }
            };
        }

        let config = Self::default();
        if let Err(e) = config.save(path) {
            log::warn!("Failed to save default config: {}", e);
        }
        config
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        Self::data_dir().join("config.json")
    }

    /// Get the application data directory.
    pub fn data_dir() -> PathBuf {
        #[cfg(windows)]
        {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData"))
                .join("MagicEye")
        }

        #[cfg(not(windows))]
        {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("magic-eye")
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        self.watch.validate()
    }
}

/// Folder watching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Folders to watch, in order
    pub folders: Vec<PathBuf>,
    /// Filename suffixes dropped before analysis
    pub ignore_extensions: Vec<String>,
    /// Wait applied to modify events before analysis (ms)
    pub settle_delay_ms: u64,
    /// Number of leading bytes kept as the magic-byte sample
    pub sample_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            folders: default_folders(),
            ignore_extensions: vec![
                ".tmp".to_string(),
                ".temp".to_string(),
                ".part".to_string(),
                ".crdownload".to_string(),
            ],
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl WatchConfig {
    /// Replace the folder list.
    pub fn with_folders<I, P>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.folders = folders.into_iter().map(Into::into).collect();
        self
    }

    /// Set the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the magic-byte sample size.
    pub fn with_sample_size(mut self, size: usize) -> Self {
        self.sample_size = size;
        self
    }

    /// Settle delay as a `Duration`.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Validate the watch settings.
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 || self.sample_size > MAX_SAMPLE_SIZE {
            return Err(Error::ConfigInvalid {
                field: "watch.sample_size".to_string(),
                message: format!("Must be between 1 and {}", MAX_SAMPLE_SIZE),
            });
        }

        if self.settle_delay_ms > MAX_SETTLE_DELAY_MS {
            return Err(Error::ConfigInvalid {
                field: "watch.settle_delay_ms".to_string(),
                message: format!("Must not exceed {}", MAX_SETTLE_DELAY_MS),
            });
        }

        if self.ignore_extensions.iter().any(|e| e.trim().is_empty()) {
            return Err(Error::ConfigInvalid {
                field: "watch.ignore_extensions".to_string(),
                message: "Entries must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Include module paths in log lines
    pub module_path: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            module_path: false,
        }
    }
}

/// The user's Downloads and Desktop folders, where resolvable.
fn default_folders() -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let downloads = dirs::download_dir().or_else(|| home.as_ref().map(|h| h.join("Downloads")));
    let desktop = dirs::desktop_dir().or_else(|| home.as_ref().map(|h| h.join("Desktop")));
    downloads.into_iter().chain(desktop).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.watch.settle_delay(), Duration::from_secs(1));
        assert_eq!(config.watch.sample_size, 16);
        assert!(config
            .watch
            .ignore_extensions
            .contains(&".crdownload".to_string()));
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.watch = config
            .watch
            .with_folders(["/srv/incoming"])
            .with_settle_delay(Duration::from_millis(250));
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.watch.folders, vec![PathBuf::from("/srv/incoming")]);
        assert_eq!(loaded.watch.settle_delay_ms, 250);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"watch": {"settle_delay_ms": 500}}"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.watch.settle_delay_ms, 500);
        assert_eq!(loaded.watch.sample_size, DEFAULT_SAMPLE_SIZE);
        assert_eq!(loaded.logging.log_level, "info");
    }

    #[test]
    fn test_broken_config_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let hand_written = r#"{"watch": {"settle_delay_ms": "soon"}}"#;
        std::fs::write(&path, hand_written).unwrap();

        let config = Config::load_or_default_from(&path);
        assert_eq!(config.watch.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), hand_written);
    }

    #[test]
    fn test_missing_config_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("magic-eye").join("config.json");

        let config = Config::load_or_default_from(&path);
        assert!(path.exists());
        assert_eq!(Config::load(&path).unwrap().watch.sample_size, config.watch.sample_size);
    }

    #[test]
    fn test_load_garbage_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::ConfigLoad(_))));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = Config::default();
        config.watch.sample_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.watch.settle_delay_ms = MAX_SETTLE_DELAY_MS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.watch.ignore_extensions.push("  ".to_string());
        assert!(config.validate().is_err());
    }
}
