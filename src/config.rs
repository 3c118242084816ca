//! Configuration for TileStore
//!
//! Centralized configuration with sensible defaults. Resolved once when a
//! [`StorageManager`](crate::StorageManager) is opened and never mutated after.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TileError};

/// Main configuration for a TileStore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Home directory. Holds the master catalog and anchors relative paths.
    /// Internal structure:
    ///   {home_dir}/
    ///     └── master_catalog    (append-only workspace log)
    pub home_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Catalog Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the master catalog
    pub catalog_sync_strategy: CatalogSyncStrategy,

    // -------------------------------------------------------------------------
    // Fragment Configuration
    // -------------------------------------------------------------------------
    /// fsync fragment files before publishing them
    pub fragment_sync: bool,
}

/// Master catalog sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSyncStrategy {
    /// fsync after every record (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home_dir: PathBuf::from("./tilestore_home"),
            catalog_sync_strategy: CatalogSyncStrategy::EveryWrite,
            fragment_sync: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse a configuration file
    ///
    /// Each line holds `<parameter> <value>`, separated by whitespace. The
    /// value of `home_dir` is the rest of the line.
    /// Blank lines and lines starting with `#` are skipped. Parameters not
    /// listed in the file keep their default values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut config = Config::default();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (param, rest) = match line.split_once(char::is_whitespace) {
                Some((param, rest)) => (param, rest.trim()),
                None => (line, ""),
            };
            let values: Vec<&str> = rest.split_whitespace().collect();

            match param {
                "home_dir" => {
                    // The whole remainder, so paths may contain spaces.
                    if rest.is_empty() {
                        return Err(missing_value(line_no, param));
                    }
                    config.home_dir = PathBuf::from(rest);
                }
                "catalog_sync" => {
                    config.catalog_sync_strategy = match values.as_slice() {
                        ["every_write"] => CatalogSyncStrategy::EveryWrite,
                        ["every_n", count] => CatalogSyncStrategy::EveryNEntries {
                            count: count.parse().map_err(|_| {
                                bad_value(line_no, param, count)
                            })?,
                        },
                        _ => return Err(bad_value(line_no, param, &values.join(" "))),
                    };
                }
                "fragment_sync" => {
                    let value = values.first().ok_or_else(|| missing_value(line_no, param))?;
                    config.fragment_sync =
                        value.parse().map_err(|_| bad_value(line_no, param, value))?;
                }
                other => {
                    tracing::warn!(parameter = other, line = line_no + 1, "Ignoring unknown config parameter");
                }
            }
        }

        Ok(config)
    }

    /// Load configuration from an optional file, falling back to defaults
    ///
    /// Never fails: a missing or malformed file is logged and replaced by
    /// [`Config::default`].
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Config::default();
        };

        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "Failed to load config from {}: {}; using defaults",
                    path.display(),
                    e
                );
                Config::default()
            }
        }
    }
}

fn missing_value(line_no: usize, param: &str) -> TileError {
    TileError::invalid(format!(
        "Config line {}: parameter '{}' has no value",
        line_no + 1,
        param
    ))
}

fn bad_value(line_no: usize, param: &str, value: &str) -> TileError {
    TileError::invalid(format!(
        "Config line {}: invalid value '{}' for parameter '{}'",
        line_no + 1,
        value,
        param
    ))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the home directory
    pub fn home_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.home_dir = path.into();
        self
    }

    /// Set the catalog sync strategy
    pub fn catalog_sync_strategy(mut self, strategy: CatalogSyncStrategy) -> Self {
        self.config.catalog_sync_strategy = strategy;
        self
    }

    /// Enable or disable fsync of fragment files
    pub fn fragment_sync(mut self, enabled: bool) -> Self {
        self.config.fragment_sync = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
