//! Storage Manager
//!
//! The component every caller talks to. It coordinates the classifier, the
//! master catalog, schema persistence and the session registry.
//!
//! ## Responsibilities
//! - Resolve caller paths against the home directory
//! - Object lifecycle: create / clear / delete / move / ls
//! - Brokering sessions on arrays and metadata
//!
//! ## Concurrency Model
//!
//! - The manager spawns no threads; every call is synchronous.
//! - Lifecycle calls on disjoint paths need no coordination.
//! - `SessionRegistry` enforces one writer per object. Clear, delete and
//!   move hold their subtrees in the registry while they run, so they fail
//!   with `Busy` under an open session and sessions can not open under them.
//! - `MasterCatalog` serializes its own appends.

mod access;
mod lifecycle;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::MasterCatalog;
use crate::config::Config;
use crate::error::{Result, TileError};
use crate::hierarchy::{self, Classification, ObjectKind};
use crate::session::SessionRegistry;

/// The storage manager
pub struct StorageManager {
    /// Manager configuration, fixed at init
    config: Config,

    /// Canonical home directory
    home_dir: PathBuf,

    /// Workspace insert/delete log
    catalog: MasterCatalog,

    /// Open sessions by object path
    sessions: Arc<SessionRegistry>,
}

impl StorageManager {
    /// Initialize a manager with the given config
    ///
    /// On startup:
    /// 1. Create the home directory if it doesn't exist
    /// 2. Open the master catalog (recovering it) or create an empty one
    pub fn init(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.home_dir)?;
        let home_dir = fs::canonicalize(&config.home_dir)?;

        let catalog_path = home_dir.join(MasterCatalog::FILENAME);
        let catalog = MasterCatalog::open_or_create(&catalog_path, config.catalog_sync_strategy)?;

        tracing::info!("Storage manager ready at {}", home_dir.display());

        Ok(Self {
            config,
            home_dir,
            catalog,
            sessions: SessionRegistry::new(),
        })
    }

    /// Initialize with a home directory (convenience method)
    ///
    /// Uses default config with the given home directory
    pub fn init_path(path: &Path) -> Result<Self> {
        let config = Config::builder().home_dir(path).build();
        Self::init(config)
    }

    /// Resolve a caller path to the absolute path it names
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        hierarchy::resolve(&self.home_dir, path)
    }

    /// Classify the object at `path`
    pub fn classify(&self, path: &str) -> Result<Classification> {
        Ok(hierarchy::classify(&self.resolve(path)?))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the canonical home directory
    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// Get the master catalog
    pub fn catalog(&self) -> &MasterCatalog {
        &self.catalog
    }

    /// Number of open sessions on exactly `path`
    pub fn open_sessions(&self, path: &str) -> Result<usize> {
        Ok(self.sessions.open_sessions(&self.resolve(path)?))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Resolve and require an existing hierarchy object
    fn existing(&self, path: &str) -> Result<(PathBuf, ObjectKind)> {
        let dir = self.resolve(path)?;
        match hierarchy::classify(&dir) {
            Classification::Object(kind) => Ok((dir, kind)),
            Classification::NotFound => Err(invalid_path(&dir)),
        }
    }
}

fn invalid_path(dir: &Path) -> TileError {
    TileError::NotFound(format!(
        "Invalid path {}: no workspace, group, array or metadata object found",
        dir.display()
    ))
}
