//! Master Catalog Module
//!
//! Append-only log of workspace lifecycle events. Replaying it yields the
//! set of live workspaces without scanning the filesystem, and it survives
//! interrupted deletes/moves because nothing is ever rewritten in place.
//!
//! ## Responsibilities
//! - Append one framed entry per workspace insert/delete
//! - CRC32 checksums for corruption detection
//! - Sequence numbers for ordering
//! - Crash recovery (torn tail truncation) on open
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Entry 1                                      │
//! │ ┌──────────┬─────────┬─────────┬───────────┐ │
//! │ │ Seq (8)  │ CRC (4) │ Len (4) │ bincode   │ │
//! │ └──────────┴─────────┴─────────┴───────────┘ │
//! ├──────────────────────────────────────────────┤
//! │ Entry 2 ...                                  │
//! └──────────────────────────────────────────────┘
//! ```

mod entry;
mod reader;
mod recovery;
mod writer;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::CatalogSyncStrategy;
use crate::error::{Result, TileError};

pub use entry::{CatalogEntry, CatalogOp, HEADER_SIZE};
pub use reader::{CatalogReader, Frame};
pub use recovery::{CatalogRecovery, RecoveryResult};
pub use writer::CatalogWriter;

/// The master catalog
///
/// ## Concurrency
/// The writer sits behind a mutex and is never handed out, so two
/// `record()` calls can not interleave their frames.
pub struct MasterCatalog {
    path: PathBuf,
    writer: Mutex<CatalogWriter>,
}

impl MasterCatalog {
    /// File name of the catalog inside the home directory
    pub const FILENAME: &'static str = "master_catalog";

    /// Create a new, empty catalog
    ///
    /// Fails if a catalog already exists at `path`.
    pub fn create(path: &Path, sync_strategy: CatalogSyncStrategy) -> Result<Self> {
        if path.exists() {
            return Err(TileError::AlreadyExists(format!(
                "Master catalog {} already exists",
                path.display()
            )));
        }

        let writer = CatalogWriter::open(path, 0, sync_strategy)?;
        tracing::info!("Created master catalog at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
        })
    }

    /// Open an existing catalog, recovering it first
    pub fn open(path: &Path, sync_strategy: CatalogSyncStrategy) -> Result<Self> {
        let (_, recovery) = CatalogRecovery::recover(path)?;

        if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
            tracing::info!(
                "Master catalog recovery: {} entries recovered, {} corrupted, last_sequence={}",
                recovery.entries_recovered,
                recovery.entries_corrupted,
                recovery.last_sequence
            );
        }

        let writer = CatalogWriter::open(path, recovery.last_sequence, sync_strategy)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
        })
    }

    /// Open the catalog if it exists, otherwise create it
    pub fn open_or_create(path: &Path, sync_strategy: CatalogSyncStrategy) -> Result<Self> {
        if path.exists() {
            Self::open(path, sync_strategy)
        } else {
            Self::create(path, sync_strategy)
        }
    }

    /// Append one event, returning its sequence number
    pub fn record(&self, workspace: &Path, op: CatalogOp) -> Result<u64> {
        let mut writer = self.writer.lock();
        let sequence = writer.append(workspace.to_path_buf(), op)?;
        tracing::debug!(sequence, ?op, "Catalog record {}", workspace.display());
        Ok(sequence)
    }

    /// Live workspaces, in order of their latest insert
    pub fn replay(&self) -> Result<Vec<PathBuf>> {
        // Hold the writer so no frame is half-appended while we read.
        let _writer = self.writer.lock();
        let entries = CatalogReader::open(&self.path)?.entries()?;
        Ok(replay_entries(&entries))
    }

    /// Force any unsynced records to disk
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().sync()
    }

    /// Path of the catalog file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fold a log left to right into the live set
///
/// The last operation on a path decides whether it is live. Live paths are
/// ordered by the sequence of the insert that made them live.
pub fn replay_entries(entries: &[CatalogEntry]) -> Vec<PathBuf> {
    let mut live: HashMap<&Path, u64> = HashMap::new();

    let mut ordered: Vec<&CatalogEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.sequence);

    for entry in ordered {
        match entry.op {
            CatalogOp::Insert => {
                live.insert(entry.path.as_path(), entry.sequence);
            }
            CatalogOp::Delete => {
                live.remove(entry.path.as_path());
            }
        }
    }

    let mut live: Vec<(&Path, u64)> = live.into_iter().collect();
    live.sort_by_key(|(_, sequence)| *sequence);
    live.into_iter().map(|(path, _)| path.to_path_buf()).collect()
}
