//! Catalog Writer
//!
//! Handles appending entries to the master catalog file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::CatalogSyncStrategy;
use crate::error::Result;

use super::{CatalogEntry, CatalogOp};

/// Appends framed entries to the catalog file
pub struct CatalogWriter {
    file: File,
    /// Sequence number the next entry will receive
    next_sequence: u64,
    sync_strategy: CatalogSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
}

impl CatalogWriter {
    /// Open a catalog file for appending
    ///
    /// `last_sequence` is the highest sequence already in the file, as
    /// reported by recovery.
    pub fn open(
        path: &Path,
        last_sequence: u64,
        sync_strategy: CatalogSyncStrategy,
    ) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            file,
            next_sequence: last_sequence + 1,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append one entry, returning its sequence number
    ///
    /// The whole frame goes out in a single write; a crash mid-write leaves
    /// a torn tail that recovery removes.
    pub fn append(&mut self, path: PathBuf, op: CatalogOp) -> Result<u64> {
        let sequence = self.next_sequence;
        let entry = CatalogEntry::new(sequence, path, op);
        let frame = entry.serialize()?;

        self.file.write_all(&frame)?;
        self.next_sequence += 1;
        self.unsynced += 1;

        let should_sync = match self.sync_strategy {
            CatalogSyncStrategy::EveryWrite => true,
            CatalogSyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if should_sync {
            self.sync()?;
        }

        Ok(sequence)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the sequence number the next entry will receive
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }
}
