//! Catalog Recovery
//!
//! Rebuilds the catalog's state after a crash: validates every frame and
//! cuts off an interrupted append at the tail.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;

use super::reader::{CatalogReader, Frame};
use super::CatalogEntry;

/// Handles master catalog recovery
pub struct CatalogRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of complete frames skipped for CRC/payload mismatch
    pub entries_corrupted: u64,

    /// Highest valid sequence number (0 for an empty catalog)
    pub last_sequence: u64,

    /// Whether a torn tail was found (and cut off, when recovering)
    pub was_truncated: bool,
}

impl CatalogRecovery {
    /// Recover entries from a catalog file
    ///
    /// This will:
    /// 1. Read all valid entries in append order
    /// 2. Skip complete frames that fail their CRC
    /// 3. Truncate a partially written frame at the end
    pub fn recover(path: &Path) -> Result<(Vec<CatalogEntry>, RecoveryResult)> {
        let (entries, result, torn_at) = Self::scan(path)?;

        if let Some(offset) = torn_at {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(offset)?;
            file.sync_all()?;
            tracing::warn!(
                "Truncated torn master catalog tail at offset {} in {}",
                offset,
                path.display()
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a catalog file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<CatalogEntry>, RecoveryResult, Option<u64>)> {
        let mut reader = CatalogReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();
        let mut torn_at = None;

        while let Some(frame) = reader.next_frame()? {
            match frame {
                Frame::Valid(entry) => {
                    result.entries_recovered += 1;
                    result.last_sequence = result.last_sequence.max(entry.sequence);
                    entries.push(entry);
                }
                Frame::Corrupted { offset, sequence } => {
                    tracing::warn!(offset, sequence, "Skipping corrupted master catalog entry");
                    result.entries_corrupted += 1;
                }
                Frame::Torn { offset } => {
                    result.was_truncated = true;
                    torn_at = Some(offset);
                }
            }
        }

        Ok((entries, result, torn_at))
    }
}
