//! Catalog Entry definitions
//!
//! Defines the structure and framing of individual master catalog records.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TileError};

/// Frame header size: Sequence (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single encoded entry, guards against garbage lengths
pub(crate) const MAX_ENTRY_SIZE: u32 = 64 * 1024;

/// A single record in the master catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Sequence number - strictly increasing, starts at 1
    pub sequence: u64,

    /// Absolute workspace path the event applies to
    pub path: PathBuf,

    /// The lifecycle event
    pub op: CatalogOp,

    /// Timestamp (unix millis) when the entry was created
    pub timestamp: u64,
}

/// Lifecycle events tracked by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogOp {
    Insert,
    Delete,
}

impl CatalogEntry {
    /// Create an entry stamped with the current time
    pub fn new(sequence: u64, path: impl Into<PathBuf>, op: CatalogOp) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            sequence,
            path: path.into(),
            op,
            timestamp,
        }
    }

    /// Encode into a complete frame: `[sequence][crc][len][payload]`
    ///
    /// The frame is built in memory so the writer can emit it with a single
    /// write call.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        if payload.len() > MAX_ENTRY_SIZE as usize {
            return Err(TileError::invalid(format!(
                "Catalog entry for {} exceeds {} bytes",
                self.path.display(),
                MAX_ENTRY_SIZE
            )));
        }

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.sequence.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a payload whose CRC has already been checked
    pub fn deserialize(payload: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(payload)?)
    }
}

/// Parsed frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub sequence: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    pub(crate) fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut sequence = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        sequence.copy_from_slice(&bytes[0..8]);
        crc.copy_from_slice(&bytes[8..12]);
        len.copy_from_slice(&bytes[12..16]);

        Self {
            sequence: u64::from_le_bytes(sequence),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len),
        }
    }
}
