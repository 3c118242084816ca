//! Fragment Reader
//!
//! Loads a fragment file and verifies it before handing out cells.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{Result, TileError};

use super::iterator::FragmentIterator;
use super::{FOOTER_SIZE, HEADER_SIZE, KEY_BYTES, KEY_COORDS, MAGIC, VERSION};

/// Reader for fragment files
pub struct FragmentReader {
    path: PathBuf,
    /// Data block only (header and footer stripped)
    data: Bytes,
    key_kind: u8,
    cell_count: u64,
}

impl FragmentReader {
    /// Open a fragment for reading
    ///
    /// The whole file is read and its data CRC verified.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = Bytes::from(fs::read(path)?);

        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(path, "file is shorter than header and footer"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(corrupt(
                path,
                &format!("invalid magic: expected TSFG, got {:?}", &bytes[0..4]),
            ));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(corrupt(path, &format!("unsupported version {}", version)));
        }

        let key_kind = bytes[6];
        if key_kind != KEY_COORDS && key_kind != KEY_BYTES {
            return Err(corrupt(path, &format!("unknown key kind {}", key_kind)));
        }

        let mut count = [0u8; 8];
        count.copy_from_slice(&bytes[7..15]);
        let cell_count = u64::from_le_bytes(count);

        let footer = &bytes[bytes.len() - FOOTER_SIZE..];
        let mut stored_len = [0u8; 8];
        stored_len.copy_from_slice(&footer[0..8]);
        let stored_len = u64::from_le_bytes(stored_len);
        let data_crc = u32::from_le_bytes([footer[8], footer[9], footer[10], footer[11]]);

        // Compared in u64 so a damaged length can not overflow.
        let data_len = bytes.len() - HEADER_SIZE - FOOTER_SIZE;
        if stored_len != data_len as u64 {
            return Err(corrupt(path, "data length does not match file size"));
        }

        let data = bytes.slice(HEADER_SIZE..HEADER_SIZE + data_len);
        if crc32fast::hash(&data) != data_crc {
            return Err(corrupt(path, "data CRC mismatch"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            data,
            key_kind,
            cell_count,
        })
    }

    /// Get the number of cells
    pub fn cell_count(&self) -> u64 {
        self.cell_count
    }

    /// Iterate over all cells in stored order
    pub fn iter(&self) -> FragmentIterator {
        FragmentIterator::new(self.path.clone(), self.data.clone(), self.key_kind)
    }
}

pub(super) fn corrupt(path: &Path, reason: &str) -> TileError {
    TileError::Corruption(format!("fragment {}: {}", path.display(), reason))
}
