//! Fragment Iterator
//!
//! Sequential iteration over the cells of a loaded fragment.

use std::path::PathBuf;

use bytes::{Buf, Bytes};

use crate::error::Result;
use crate::session::{codec::coords_from_bytes, Cell, CellKey};

use super::reader::corrupt;
use super::KEY_COORDS;

/// Iterator over fragment cells in stored (native) order
pub struct FragmentIterator {
    path: PathBuf,
    /// Remaining data block
    data: Bytes,
    key_kind: u8,
    /// Set after an error so iteration stops
    failed: bool,
}

impl FragmentIterator {
    pub(super) fn new(path: PathBuf, data: Bytes, key_kind: u8) -> Self {
        Self {
            path,
            data,
            key_kind,
            failed: false,
        }
    }

    fn take_prefixed(&mut self) -> Result<Bytes> {
        if self.data.remaining() < 4 {
            return Err(corrupt(&self.path, "truncated length prefix"));
        }
        let len = self.data.get_u32_le() as usize;
        if self.data.remaining() < len {
            return Err(corrupt(&self.path, "value runs past the data block"));
        }
        Ok(self.data.split_to(len))
    }

    fn read_cell(&mut self) -> Result<Cell> {
        let raw_key = self.take_prefixed()?;
        let key = if self.key_kind == KEY_COORDS {
            CellKey::Coords(coords_from_bytes(&raw_key))
        } else {
            CellKey::Key(raw_key.to_vec())
        };

        if self.data.remaining() < 4 {
            return Err(corrupt(&self.path, "truncated value count"));
        }
        let value_count = self.data.get_u32_le() as usize;

        let mut values = Vec::with_capacity(value_count.min(self.data.remaining()));
        for _ in 0..value_count {
            values.push(self.take_prefixed()?);
        }

        Ok(Cell { key, values })
    }
}

impl Iterator for FragmentIterator {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.data.has_remaining() {
            return None;
        }

        let cell = self.read_cell();
        if cell.is_err() {
            self.failed = true;
        }
        Some(cell)
    }
}
