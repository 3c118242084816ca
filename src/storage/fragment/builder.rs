//! Fragment Builder
//!
//! Writes sorted cells to a new fragment file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, TileError};
use crate::session::{Cell, CellKey};

use super::{HEADER_SIZE, KEY_BYTES, KEY_COORDS, MAGIC, VERSION};

/// Builder for creating a fragment from cells in native order
pub struct FragmentBuilder {
    /// Output file path
    path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Key kind, fixed by the first cell
    key_kind: Option<u8>,
    /// Number of cells written
    cell_count: u64,
    /// Bytes written to the data block
    data_len: u64,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
}

impl FragmentBuilder {
    /// Create a new fragment builder
    ///
    /// Writes a placeholder header immediately; call `add()` in native
    /// order, then `finish()` to write the footer.
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(&[0u8; HEADER_SIZE])?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            key_kind: None,
            cell_count: 0,
            data_len: 0,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append one cell
    pub fn add(&mut self, cell: &Cell) -> Result<()> {
        let (kind, key) = match &cell.key {
            CellKey::Coords(coords) => (
                KEY_COORDS,
                coords.iter().flat_map(|c| c.to_le_bytes()).collect::<Vec<u8>>(),
            ),
            CellKey::Key(key) => (KEY_BYTES, key.clone()),
        };

        match self.key_kind {
            None => self.key_kind = Some(kind),
            Some(existing) if existing != kind => {
                return Err(TileError::invalid(
                    "A fragment cannot mix coordinate and key addressed cells",
                ));
            }
            Some(_) => {}
        }

        self.write_chunk(&(key.len() as u32).to_le_bytes())?;
        self.write_chunk(&key)?;
        self.write_chunk(&(cell.values.len() as u32).to_le_bytes())?;
        for value in &cell.values {
            self.write_chunk(&(value.len() as u32).to_le_bytes())?;
            self.write_chunk(value)?;
        }

        self.cell_count += 1;
        Ok(())
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.data_hasher.update(bytes);
        self.data_len += bytes.len() as u64;
        Ok(())
    }

    /// Finish building: write footer and header, optionally fsync
    pub fn finish(mut self, id: u64, sync: bool) -> Result<super::Fragment> {
        let data_crc = self.data_hasher.finalize();

        self.writer.write_all(&self.data_len.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self.writer.into_inner().map_err(|e| {
            TileError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to flush fragment: {}", e),
            ))
        })?;

        file.seek(SeekFrom::Start(0))?;
        file.write_all(MAGIC)?;
        file.write_all(&VERSION.to_le_bytes())?;
        file.write_all(&[self.key_kind.unwrap_or(KEY_COORDS)])?;
        file.write_all(&self.cell_count.to_le_bytes())?;

        if sync {
            file.sync_all()?;
        }

        let file_size = file.metadata()?.len();

        Ok(super::Fragment {
            path: self.path,
            id,
            cell_count: self.cell_count,
            file_size,
        })
    }
}
