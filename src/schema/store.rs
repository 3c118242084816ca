//! Schema persistence
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬───────────────────┐
//! │Magic (4) │ CRC (4)  │ Len (4)  │ bincode(Schema)   │
//! └──────────┴──────────┴──────────┴───────────────────┘
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{Result, TileError};

use super::Schema;

/// Name of the schema file inside an array/metadata directory
pub const SCHEMA_FILE: &str = "__schema.tsm";

const MAGIC: &[u8; 4] = b"TSSC";
const HEADER_SIZE: usize = 12;

/// Write `schema` as the authoritative descriptor of the object at `dir`
pub fn persist(dir: &Path, schema: &Schema) -> Result<()> {
    let payload = bincode::serialize(schema)?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&payload);

    let mut file = File::create(dir.join(SCHEMA_FILE))?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Read back the schema persisted at `dir`
pub fn load(dir: &Path) -> Result<Schema> {
    let path = dir.join(SCHEMA_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TileError::NotFound(format!(
                "No schema found at {}",
                dir.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC {
        return Err(TileError::schema(format!(
            "{} is not a schema file",
            path.display()
        )));
    }

    let crc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let payload = &bytes[HEADER_SIZE..];

    if payload.len() != len || crc32fast::hash(payload) != crc {
        return Err(TileError::schema(format!(
            "schema file {} is corrupted",
            path.display()
        )));
    }

    bincode::deserialize(payload)
        .map_err(|e| TileError::schema(format!("cannot decode {}: {}", path.display(), e)))
}
