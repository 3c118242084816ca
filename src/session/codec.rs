//! Buffer codec
//!
//! Sessions exchange cells with callers through one flat byte buffer per
//! field. Within a buffer, values of consecutive cells are packed back to
//! back:
//!
//! ```text
//! __coords      [i64 LE] x dim_num
//! __key         [len: u32 LE][bytes]
//! Fixed(n)      [n bytes]
//! Var           [len: u32 LE][bytes]
//! ```

use bytes::Bytes;

use crate::error::{Result, TileError};
use crate::schema::{CellSize, Schema};

use super::cell::{Cell, CellKey};

/// Length prefix size for variable-sized values
const LEN_PREFIX: usize = 4;

/// One buffer slot of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Coordinates (arrays) or key (metadata)
    Key,
    /// Attribute by schema index
    Attribute(usize),
}

impl Field {
    /// Field name as a caller would select it
    pub fn name(self, schema: &Schema) -> &str {
        match self {
            Field::Key => schema.key_field(),
            Field::Attribute(idx) => &schema.attributes[idx].name,
        }
    }
}

/// Bytes `cell` occupies in the buffer of `field`
pub(crate) fn encoded_len(schema: &Schema, field: Field, cell: &Cell) -> usize {
    match field {
        Field::Key => match &cell.key {
            CellKey::Coords(coords) => coords.len() * 8,
            CellKey::Key(key) => LEN_PREFIX + key.len(),
        },
        Field::Attribute(idx) => {
            let value = &cell.values[idx];
            match schema.attributes[idx].cell_size {
                CellSize::Fixed(_) => value.len(),
                CellSize::Var => LEN_PREFIX + value.len(),
            }
        }
    }
}

/// Write `cell`'s value for `field` at the start of `out`
///
/// `out` must hold at least [`encoded_len`] bytes. Returns bytes written.
pub(crate) fn encode_into(schema: &Schema, field: Field, cell: &Cell, out: &mut [u8]) -> usize {
    match field {
        Field::Key => match &cell.key {
            CellKey::Coords(coords) => {
                for (chunk, c) in out.chunks_exact_mut(8).zip(coords) {
                    chunk.copy_from_slice(&c.to_le_bytes());
                }
                coords.len() * 8
            }
            CellKey::Key(key) => write_prefixed(out, key),
        },
        Field::Attribute(idx) => {
            let value = &cell.values[idx];
            match schema.attributes[idx].cell_size {
                CellSize::Fixed(_) => {
                    out[..value.len()].copy_from_slice(value);
                    value.len()
                }
                CellSize::Var => write_prefixed(out, value),
            }
        }
    }
}

fn write_prefixed(out: &mut [u8], value: &[u8]) -> usize {
    out[..LEN_PREFIX].copy_from_slice(&(value.len() as u32).to_le_bytes());
    out[LEN_PREFIX..LEN_PREFIX + value.len()].copy_from_slice(value);
    LEN_PREFIX + value.len()
}

/// Split a filled buffer into per-cell raw values
///
/// Length prefixes are stripped; coordinates stay as packed `i64` bytes
/// (see [`coords_from_bytes`]).
pub fn split_field(schema: &Schema, field: Field, buffer: &[u8]) -> Result<Vec<Bytes>> {
    let name = field.name(schema);
    let fixed = match field {
        Field::Key if !schema.dimensions.is_empty() => Some(schema.dim_num() * 8),
        Field::Key => None,
        Field::Attribute(idx) => match schema.attributes[idx].cell_size {
            CellSize::Fixed(size) => Some(size as usize),
            CellSize::Var => None,
        },
    };

    let buffer = Bytes::copy_from_slice(buffer);
    let mut values = Vec::new();

    match fixed {
        Some(size) => {
            if buffer.len() % size != 0 {
                return Err(TileError::invalid(format!(
                    "Buffer for '{}' holds {} bytes, not a multiple of {}",
                    name,
                    buffer.len(),
                    size
                )));
            }
            for start in (0..buffer.len()).step_by(size) {
                values.push(buffer.slice(start..start + size));
            }
        }
        None => {
            let mut pos = 0;
            while pos < buffer.len() {
                if pos + LEN_PREFIX > buffer.len() {
                    return Err(truncated(name));
                }
                let mut len = [0u8; LEN_PREFIX];
                len.copy_from_slice(&buffer[pos..pos + LEN_PREFIX]);
                let len = u32::from_le_bytes(len) as usize;
                pos += LEN_PREFIX;

                if pos + len > buffer.len() {
                    return Err(truncated(name));
                }
                values.push(buffer.slice(pos..pos + len));
                pos += len;
            }
        }
    }

    Ok(values)
}

fn truncated(name: &str) -> TileError {
    TileError::invalid(format!("Buffer for '{}' ends inside a value", name))
}

/// Unpack little-endian `i64` coordinates
pub fn coords_from_bytes(bytes: &[u8]) -> Vec<i64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            i64::from_le_bytes(raw)
        })
        .collect()
}

/// Assemble whole cells from one buffer per field
///
/// `fields` must name the key field and every attribute exactly once, and
/// every buffer must hold the same number of values.
pub fn decode_cells(schema: &Schema, fields: &[Field], buffers: &[&[u8]]) -> Result<Vec<Cell>> {
    if fields.len() != buffers.len() {
        return Err(TileError::invalid(format!(
            "Expected {} buffers, got {}",
            fields.len(),
            buffers.len()
        )));
    }

    let mut keys: Option<Vec<Bytes>> = None;
    let mut columns: Vec<Option<Vec<Bytes>>> = vec![None; schema.attributes.len()];
    let mut count: Option<usize> = None;

    for (&field, buffer) in fields.iter().zip(buffers) {
        let values = split_field(schema, field, buffer)?;
        match count {
            Some(n) if n != values.len() => {
                return Err(TileError::invalid(format!(
                    "Buffer for '{}' holds {} values, expected {}",
                    field.name(schema),
                    values.len(),
                    n
                )));
            }
            _ => count = Some(values.len()),
        }

        let slot = match field {
            Field::Key => &mut keys,
            Field::Attribute(idx) => &mut columns[idx],
        };
        if slot.replace(values).is_some() {
            return Err(TileError::invalid(format!(
                "Field '{}' is supplied twice",
                field.name(schema)
            )));
        }
    }

    let keys = keys.ok_or_else(|| {
        TileError::invalid(format!("Missing buffer for '{}'", schema.key_field()))
    })?;
    let mut columns = columns
        .into_iter()
        .enumerate()
        .map(|(idx, column)| {
            column.map(Vec::into_iter).ok_or_else(|| {
                TileError::invalid(format!(
                    "Missing buffer for attribute '{}'",
                    schema.attributes[idx].name
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let is_array = !schema.dimensions.is_empty();
    let cells = keys
        .into_iter()
        .map(|raw| {
            let key = if is_array {
                CellKey::Coords(coords_from_bytes(&raw))
            } else {
                CellKey::Key(raw.to_vec())
            };
            // Every column was checked to hold exactly as many values as keys.
            let values = columns
                .iter_mut()
                .map(|column| column.next().unwrap_or_default())
                .collect();
            Cell { key, values }
        })
        .collect();

    Ok(cells)
}
