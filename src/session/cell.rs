//! Cells and ranges

use std::cmp::Ordering;

use bytes::Bytes;

use crate::error::{Result, TileError};
use crate::schema::{CellSize, Schema};

/// Address of a cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    /// Array coordinates, one per dimension
    Coords(Vec<i64>),
    /// Metadata key
    Key(Vec<u8>),
}

/// One array cell or metadata entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub key: CellKey,
    /// One value per attribute, in schema order
    pub values: Vec<Bytes>,
}

impl Cell {
    /// Array cell at `coords`
    pub fn at<V: Into<Bytes>>(coords: Vec<i64>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            key: CellKey::Coords(coords),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Metadata entry under `key`
    pub fn keyed<V: Into<Bytes>>(
        key: impl Into<Vec<u8>>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            key: CellKey::Key(key.into()),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Inclusive per-dimension bounds constraining a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub bounds: Vec<(i64, i64)>,
}

impl Range {
    pub fn new(bounds: Vec<(i64, i64)>) -> Self {
        Self { bounds }
    }

    /// Check the range against an array schema
    pub(crate) fn validate(&self, schema: &Schema) -> Result<()> {
        if schema.dimensions.is_empty() {
            return Err(TileError::invalid(
                "Range constraints are only valid for arrays",
            ));
        }
        if self.bounds.len() != schema.dim_num() {
            return Err(TileError::invalid(format!(
                "Range has {} bounds but the array has {} dimensions",
                self.bounds.len(),
                schema.dim_num()
            )));
        }

        for (dim, &(low, high)) in schema.dimensions.iter().zip(&self.bounds) {
            if low > high || !dim.contains(low) || !dim.contains(high) {
                return Err(TileError::invalid(format!(
                    "Range [{}, {}] is invalid for dimension '{}' with domain [{}, {}]",
                    low, high, dim.name, dim.domain.0, dim.domain.1
                )));
            }
        }
        Ok(())
    }

    pub fn contains(&self, coords: &[i64]) -> bool {
        coords.len() == self.bounds.len()
            && self
                .bounds
                .iter()
                .zip(coords)
                .all(|(&(low, high), &c)| c >= low && c <= high)
    }
}

/// Compare two keys in the native order of `schema`
pub(crate) fn compare_keys(schema: &Schema, a: &CellKey, b: &CellKey) -> Ordering {
    match (a, b) {
        (CellKey::Coords(a), CellKey::Coords(b)) => schema.compare_coords(a, b),
        (CellKey::Key(a), CellKey::Key(b)) => a.cmp(b),
        (CellKey::Coords(_), CellKey::Key(_)) => Ordering::Less,
        (CellKey::Key(_), CellKey::Coords(_)) => Ordering::Greater,
    }
}

/// Check that `cell` fits `schema` (key shape, domain, value sizes)
pub(crate) fn check_cell(schema: &Schema, cell: &Cell) -> Result<()> {
    match &cell.key {
        CellKey::Coords(coords) => {
            if schema.dimensions.is_empty() {
                return Err(TileError::invalid(
                    "Metadata entries are addressed by key, not coordinates",
                ));
            }
            if !schema.in_domain(coords) {
                return Err(TileError::invalid(format!(
                    "Coordinates {:?} fall outside the domain of '{}'",
                    coords, schema.name
                )));
            }
        }
        CellKey::Key(_) => {
            if !schema.dimensions.is_empty() {
                return Err(TileError::invalid(
                    "Array cells are addressed by coordinates, not keys",
                ));
            }
        }
    }

    if cell.values.len() != schema.attributes.len() {
        return Err(TileError::invalid(format!(
            "Cell carries {} values but '{}' has {} attributes",
            cell.values.len(),
            schema.name,
            schema.attributes.len()
        )));
    }

    for (attr, value) in schema.attributes.iter().zip(&cell.values) {
        if let CellSize::Fixed(size) = attr.cell_size {
            if value.len() != size as usize {
                return Err(TileError::invalid(format!(
                    "Attribute '{}' expects {} bytes per value, got {}",
                    attr.name,
                    size,
                    value.len()
                )));
            }
        }
    }
    Ok(())
}
