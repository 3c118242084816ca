//! Schema Module
//!
//! Describes the shape of an array or metadata object: its dimensions (arrays
//! only), its attributes, and the native order of its cells.
//!
//! ## Responsibilities
//! - Structural validation before anything is written
//! - Persisting the schema next to its object
//! - Loading it back for open and explicit load requests

mod store;

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TileError};
use crate::hierarchy::ObjectKind;

pub use store::{load, persist, SCHEMA_FILE};

/// Field name addressing the coordinates of an array cell
pub const COORDS_FIELD: &str = "__coords";

/// Field name addressing the key of a metadata entry
pub const KEY_FIELD: &str = "__key";

/// Schema of an array or metadata object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Object name
    pub name: String,

    /// Dimensions (empty for metadata)
    pub dimensions: Vec<Dimension>,

    /// Attributes, in declaration order
    pub attributes: Vec<Attribute>,

    /// Native order of array cells
    pub cell_order: CellOrder,
}

/// A named dimension with an inclusive integer domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub domain: (i64, i64),
}

/// A named attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub cell_size: CellSize,
}

/// Size of one attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellSize {
    /// Every value is exactly this many bytes
    Fixed(u32),
    /// Values carry their own length
    Var,
}

/// Order in which array coordinates are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellOrder {
    /// First dimension is most significant
    #[default]
    RowMajor,
    /// Last dimension is most significant
    ColMajor,
}

impl Dimension {
    pub fn new(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            domain: (low, high),
        }
    }

    pub fn contains(&self, coord: i64) -> bool {
        coord >= self.domain.0 && coord <= self.domain.1
    }
}

impl Attribute {
    pub fn fixed(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            cell_size: CellSize::Fixed(size),
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell_size: CellSize::Var,
        }
    }
}

impl Schema {
    /// Start an array schema
    pub fn array(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimensions: Vec::new(),
            attributes: Vec::new(),
            cell_order: CellOrder::RowMajor,
        }
    }

    /// Start a metadata schema
    pub fn metadata(name: impl Into<String>) -> Self {
        Self::array(name)
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_cell_order(mut self, order: CellOrder) -> Self {
        self.cell_order = order;
        self
    }

    /// Check structural well-formedness for an object of `kind`
    pub fn validate(&self, kind: ObjectKind) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TileError::schema("schema name is empty"));
        }
        if self.attributes.is_empty() {
            return Err(TileError::schema(format!(
                "schema '{}' declares no attributes",
                self.name
            )));
        }

        match kind {
            ObjectKind::Array => {
                if self.dimensions.is_empty() {
                    return Err(TileError::schema(format!(
                        "array schema '{}' declares no dimensions",
                        self.name
                    )));
                }
                if let Some(dim) = self.dimensions.iter().find(|d| d.domain.0 > d.domain.1) {
                    return Err(TileError::schema(format!(
                        "dimension '{}' has an empty domain [{}, {}]",
                        dim.name, dim.domain.0, dim.domain.1
                    )));
                }
            }
            ObjectKind::Metadata => {
                if !self.dimensions.is_empty() {
                    return Err(TileError::schema(format!(
                        "metadata schema '{}' must not declare dimensions",
                        self.name
                    )));
                }
            }
            other => {
                return Err(TileError::schema(format!("a {} has no schema", other)));
            }
        }

        let mut seen = HashSet::new();
        let names = self
            .dimensions
            .iter()
            .map(|d| d.name.as_str())
            .chain(self.attributes.iter().map(|a| a.name.as_str()));
        for name in names {
            if name.is_empty() {
                return Err(TileError::schema(format!(
                    "schema '{}' has an unnamed dimension or attribute",
                    self.name
                )));
            }
            if name == COORDS_FIELD || name == KEY_FIELD {
                return Err(TileError::schema(format!("'{}' is a reserved name", name)));
            }
            if !seen.insert(name) {
                return Err(TileError::schema(format!(
                    "schema '{}' repeats the name '{}'",
                    self.name, name
                )));
            }
        }

        if let Some(attr) = self
            .attributes
            .iter()
            .find(|a| a.cell_size == CellSize::Fixed(0))
        {
            return Err(TileError::schema(format!(
                "attribute '{}' has a zero cell size",
                attr.name
            )));
        }

        Ok(())
    }

    /// Number of dimensions
    pub fn dim_num(&self) -> usize {
        self.dimensions.len()
    }

    /// Name of the field that addresses a cell
    pub fn key_field(&self) -> &'static str {
        if self.dimensions.is_empty() {
            KEY_FIELD
        } else {
            COORDS_FIELD
        }
    }

    /// Index of the attribute called `name`
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    /// Whether `coords` lie inside the domain
    pub fn in_domain(&self, coords: &[i64]) -> bool {
        coords.len() == self.dimensions.len()
            && self
                .dimensions
                .iter()
                .zip(coords)
                .all(|(dim, &c)| dim.contains(c))
    }

    /// Compare two coordinate tuples in native cell order
    pub fn compare_coords(&self, a: &[i64], b: &[i64]) -> Ordering {
        match self.cell_order {
            CellOrder::RowMajor => a.cmp(b),
            CellOrder::ColMajor => a.iter().rev().cmp(b.iter().rev()),
        }
    }
}
