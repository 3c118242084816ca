//! Fragment Module
//!
//! A fragment is an immutable, sorted batch of cells produced by one
//! finalized write session.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (15 bytes)                                       │
//! │   Magic: "TSFG" (4) | Version: u16 (2) | KeyKind: u8 (1)│
//! │   Count: u64 (8)                                        │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][Key][ValueCount: u32]                   │
//! │   ([ValLen: u32][Value]) x ValueCount                   │
//! │   ... repeated for each cell ...                        │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   DataLen: u64 (8) | DataCRC: u32 (4) | Padding (4)     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Coordinate keys are stored as packed little-endian `i64`s.

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::FragmentBuilder;
pub use iterator::FragmentIterator;
pub use reader::FragmentReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a fragment file
pub(crate) const MAGIC: &[u8; 4] = b"TSFG";

/// Current fragment format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + KeyKind (1) + CellCount (8)
pub(crate) const HEADER_SIZE: usize = 15;

/// Footer size: DataLen (8) + DataCRC (4) + Padding (4)
pub(crate) const FOOTER_SIZE: usize = 16;

/// Key kind tags
pub(crate) const KEY_COORDS: u8 = 0;
pub(crate) const KEY_BYTES: u8 = 1;

/// Summary of a written fragment
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Path to the fragment file
    pub path: PathBuf,
    /// Fragment id (monotonic within its object)
    pub id: u64,
    /// Number of cells in this fragment
    pub cell_count: u64,
    /// File size in bytes
    pub file_size: u64,
}
