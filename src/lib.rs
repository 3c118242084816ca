//! # TileStore
//!
//! A hierarchical storage manager for multi-dimensional arrays and
//! key-value metadata:
//! - Workspaces, groups, arrays and metadata laid out as a directory tree
//! - A master catalog (append-only log) of live workspaces
//! - Schema validation before anything is written
//! - Mode-fixed sessions with a buffer-based pull iterator
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Context (status codes + last error)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Storage Manager                          │
//! │         (lifecycle ops, session brokering)                  │
//! └──────┬──────────────┬──────────────┬──────────────┬─────────┘
//!        │              │              │              │
//!        ▼              ▼              ▼              ▼
//! ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐
//! │ Classifier │ │  Catalog   │ │   Schema   │ │  Sessions  │
//! │  (marker)  │ │  (append)  │ │ (validate) │ │ (registry) │
//! └────────────┘ └────────────┘ └────────────┘ └─────┬──────┘
//!                                                    │
//!                                                    ▼
//!                                             ┌────────────┐
//!                                             │  Storage   │
//!                                             │(fragments) │
//!                                             └────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod catalog;
pub mod hierarchy;
pub mod schema;
pub mod storage;
pub mod session;
pub mod manager;
pub mod context;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, Result, TileError};
pub use config::Config;
pub use context::{Context, LastError, Status};
pub use hierarchy::{Classification, ObjectKind};
pub use manager::StorageManager;
pub use schema::{Attribute, CellOrder, CellSize, Dimension, Schema};
pub use session::{Cell, CellKey, IterStep, Mode, Range, Session};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TileStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
