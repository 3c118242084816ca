//! Error types for TileStore
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::hierarchy::ObjectKind;

/// Result type alias using TileError
pub type Result<T> = std::result::Result<T, TileError>;

/// Unified error type for TileStore operations
#[derive(Debug, Error)]
pub enum TileError {
    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Hierarchy Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{} is a {found}, expected {expected}", path.display())]
    TypeMismatch {
        path: PathBuf,
        expected: String,
        found: ObjectKind,
    },

    // -------------------------------------------------------------------------
    // Schema Errors
    // -------------------------------------------------------------------------
    #[error("Schema error: {0}")]
    Schema(String),

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Cell ordering violation: {0}")]
    OrderingViolation(String),

    #[error("{} is already open for writing", .0.display())]
    ConcurrentWrite(PathBuf),

    #[error("{} has open sessions", .0.display())]
    Busy(PathBuf),

    #[error("Session on {} is already finalized", .0.display())]
    SessionFinalized(PathBuf),

    #[error("Iterator on {} is exhausted", .0.display())]
    IteratorExhausted(PathBuf),

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of a [`TileError`], stable across payload changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    TypeMismatch,
    SchemaError,
    OrderingViolation,
    ConcurrentWrite,
    Busy,
    IoFailure,
}

impl TileError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TileError::InvalidArgument(_)
            | TileError::SessionFinalized(_)
            | TileError::IteratorExhausted(_) => ErrorKind::InvalidArgument,
            TileError::NotFound(_) => ErrorKind::NotFound,
            TileError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            TileError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            TileError::Schema(_) => ErrorKind::SchemaError,
            TileError::OrderingViolation(_) => ErrorKind::OrderingViolation,
            TileError::ConcurrentWrite(_) => ErrorKind::ConcurrentWrite,
            TileError::Busy(_) => ErrorKind::Busy,
            TileError::Io(_) | TileError::Corruption(_) | TileError::Serialization(_) => {
                ErrorKind::IoFailure
            }
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        TileError::InvalidArgument(message.into())
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        TileError::Schema(message.into())
    }
}

impl From<bincode::Error> for TileError {
    fn from(e: bincode::Error) -> Self {
        TileError::Serialization(e.to_string())
    }
}
