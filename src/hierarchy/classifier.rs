//! Path Classifier
//!
//! Read-only probe deciding what, if anything, lives at a directory.

use std::path::Path;

use super::ObjectKind;

/// Outcome of classifying a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No hierarchy object at this path (it may still be a plain directory)
    NotFound,
    /// A hierarchy object of the given kind
    Object(ObjectKind),
}

impl Classification {
    /// The object kind, if any
    pub fn kind(self) -> Option<ObjectKind> {
        match self {
            Classification::NotFound => None,
            Classification::Object(kind) => Some(kind),
        }
    }

    pub fn is_found(self) -> bool {
        self != Classification::NotFound
    }
}

/// Classify `path` by probing for a type marker directly inside it
///
/// Ancestors are never inspected. I/O errors while probing count as
/// "not found": the probe has no side effects and no failure mode.
pub fn classify(path: &Path) -> Classification {
    if !path.is_dir() {
        return Classification::NotFound;
    }

    ObjectKind::ALL
        .into_iter()
        .find(|kind| path.join(kind.marker_file()).is_file())
        .map_or(Classification::NotFound, Classification::Object)
}
