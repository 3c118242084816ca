//! Hierarchy Module
//!
//! The namespace is a tree of directories. Each hierarchy object carries a
//! type marker file that makes its kind determinable without looking at its
//! ancestors.
//!
//! ## Layout
//! ```text
//! workspace/                 __workspace.tsm
//! ├── group/                 __group.tsm
//! │   └── array/             __array.tsm, __schema.tsm, __fragment_*.tsm
//! │       └── metadata/      __metadata.tsm, __schema.tsm, __fragment_*.tsm
//! └── metadata/              __metadata.tsm, __schema.tsm, __fragment_*.tsm
//! ```

mod classifier;
mod path;

use std::fmt;

pub use classifier::{classify, Classification};
pub use path::resolve;

/// Hierarchy type of an object
///
/// Every lifecycle rule that differs per level is answered by this table
/// rather than by per-type code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Workspace,
    Group,
    Array,
    Metadata,
}

impl ObjectKind {
    /// All kinds, in classification probe order
    pub const ALL: [ObjectKind; 4] = [
        ObjectKind::Workspace,
        ObjectKind::Group,
        ObjectKind::Array,
        ObjectKind::Metadata,
    ];

    /// Name of the type marker file inside the object's directory
    pub fn marker_file(self) -> &'static str {
        match self {
            ObjectKind::Workspace => "__workspace.tsm",
            ObjectKind::Group => "__group.tsm",
            ObjectKind::Array => "__array.tsm",
            ObjectKind::Metadata => "__metadata.tsm",
        }
    }

    /// Kinds allowed as the direct parent of this kind
    ///
    /// Empty for workspaces: they must sit in a plain directory.
    pub fn allowed_parents(self) -> &'static [ObjectKind] {
        match self {
            ObjectKind::Workspace => &[],
            ObjectKind::Group | ObjectKind::Array => &[ObjectKind::Workspace, ObjectKind::Group],
            ObjectKind::Metadata => &[ObjectKind::Workspace, ObjectKind::Group, ObjectKind::Array],
        }
    }

    /// Whether objects of this kind carry a persisted schema
    pub fn has_schema(self) -> bool {
        matches!(self, ObjectKind::Array | ObjectKind::Metadata)
    }

    /// Whether objects of this kind are tracked by the master catalog
    pub fn catalog_tracked(self) -> bool {
        self == ObjectKind::Workspace
    }

    /// Whether objects of this kind hold cells that sessions can access
    pub fn is_dataset(self) -> bool {
        self.has_schema()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Workspace => "workspace",
            ObjectKind::Group => "group",
            ObjectKind::Array => "array",
            ObjectKind::Metadata => "metadata",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
