//! Object lifecycle: create, clear, delete, move, ls
//!
//! Every operation classifies its target first and dispatches on the
//! resulting [`ObjectKind`]. Nothing is retried or rolled back: a failure
//! midway leaves the namespace as it was after the last completed step.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::catalog::CatalogOp;
use crate::error::{Result, TileError};
use crate::hierarchy::{classify, Classification, ObjectKind};
use crate::schema::{self, Schema, SCHEMA_FILE};
use crate::storage;

use super::StorageManager;

impl StorageManager {
    // =========================================================================
    // Create
    // =========================================================================

    /// Create an object of `kind` at `path`
    ///
    /// Arrays and metadata need a schema, containers must not get one. The
    /// schema is validated before anything touches the disk.
    pub fn create(&self, path: &str, kind: ObjectKind, schema: Option<&Schema>) -> Result<PathBuf> {
        let dir = self.resolve(path)?;

        match (kind.has_schema(), schema) {
            (true, None) => {
                return Err(TileError::invalid(format!("A {} requires a schema", kind)));
            }
            (false, Some(_)) => {
                return Err(TileError::invalid(format!("A {} takes no schema", kind)));
            }
            (true, Some(schema)) => schema.validate(kind)?,
            (false, None) => {}
        }

        if let Classification::Object(found) = classify(&dir) {
            return Err(TileError::AlreadyExists(format!(
                "{} already exists as a {}",
                dir.display(),
                found
            )));
        }
        if dir.exists() && !is_empty_dir(&dir)? {
            return Err(TileError::AlreadyExists(format!(
                "{} already exists and is not empty",
                dir.display()
            )));
        }

        let parent = parent_of(&dir)?;
        check_parent(kind, parent)?;

        let created_dir = !dir.exists();
        if kind == ObjectKind::Workspace {
            fs::create_dir_all(&dir)?;
        } else if created_dir {
            fs::create_dir(&dir)?;
        }

        if let Err(e) = self.materialize(&dir, kind, schema) {
            if created_dir {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    tracing::warn!("Failed to clean up {}: {}", dir.display(), cleanup);
                }
            }
            return Err(e);
        }

        tracing::info!("Created {} {}", kind, dir.display());
        Ok(dir)
    }

    /// Create an object called `name` inside `parent`
    pub fn create_in(
        &self,
        parent: &str,
        name: &str,
        kind: ObjectKind,
        schema: Option<&Schema>,
    ) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(TileError::invalid(format!("Invalid object name '{}'", name)));
        }
        let parent = self.resolve(parent)?;
        let path = parent.join(name);
        self.create(&path.to_string_lossy(), kind, schema)
    }

    pub fn create_workspace(&self, path: &str) -> Result<PathBuf> {
        self.create(path, ObjectKind::Workspace, None)
    }

    pub fn create_group(&self, path: &str) -> Result<PathBuf> {
        self.create(path, ObjectKind::Group, None)
    }

    pub fn create_array(&self, path: &str, schema: &Schema) -> Result<PathBuf> {
        self.create(path, ObjectKind::Array, Some(schema))
    }

    pub fn create_metadata(&self, path: &str, schema: &Schema) -> Result<PathBuf> {
        self.create(path, ObjectKind::Metadata, Some(schema))
    }

    /// Marker, then schema, then catalog entry
    fn materialize(&self, dir: &Path, kind: ObjectKind, schema: Option<&Schema>) -> Result<()> {
        write_marker(dir, kind)?;
        if let Some(schema) = schema {
            schema::persist(dir, schema)?;
        }
        if kind.catalog_tracked() {
            self.catalog.record(dir, CatalogOp::Insert)?;
        }
        Ok(())
    }

    // =========================================================================
    // Clear / Delete
    // =========================================================================

    /// Remove the contents of an object, keeping the object itself
    ///
    /// Arrays and metadata lose their cells but keep marker and schema;
    /// workspaces and groups lose every child object.
    pub fn clear(&self, path: &str) -> Result<()> {
        let (dir, kind) = self.existing(path)?;
        let _hold = self.sessions.hold(&[dir.as_path()])?;

        clear_contents(&dir, kind)?;
        tracing::info!("Cleared {} {}", kind, dir.display());
        Ok(())
    }

    /// Remove an object and everything below it
    pub fn delete(&self, path: &str) -> Result<()> {
        let (dir, kind) = self.existing(path)?;
        let _hold = self.sessions.hold(&[dir.as_path()])?;

        delete_object(&dir, kind)?;
        if kind.catalog_tracked() {
            self.catalog.record(&dir, CatalogOp::Delete)?;
        }

        tracing::info!("Deleted {} {}", kind, dir.display());
        Ok(())
    }

    // =========================================================================
    // Move
    // =========================================================================

    /// Rename an object, carrying its whole subtree
    ///
    /// With `force`, an existing object at `new_path` is deleted first;
    /// otherwise `new_path` must not exist.
    pub fn move_object(&self, old_path: &str, new_path: &str, force: bool) -> Result<()> {
        let (old_dir, kind) = self.existing(old_path)?;
        let new_dir = self.resolve(new_path)?;

        if new_dir.starts_with(&old_dir) {
            return Err(TileError::invalid(format!(
                "Cannot move {} into itself ({})",
                old_dir.display(),
                new_dir.display()
            )));
        }
        if old_dir.starts_with(&new_dir) {
            return Err(TileError::invalid(format!(
                "Cannot move {} onto its own ancestor {}",
                old_dir.display(),
                new_dir.display()
            )));
        }
        let _hold = self.sessions.hold(&[old_dir.as_path(), new_dir.as_path()])?;

        check_parent(kind, parent_of(&new_dir)?)?;

        match classify(&new_dir) {
            Classification::Object(found) if !force => {
                return Err(TileError::AlreadyExists(format!(
                    "{} already exists as a {}",
                    new_dir.display(),
                    found
                )));
            }
            Classification::Object(found) => {
                delete_object(&new_dir, found)?;
                if found.catalog_tracked() {
                    self.catalog.record(&new_dir, CatalogOp::Delete)?;
                }
            }
            Classification::NotFound => {
                if new_dir.exists() && !is_empty_dir(&new_dir)? {
                    return Err(TileError::AlreadyExists(format!(
                        "{} already exists and is not empty",
                        new_dir.display()
                    )));
                }
            }
        }

        if kind == ObjectKind::Workspace {
            if let Some(parent) = new_dir.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::rename(&old_dir, &new_dir)?;

        if kind.catalog_tracked() {
            // Delete first: a crash in between leaves the workspace absent
            // from the live set rather than listed twice.
            self.catalog.record(&old_dir, CatalogOp::Delete)?;
            self.catalog.record(&new_dir, CatalogOp::Insert)?;
        }

        tracing::info!(
            "Moved {} {} -> {}",
            kind,
            old_dir.display(),
            new_dir.display()
        );
        Ok(())
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Immediate child objects of `parent`, sorted by name
    pub fn ls(&self, parent: &str) -> Result<Vec<(String, ObjectKind)>> {
        let (dir, _) = self.existing(parent)?;
        Ok(children(&dir)?
            .into_iter()
            .map(|(path, kind)| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (name, kind)
            })
            .collect())
    }

    /// Live workspaces according to the master catalog
    pub fn ls_workspaces(&self) -> Result<Vec<PathBuf>> {
        self.catalog.replay()
    }

    /// Load the schema of an array or metadata object
    pub fn load_schema(&self, path: &str) -> Result<Schema> {
        let (dir, kind) = self.existing(path)?;
        if !kind.has_schema() {
            return Err(TileError::TypeMismatch {
                path: dir,
                expected: "array or metadata".to_string(),
                found: kind,
            });
        }
        schema::load(&dir)
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

fn parent_of(dir: &Path) -> Result<&Path> {
    dir.parent().ok_or_else(|| {
        TileError::invalid(format!("{} has no parent directory", dir.display()))
    })
}

/// Check that `parent` may hold an object of `kind`
fn check_parent(kind: ObjectKind, parent: &Path) -> Result<()> {
    let allowed = kind.allowed_parents();

    if allowed.is_empty() {
        // Workspaces never nest: a workspace below another object would be
        // removed or relocated with it without a catalog entry.
        for ancestor in parent.ancestors() {
            if let Classification::Object(found) = classify(ancestor) {
                return Err(TileError::TypeMismatch {
                    path: ancestor.to_path_buf(),
                    expected: "a plain directory".to_string(),
                    found,
                });
            }
        }
        return Ok(());
    }

    let found = classify(parent);

    let expected = allowed
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" or ");

    match found {
        Classification::Object(found) if allowed.contains(&found) => Ok(()),
        Classification::Object(found) => Err(TileError::TypeMismatch {
            path: parent.to_path_buf(),
            expected,
            found,
        }),
        Classification::NotFound => Err(TileError::NotFound(format!(
            "Parent directory {} is not a {}",
            parent.display(),
            expected
        ))),
    }
}

fn write_marker(dir: &Path, kind: ObjectKind) -> Result<()> {
    let file = File::create(dir.join(kind.marker_file()))?;
    file.sync_all()?;
    Ok(())
}

fn is_empty_dir(dir: &Path) -> Result<bool> {
    Ok(dir.is_dir() && fs::read_dir(dir)?.next().is_none())
}

/// Hierarchy objects directly inside `dir`, sorted by path
fn children(dir: &Path) -> Result<Vec<(PathBuf, ObjectKind)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Classification::Object(kind) = classify(&path) {
            found.push((path, kind));
        }
    }
    found.sort();
    Ok(found)
}

fn clear_contents(dir: &Path, kind: ObjectKind) -> Result<()> {
    if kind.is_dataset() {
        let removed = storage::remove_fragments(dir)?;
        tracing::debug!(removed, "Removed fragments of {}", dir.display());
        return Ok(());
    }

    for (child, child_kind) in children(dir)? {
        delete_object(&child, child_kind)?;
    }
    Ok(())
}

/// Depth-first delete; the marker goes last so a partial failure leaves
/// the object classifiable for a retry
fn delete_object(dir: &Path, kind: ObjectKind) -> Result<()> {
    for (child, child_kind) in children(dir)? {
        delete_object(&child, child_kind)?;
    }

    if kind.is_dataset() {
        storage::remove_fragments(dir)?;
    }
    if kind.has_schema() {
        remove_if_present(&dir.join(SCHEMA_FILE))?;
    }
    remove_if_present(&dir.join(kind.marker_file()))?;
    fs::remove_dir_all(dir)?;

    tracing::debug!("Removed {} {}", kind, dir.display());
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
