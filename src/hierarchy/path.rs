//! Path resolution
//!
//! Caller-supplied paths are resolved against the configured home
//! directory, never against the process working directory.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, TileError};

/// Resolve a caller path into an absolute, lexically normalized path
///
/// - empty input is rejected
/// - relative input is joined onto `home`
/// - `.` components are dropped, `..` pops the previous component
pub fn resolve(home: &Path, raw: &str) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(TileError::invalid("Invalid directory argument is empty"));
    }

    let raw = Path::new(raw);
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        home.join(raw)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(TileError::invalid(format!(
                        "Invalid directory argument '{}' escapes the filesystem root",
                        joined.display()
                    )));
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.parent().is_none() {
        return Err(TileError::invalid(
            "Invalid directory argument resolves to the filesystem root",
        ));
    }

    Ok(normalized)
}
