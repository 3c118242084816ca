//! Storage Module
//!
//! Cell storage of one array or metadata object: a directory of immutable
//! fragments, newest id wins when two fragments hold the same key.
//!
//! ## Responsibilities
//! - Discover fragment files of an object
//! - Publish new fragments atomically (temp file + rename)
//! - Assemble a read snapshot from the fragments present at open time
//! - Drop all fragments on clear

mod fragment;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::schema::Schema;
use crate::session::{cell::compare_keys, Cell, CellKey};

pub use fragment::{Fragment, FragmentBuilder, FragmentIterator, FragmentReader};

const FRAGMENT_PREFIX: &str = "__fragment_";
const FRAGMENT_SUFFIX: &str = ".tsm";
const TEMP_SUFFIX: &str = ".tmp";

/// Generate the file path for a fragment with given id
pub fn fragment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{:06}{}", FRAGMENT_PREFIX, id, FRAGMENT_SUFFIX))
}

/// Parse a fragment id from a file name
/// "__fragment_000042.tsm" → Some(42)
fn parse_fragment_id(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let id = name
        .strip_prefix(FRAGMENT_PREFIX)?
        .strip_suffix(FRAGMENT_SUFFIX)?;
    id.parse().ok()
}

/// Fragments of the object at `dir`, oldest first
pub fn list_fragments(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut fragments = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            if let Some(id) = parse_fragment_id(&path) {
                fragments.push((id, path));
            }
        }
    }

    fragments.sort_by_key(|(id, _)| *id);
    Ok(fragments)
}

/// Write `cells` (already in native order) as the object's newest fragment
///
/// Returns `None` when there is nothing to write.
pub fn write_fragment(dir: &Path, cells: &[Cell], sync: bool) -> Result<Option<Fragment>> {
    if cells.is_empty() {
        return Ok(None);
    }

    let id = list_fragments(dir)?
        .last()
        .map(|(id, _)| id + 1)
        .unwrap_or(1);
    let final_path = fragment_path(dir, id);
    let mut temp_name = final_path.clone().into_os_string();
    temp_name.push(TEMP_SUFFIX);
    let temp_path = PathBuf::from(temp_name);

    let mut builder = FragmentBuilder::new(&temp_path)?;
    for cell in cells {
        builder.add(cell)?;
    }
    let mut fragment = builder.finish(id, sync)?;

    fs::rename(&temp_path, &final_path)?;
    if sync {
        sync_dir(dir);
    }
    fragment.path = final_path;

    tracing::debug!(
        id,
        cells = fragment.cell_count,
        bytes = fragment.file_size,
        "Published fragment in {}",
        dir.display()
    );
    Ok(Some(fragment))
}

/// Delete every fragment (and stray temp file) of the object at `dir`
pub fn remove_fragments(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_temp = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(FRAGMENT_PREFIX) && n.ends_with(TEMP_SUFFIX))
            .unwrap_or(false);

        if path.is_file() && (is_temp || parse_fragment_id(&path).is_some()) {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Every live cell of the object at `dir`, in native order
///
/// Fragments are read oldest to newest so later writes of a key replace
/// earlier ones.
pub fn load_snapshot(dir: &Path, schema: &Schema) -> Result<Vec<Cell>> {
    let mut latest: HashMap<CellKey, Cell> = HashMap::new();

    for (_, path) in list_fragments(dir)? {
        let reader = FragmentReader::open(&path)?;
        for cell in reader.iter() {
            let cell = cell?;
            latest.insert(cell.key.clone(), cell);
        }
    }

    let mut cells: Vec<Cell> = latest.into_values().collect();
    cells.sort_by(|a, b| compare_keys(schema, &a.key, &b.key));
    Ok(cells)
}

/// Best-effort fsync of a directory so a rename is durable
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        if let Err(e) = handle.sync_all() {
            tracing::debug!("Directory sync of {} failed: {}", dir.display(), e);
        }
    }
}
