//! Tests for Fragment Storage
//!
//! These tests verify:
//! - Fragment build / read back
//! - Fragment id allocation and discovery
//! - Snapshot assembly (newest fragment wins, native order)
//! - Corruption detection on damaged files
//! - Fragment removal on clear

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tilestore::error::ErrorKind;
use tilestore::storage::{self, FragmentBuilder, FragmentReader};
use tilestore::{Attribute, Cell, CellKey, CellOrder, Dimension, Schema};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn grid_schema(order: CellOrder) -> Schema {
    Schema::array("grid")
        .with_dimension(Dimension::new("row", 0, 9))
        .with_dimension(Dimension::new("col", 0, 9))
        .with_attribute(Attribute::var("label"))
        .with_cell_order(order)
}

fn kv_schema() -> Schema {
    Schema::metadata("kv").with_attribute(Attribute::var("value"))
}

fn cell(row: i64, col: i64, label: &str) -> Cell {
    Cell::at(vec![row, col], [label.as_bytes().to_vec()])
}

fn labels(cells: &[Cell]) -> Vec<String> {
    cells
        .iter()
        .map(|c| String::from_utf8(c.values[0].to_vec()).unwrap())
        .collect()
}

fn coords(cells: &[Cell]) -> Vec<Vec<i64>> {
    cells
        .iter()
        .map(|c| match &c.key {
            CellKey::Coords(coords) => coords.clone(),
            CellKey::Key(_) => panic!("expected coordinates"),
        })
        .collect()
}

fn first_fragment(dir: &Path) -> std::path::PathBuf {
    storage::list_fragments(dir).unwrap().remove(0).1
}

// =============================================================================
// Builder / Reader Tests
// =============================================================================

#[test]
fn test_build_and_read_fragment() {
    let temp = setup_temp_dir();
    let path = temp.path().join("frag.tsm");

    let mut builder = FragmentBuilder::new(&path).unwrap();
    builder.add(&cell(0, 1, "a")).unwrap();
    builder.add(&cell(2, 3, "b")).unwrap();
    let fragment = builder.finish(1, true).unwrap();

    assert_eq!(fragment.cell_count, 2);
    assert_eq!(fragment.file_size, fs::metadata(&path).unwrap().len());

    let reader = FragmentReader::open(&path).unwrap();
    assert_eq!(reader.cell_count(), 2);

    let cells: Vec<Cell> = reader.iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(coords(&cells), vec![vec![0, 1], vec![2, 3]]);
    assert_eq!(labels(&cells), vec!["a", "b"]);
}

#[test]
fn test_keyed_fragment() {
    let temp = setup_temp_dir();
    let path = temp.path().join("frag.tsm");

    let mut builder = FragmentBuilder::new(&path).unwrap();
    builder.add(&Cell::keyed("alpha", [b"1".to_vec()])).unwrap();
    builder.add(&Cell::keyed("", [Vec::<u8>::new()])).unwrap();
    builder.finish(1, false).unwrap();

    let cells: Vec<Cell> = FragmentReader::open(&path)
        .unwrap()
        .iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(cells[0].key, CellKey::Key(b"alpha".to_vec()));
    assert_eq!(cells[1].key, CellKey::Key(Vec::new()));
    assert!(cells[1].values[0].is_empty());
}

#[test]
fn test_builder_rejects_mixed_keys() {
    let temp = setup_temp_dir();
    let mut builder = FragmentBuilder::new(&temp.path().join("frag.tsm")).unwrap();

    builder.add(&cell(0, 0, "a")).unwrap();
    assert!(builder.add(&Cell::keyed("k", [b"v".to_vec()])).is_err());
}

// =============================================================================
// Discovery Tests
// =============================================================================

#[test]
fn test_write_fragment_allocates_ids() {
    let temp = setup_temp_dir();

    let first = storage::write_fragment(temp.path(), &[cell(0, 0, "a")], false)
        .unwrap()
        .unwrap();
    let second = storage::write_fragment(temp.path(), &[cell(0, 0, "b")], false)
        .unwrap()
        .unwrap();

    assert_eq!((first.id, second.id), (1, 2));
    assert_eq!(second.path, storage::fragment_path(temp.path(), 2));

    let ids: Vec<u64> = storage::list_fragments(temp.path())
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_write_empty_fragment_is_skipped() {
    let temp = setup_temp_dir();
    assert!(storage::write_fragment(temp.path(), &[], true).unwrap().is_none());
    assert!(storage::list_fragments(temp.path()).unwrap().is_empty());
}

#[test]
fn test_list_ignores_foreign_files() {
    let temp = setup_temp_dir();
    storage::write_fragment(temp.path(), &[cell(0, 0, "a")], false).unwrap();
    fs::write(temp.path().join("__array.tsm"), b"").unwrap();
    fs::write(temp.path().join("__fragment_abc.tsm"), b"").unwrap();

    assert_eq!(storage::list_fragments(temp.path()).unwrap().len(), 1);
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_snapshot_newest_fragment_wins() {
    let temp = setup_temp_dir();
    let schema = grid_schema(CellOrder::RowMajor);

    storage::write_fragment(temp.path(), &[cell(0, 0, "old"), cell(1, 1, "keep")], false)
        .unwrap();
    storage::write_fragment(temp.path(), &[cell(0, 0, "new")], false).unwrap();

    let cells = storage::load_snapshot(temp.path(), &schema).unwrap();
    assert_eq!(coords(&cells), vec![vec![0, 0], vec![1, 1]]);
    assert_eq!(labels(&cells), vec!["new", "keep"]);
}

#[test]
fn test_snapshot_follows_cell_order() {
    let temp = setup_temp_dir();
    storage::write_fragment(temp.path(), &[cell(0, 1, "a"), cell(1, 0, "b")], false).unwrap();

    let row_major = storage::load_snapshot(temp.path(), &grid_schema(CellOrder::RowMajor)).unwrap();
    assert_eq!(labels(&row_major), vec!["a", "b"]);

    let col_major = storage::load_snapshot(temp.path(), &grid_schema(CellOrder::ColMajor)).unwrap();
    assert_eq!(labels(&col_major), vec!["b", "a"]);
}

#[test]
fn test_snapshot_of_metadata_sorts_by_key() {
    let temp = setup_temp_dir();
    storage::write_fragment(temp.path(), &[Cell::keyed("b", [b"2".to_vec()])], false).unwrap();
    storage::write_fragment(temp.path(), &[Cell::keyed("a", [b"1".to_vec()])], false).unwrap();

    let cells = storage::load_snapshot(temp.path(), &kv_schema()).unwrap();
    assert_eq!(cells[0].key, CellKey::Key(b"a".to_vec()));
    assert_eq!(cells[1].key, CellKey::Key(b"b".to_vec()));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_detects_flipped_data_byte() {
    let temp = setup_temp_dir();
    storage::write_fragment(temp.path(), &[cell(3, 4, "payload")], false).unwrap();
    let path = first_fragment(temp.path());

    let mut bytes = fs::read(&path).unwrap();
    bytes[20] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let err = FragmentReader::open(&path).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::IoFailure);

    let err = storage::load_snapshot(temp.path(), &grid_schema(CellOrder::RowMajor)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

#[test]
fn test_detects_bad_magic_and_truncation() {
    let temp = setup_temp_dir();
    storage::write_fragment(temp.path(), &[cell(0, 0, "a")], false).unwrap();
    let path = first_fragment(temp.path());
    let bytes = fs::read(&path).unwrap();

    let mut bad_magic = bytes.clone();
    bad_magic[0] = b'X';
    fs::write(&path, &bad_magic).unwrap();
    assert!(FragmentReader::open(&path).is_err());

    fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();
    assert!(FragmentReader::open(&path).is_err());
}

#[test]
fn test_detects_oversized_footer_length() {
    let temp = setup_temp_dir();
    storage::write_fragment(temp.path(), &[cell(1, 1, "a")], false).unwrap();
    let path = first_fragment(temp.path());

    let mut bytes = fs::read(&path).unwrap();
    let footer = bytes.len() - 16;
    bytes[footer..footer + 8].copy_from_slice(&u64::MAX.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    let err = FragmentReader::open(&path).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

// =============================================================================
// Removal Tests
// =============================================================================

#[test]
fn test_remove_fragments_keeps_other_files() {
    let temp = setup_temp_dir();
    storage::write_fragment(temp.path(), &[cell(0, 0, "a")], false).unwrap();
    storage::write_fragment(temp.path(), &[cell(0, 1, "b")], false).unwrap();
    fs::write(temp.path().join("__fragment_000003.tsm.tmp"), b"partial").unwrap();
    fs::write(temp.path().join("__array.tsm"), b"").unwrap();

    let removed = storage::remove_fragments(temp.path()).unwrap();

    assert_eq!(removed, 3);
    assert!(storage::list_fragments(temp.path()).unwrap().is_empty());
    assert!(temp.path().join("__array.tsm").exists());
}
