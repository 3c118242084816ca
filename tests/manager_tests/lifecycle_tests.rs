//! Tests for Object Lifecycle
//!
//! These tests verify:
//! - Create per kind, with parent-kind rules and schema validation
//! - Classification after create / delete / move
//! - Clear semantics (datasets keep schema, containers lose children)
//! - Recursive delete and master catalog bookkeeping
//! - Move (plain and forced) and its error cases
//! - Listing children and live workspaces

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use tilestore::error::{ErrorKind, TileError};
use tilestore::schema::SCHEMA_FILE;
use tilestore::storage;
use tilestore::{
    Attribute, Cell, Classification, Dimension, Mode, ObjectKind, Schema, StorageManager,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_manager() -> (TempDir, StorageManager) {
    let temp_dir = TempDir::new().unwrap();
    let manager = StorageManager::init_path(temp_dir.path()).unwrap();
    (temp_dir, manager)
}

fn array_schema() -> Schema {
    Schema::array("points")
        .with_dimension(Dimension::new("x", 0, 99))
        .with_attribute(Attribute::fixed("value", 4))
}

fn metadata_schema() -> Schema {
    Schema::metadata("tags").with_attribute(Attribute::var("value"))
}

fn kind_at(manager: &StorageManager, path: &str) -> Option<ObjectKind> {
    manager.classify(path).unwrap().kind()
}

fn write_points(manager: &StorageManager, path: &str, xs: &[i64]) {
    let mut session = manager.open(path, Mode::Write, None, &[]).unwrap();
    for &x in xs {
        session
            .write_cell(Cell::at(vec![x], [(x as u32).to_le_bytes().to_vec()]))
            .unwrap();
    }
    session.finalize().unwrap();
}

fn live_workspaces(manager: &StorageManager) -> Vec<PathBuf> {
    manager.ls_workspaces().unwrap()
}

// =============================================================================
// Create Tests
// =============================================================================

#[test]
fn test_create_each_kind_and_classify() {
    let (_temp, manager) = setup_temp_manager();

    manager.create_workspace("ws").unwrap();
    manager.create_group("ws/g").unwrap();
    manager.create_array("ws/g/a", &array_schema()).unwrap();
    manager.create_metadata("ws/g/a/m", &metadata_schema()).unwrap();
    manager.create_metadata("ws/m", &metadata_schema()).unwrap();

    assert_eq!(kind_at(&manager, "ws"), Some(ObjectKind::Workspace));
    assert_eq!(kind_at(&manager, "ws/g"), Some(ObjectKind::Group));
    assert_eq!(kind_at(&manager, "ws/g/a"), Some(ObjectKind::Array));
    assert_eq!(kind_at(&manager, "ws/g/a/m"), Some(ObjectKind::Metadata));
    assert_eq!(kind_at(&manager, "ws/m"), Some(ObjectKind::Metadata));
    assert_eq!(kind_at(&manager, "ws/none"), None);
}

#[test]
fn test_create_returns_resolved_path() {
    let (_temp, manager) = setup_temp_manager();

    let dir = manager.create_workspace("./a/../ws").unwrap();
    assert_eq!(dir, manager.home_dir().join("ws"));

    let absolute = manager.home_dir().join("ws").join("g");
    let dir = manager.create_group(absolute.to_str().unwrap()).unwrap();
    assert_eq!(dir, absolute);
}

#[test]
fn test_create_workspace_records_catalog_entry() {
    let (_temp, manager) = setup_temp_manager();

    let dir = manager.create_workspace("ws").unwrap();
    assert_eq!(live_workspaces(&manager), vec![dir]);
}

#[test]
fn test_create_workspace_with_missing_ancestors() {
    let (_temp, manager) = setup_temp_manager();

    manager.create_workspace("deep/nested/ws").unwrap();
    assert_eq!(kind_at(&manager, "deep/nested/ws"), Some(ObjectKind::Workspace));
    assert_eq!(kind_at(&manager, "deep/nested"), None);
}

#[test]
fn test_create_workspace_inside_object_fails() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();

    let err = manager.create_workspace("ws/inner").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert!(!manager.home_dir().join("ws/inner").exists());
}

#[test]
fn test_create_workspace_below_plain_dir_in_workspace_fails() {
    let (_temp, manager) = setup_temp_manager();
    let ws = manager.create_workspace("ws").unwrap();
    fs::create_dir(ws.join("plain")).unwrap();

    let err = manager.create_workspace("ws/plain/inner").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert!(!ws.join("plain/inner").exists());
    assert_eq!(live_workspaces(&manager), vec![ws]);

    manager.delete("ws").unwrap();
    assert!(live_workspaces(&manager).is_empty());
}

#[test]
fn test_create_group_outside_workspace_fails() {
    let (_temp, manager) = setup_temp_manager();
    fs::create_dir(manager.home_dir().join("plain")).unwrap();

    let err = manager.create_group("plain/g").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = manager.create_group("missing/g").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_create_respects_parent_kinds() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();
    manager.create_array("ws/a", &array_schema()).unwrap();
    manager.create_metadata("ws/m", &metadata_schema()).unwrap();

    let err = manager.create_group("ws/a/g").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let err = manager.create_array("ws/a/b", &array_schema()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let err = manager.create_metadata("ws/m/n", &metadata_schema()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_create_existing_object_fails() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();
    manager.create_group("ws/g").unwrap();

    assert_eq!(
        manager.create_workspace("ws").unwrap_err().kind(),
        ErrorKind::AlreadyExists
    );
    assert_eq!(
        manager.create_array("ws/g", &array_schema()).unwrap_err().kind(),
        ErrorKind::AlreadyExists
    );
    assert_eq!(live_workspaces(&manager).len(), 1);
}

#[test]
fn test_create_adopts_empty_plain_directory() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();
    fs::create_dir(manager.home_dir().join("ws/g")).unwrap();

    manager.create_group("ws/g").unwrap();
    assert_eq!(kind_at(&manager, "ws/g"), Some(ObjectKind::Group));
}

#[test]
fn test_create_in_non_empty_plain_directory_fails() {
    let (_temp, manager) = setup_temp_manager();
    let dir = manager.home_dir().join("busy");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("file.txt"), b"data").unwrap();

    let err = manager.create_workspace("busy").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert!(live_workspaces(&manager).is_empty());
}

#[test]
fn test_invalid_schema_leaves_nothing_behind() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();

    let no_dims = Schema::array("bad").with_attribute(Attribute::fixed("v", 4));
    let err = manager.create_array("ws/bad", &no_dims).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaError);
    assert!(!manager.home_dir().join("ws/bad").exists());

    let err = manager.create_metadata("ws/bad", &array_schema()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaError);
    assert!(!manager.home_dir().join("ws/bad").exists());
}

#[test]
fn test_schema_presence_must_match_kind() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();

    let err = manager.create("ws/a", ObjectKind::Array, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = manager
        .create("ws/g", ObjectKind::Group, Some(&array_schema()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_create_in_parent() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();

    let dir = manager
        .create_in("ws", "a", ObjectKind::Array, Some(&array_schema()))
        .unwrap();
    assert_eq!(dir, manager.home_dir().join("ws/a"));

    assert!(manager.create_in("ws", "x/y", ObjectKind::Group, None).is_err());
    assert!(manager.create_in("ws", "..", ObjectKind::Group, None).is_err());
}

#[test]
fn test_empty_path_is_rejected() {
    let (_temp, manager) = setup_temp_manager();

    let err = manager.create_workspace("").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(err.to_string(), "Invalid directory argument is empty");
}

// =============================================================================
// Schema Tests
// =============================================================================

#[test]
fn test_load_schema() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();
    manager.create_array("ws/a", &array_schema()).unwrap();

    assert_eq!(manager.load_schema("ws/a").unwrap(), array_schema());

    let err = manager.load_schema("ws").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

// =============================================================================
// Clear Tests
// =============================================================================

#[test]
fn test_clear_array_keeps_schema_and_metadata() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();
    manager.create_array("ws/a", &array_schema()).unwrap();
    manager.create_metadata("ws/a/m", &metadata_schema()).unwrap();
    write_points(&manager, "ws/a", &[1, 2, 3]);

    let dir = manager.home_dir().join("ws/a");
    assert_eq!(storage::list_fragments(&dir).unwrap().len(), 1);

    manager.clear("ws/a").unwrap();

    assert!(storage::list_fragments(&dir).unwrap().is_empty());
    assert!(dir.join(SCHEMA_FILE).is_file());
    assert_eq!(kind_at(&manager, "ws/a"), Some(ObjectKind::Array));
    assert_eq!(kind_at(&manager, "ws/a/m"), Some(ObjectKind::Metadata));
    assert_eq!(manager.load_schema("ws/a").unwrap(), array_schema());
}

#[test]
fn test_clear_workspace_removes_children() {
    let (_temp, manager) = setup_temp_manager();
    let ws = manager.create_workspace("ws").unwrap();
    manager.create_group("ws/g").unwrap();
    manager.create_array("ws/g/a", &array_schema()).unwrap();
    fs::write(ws.join("notes.txt"), b"user file").unwrap();

    manager.clear("ws").unwrap();

    assert!(manager.ls("ws").unwrap().is_empty());
    assert_eq!(kind_at(&manager, "ws"), Some(ObjectKind::Workspace));
    assert!(ws.join("notes.txt").exists());
    assert_eq!(live_workspaces(&manager), vec![ws]);
}

#[test]
fn test_clear_missing_object_fails() {
    let (_temp, manager) = setup_temp_manager();
    let err = manager.clear("nothing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_workspace_recursively() {
    let (_temp, manager) = setup_temp_manager();
    let ws = manager.create_workspace("ws").unwrap();
    manager.create_group("ws/g").unwrap();
    manager.create_array("ws/g/a", &array_schema()).unwrap();
    manager.create_metadata("ws/g/a/m", &metadata_schema()).unwrap();
    write_points(&manager, "ws/g/a", &[5]);

    manager.delete("ws").unwrap();

    assert!(!ws.exists());
    assert_eq!(kind_at(&manager, "ws"), None);
    assert!(live_workspaces(&manager).is_empty());
}

#[test]
fn test_delete_group_keeps_catalog() {
    let (_temp, manager) = setup_temp_manager();
    let ws = manager.create_workspace("ws").unwrap();
    manager.create_group("ws/g").unwrap();

    manager.delete("ws/g").unwrap();

    assert_eq!(kind_at(&manager, "ws/g"), None);
    assert_eq!(live_workspaces(&manager), vec![ws]);
}

#[test]
fn test_delete_missing_object_fails() {
    let (_temp, manager) = setup_temp_manager();
    fs::create_dir(manager.home_dir().join("plain")).unwrap();

    let err = manager.delete("plain").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(manager.home_dir().join("plain").exists());
}

// =============================================================================
// Move Tests
// =============================================================================

#[test]
fn test_move_workspace_updates_catalog() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();
    manager.create_array("ws/a", &array_schema()).unwrap();
    write_points(&manager, "ws/a", &[7]);

    manager.move_object("ws", "renamed", false).unwrap();

    assert_eq!(kind_at(&manager, "ws"), None);
    assert_eq!(kind_at(&manager, "renamed"), Some(ObjectKind::Workspace));
    assert_eq!(kind_at(&manager, "renamed/a"), Some(ObjectKind::Array));
    assert_eq!(
        live_workspaces(&manager),
        vec![manager.home_dir().join("renamed")]
    );

    let dir = manager.home_dir().join("renamed/a");
    assert_eq!(storage::list_fragments(&dir).unwrap().len(), 1);
}

#[test]
fn test_move_group_between_parents() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws1").unwrap();
    manager.create_workspace("ws2").unwrap();
    manager.create_group("ws1/g").unwrap();

    manager.move_object("ws1/g", "ws2/g", false).unwrap();

    assert_eq!(kind_at(&manager, "ws1/g"), None);
    assert_eq!(kind_at(&manager, "ws2/g"), Some(ObjectKind::Group));
    assert_eq!(live_workspaces(&manager).len(), 2);
}

#[test]
fn test_move_invalid_path() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();

    let err = manager.move_object("invalid_path", "ws2", false).unwrap_err();
    assert!(matches!(err, TileError::NotFound(_)));
    assert!(err.to_string().starts_with("Invalid path"));
}

#[test]
fn test_move_onto_existing_object_fails_without_force() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws1").unwrap();
    manager.create_workspace("ws2").unwrap();

    let err = manager.move_object("ws1", "ws2", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(kind_at(&manager, "ws1"), Some(ObjectKind::Workspace));
}

#[test]
fn test_move_with_force_replaces_destination() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws1").unwrap();
    manager.create_group("ws1/from_one").unwrap();
    manager.create_workspace("ws2").unwrap();
    manager.create_group("ws2/from_two").unwrap();

    manager.move_object("ws1", "ws2", true).unwrap();

    assert_eq!(kind_at(&manager, "ws1"), None);
    assert_eq!(kind_at(&manager, "ws2/from_one"), Some(ObjectKind::Group));
    assert_eq!(kind_at(&manager, "ws2/from_two"), None);
    assert_eq!(
        live_workspaces(&manager),
        vec![manager.home_dir().join("ws2")]
    );
}

#[test]
fn test_move_into_itself_fails() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();
    manager.create_group("ws/g").unwrap();

    let err = manager.move_object("ws/g", "ws/g/inner", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = manager.move_object("ws/g", "ws", true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(kind_at(&manager, "ws/g"), Some(ObjectKind::Group));
}

#[test]
fn test_move_to_wrong_parent_kind_fails() {
    let (_temp, manager) = setup_temp_manager();
    manager.create_workspace("ws").unwrap();
    manager.create_group("ws/g").unwrap();
    manager.create_array("ws/a", &array_schema()).unwrap();

    let err = manager.move_object("ws/g", "ws/a/g", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let err = manager.move_object("ws/g", "outside", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(kind_at(&manager, "ws/g"), Some(ObjectKind::Group));
}

#[test]
fn test_move_workspace_below_another_workspace_fails() {
    let (_temp, manager) = setup_temp_manager();
    let outer = manager.create_workspace("outer").unwrap();
    let inner = manager.create_workspace("inner").unwrap();
    fs::create_dir(outer.join("dir")).unwrap();

    let err = manager.move_object("inner", "outer/dir/inner", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(kind_at(&manager, "inner"), Some(ObjectKind::Workspace));

    manager.move_object("outer", "renamed", false).unwrap();
    let renamed = manager.home_dir().join("renamed");
    let mut expected = vec![inner, renamed];
    expected.sort();
    let mut live = live_workspaces(&manager);
    live.sort();
    assert_eq!(live, expected);
}

// =============================================================================
// Listing Tests
// =============================================================================

#[test]
fn test_ls_lists_objects_sorted() {
    let (_temp, manager) = setup_temp_manager();
    let ws = manager.create_workspace("ws").unwrap();
    manager.create_metadata("ws/m", &metadata_schema()).unwrap();
    manager.create_group("ws/b").unwrap();
    manager.create_array("ws/a", &array_schema()).unwrap();
    fs::create_dir(ws.join("plain")).unwrap();

    let listing = manager.ls("ws").unwrap();
    assert_eq!(
        listing,
        vec![
            ("a".to_string(), ObjectKind::Array),
            ("b".to_string(), ObjectKind::Group),
            ("m".to_string(), ObjectKind::Metadata),
        ]
    );
}

#[test]
fn test_ls_of_missing_parent_fails() {
    let (_temp, manager) = setup_temp_manager();
    assert_eq!(manager.ls("nope").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_workspaces_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let (a, b) = {
        let manager = StorageManager::init_path(temp.path()).unwrap();
        let a = manager.create_workspace("a").unwrap();
        let b = manager.create_workspace("b").unwrap();
        manager.create_workspace("c").unwrap();
        manager.delete("c").unwrap();
        (a, b)
    };

    let manager = StorageManager::init_path(temp.path()).unwrap();
    assert_eq!(manager.ls_workspaces().unwrap(), vec![a, b]);
    assert_eq!(
        manager.classify("a").unwrap(),
        Classification::Object(ObjectKind::Workspace)
    );
}
