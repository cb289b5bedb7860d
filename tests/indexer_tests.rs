//! Integration tests for the SQLite index store.
//!
//! Tests cover:
//! - Legacy schema (single path column)
//! - Refactor schema (folders/files joined through gallery_files)
//! - Folder creation under the nearest indexed ancestor
//! - Failures leaving the database untouched

use media_renamer::core::indexer::{IndexStore, SchemaGeneration, SqliteIndex};
use media_renamer::models::template::RenameIntent;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ========== TEST FIXTURES ==========

fn legacy_db(dir: &Path) -> PathBuf {
    let path = dir.join("legacy.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE galleries (id INTEGER PRIMARY KEY, path TEXT);
         INSERT INTO galleries (id, path) VALUES (7, '/lib/in/old.zip');",
    )
    .unwrap();
    path
}

fn refactor_db(dir: &Path) -> PathBuf {
    let path = dir.join("refactor.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE folders (
             id INTEGER PRIMARY KEY,
             path TEXT NOT NULL UNIQUE,
             parent_folder_id INTEGER,
             mod_time TEXT,
             created_at TEXT,
             updated_at TEXT,
             zip_file_id INTEGER
         );
         CREATE TABLE files (
             id INTEGER PRIMARY KEY,
             basename TEXT NOT NULL,
             parent_folder_id INTEGER NOT NULL,
             updated_at TEXT
         );
         CREATE TABLE gallery_files (gallery_id INTEGER, file_id INTEGER);
         INSERT INTO folders (id, path, parent_folder_id) VALUES (1, '/lib', NULL);
         INSERT INTO folders (id, path, parent_folder_id) VALUES (2, '/lib/in', 1);
         INSERT INTO files (id, basename, parent_folder_id) VALUES (10, 'old.zip', 2);
         INSERT INTO files (id, basename, parent_folder_id) VALUES (11, 'other.zip', 2);
         INSERT INTO gallery_files (gallery_id, file_id) VALUES (7, 10);
         INSERT INTO gallery_files (gallery_id, file_id) VALUES (7, 11);",
    )
    .unwrap();
    path
}

fn intent(directory: &str, filename: &str) -> RenameIntent {
    RenameIntent {
        current_path: PathBuf::from("/lib/in/old.zip"),
        final_directory: PathBuf::from(directory),
        final_filename: filename.to_string(),
        file_index: 0,
    }
}

fn file_row(db: &Path, id: i64) -> (String, i64) {
    let conn = Connection::open(db).unwrap();
    conn.query_row(
        "SELECT basename, parent_folder_id FROM files WHERE id = ?1",
        [id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .unwrap()
}

// ========== LEGACY SCHEMA ==========

#[test]
fn test_legacy_updates_path() {
    let temp_dir = TempDir::new().unwrap();
    let db = legacy_db(temp_dir.path());

    let mut index = SqliteIndex::open(&db, SchemaGeneration::Legacy).unwrap();
    index.update_path("7", &intent("/lib/Sunny", "new.zip")).unwrap();

    let conn = Connection::open(&db).unwrap();
    let path: String = conn
        .query_row("SELECT path FROM galleries WHERE id = 7", [], |row| row.get(0))
        .unwrap();
    assert_eq!(path, PathBuf::from("/lib/Sunny/new.zip").to_string_lossy());
}

#[test]
fn test_legacy_unknown_item() {
    let temp_dir = TempDir::new().unwrap();
    let db = legacy_db(temp_dir.path());

    let mut index = SqliteIndex::open(&db, SchemaGeneration::Legacy).unwrap();
    let result = index.update_path("99", &intent("/lib/Sunny", "new.zip"));
    assert!(matches!(result, Err(media_renamer::Error::Database(_))));

    let result = index.update_path("not-a-number", &intent("/lib/Sunny", "new.zip"));
    assert!(matches!(result, Err(media_renamer::Error::Database(_))));
}

// ========== REFACTOR SCHEMA ==========

#[test]
fn test_refactor_rename_in_place() {
    let temp_dir = TempDir::new().unwrap();
    let db = refactor_db(temp_dir.path());

    let mut index = SqliteIndex::open(&db, SchemaGeneration::Refactor).unwrap();
    index.update_path("7", &intent("/lib/in", "new.zip")).unwrap();

    assert_eq!(file_row(&db, 10), ("new.zip".to_string(), 2));
    // the other file of the item is untouched
    assert_eq!(file_row(&db, 11), ("other.zip".to_string(), 2));
}

#[test]
fn test_refactor_existing_folder() {
    let temp_dir = TempDir::new().unwrap();
    let db = refactor_db(temp_dir.path());

    let mut index = SqliteIndex::open(&db, SchemaGeneration::Refactor).unwrap();
    index.update_path("7", &intent("/lib", "new.zip")).unwrap();

    assert_eq!(file_row(&db, 10), ("new.zip".to_string(), 1));
}

#[test]
fn test_refactor_creates_folder_under_ancestor() {
    let temp_dir = TempDir::new().unwrap();
    let db = refactor_db(temp_dir.path());

    let mut index = SqliteIndex::open(&db, SchemaGeneration::Refactor).unwrap();
    index
        .update_path("7", &intent("/lib/Network/Sunny", "new.zip"))
        .unwrap();

    let conn = Connection::open(&db).unwrap();
    let (id, parent, mod_time): (i64, i64, String) = conn
        .query_row(
            "SELECT id, parent_folder_id, mod_time FROM folders WHERE path = '/lib/Network/Sunny'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(id, 3);
    assert_eq!(parent, 1);
    assert!(chrono::DateTime::parse_from_rfc3339(&mod_time).is_ok());
    assert_eq!(file_row(&db, 10), ("new.zip".to_string(), 3));
}

#[test]
fn test_refactor_no_library_for_destination() {
    let temp_dir = TempDir::new().unwrap();
    let db = refactor_db(temp_dir.path());

    let mut index = SqliteIndex::open(&db, SchemaGeneration::Refactor).unwrap();
    let result = index.update_path("7", &intent("/elsewhere/Sunny", "new.zip"));
    assert!(matches!(result, Err(media_renamer::Error::Database(_))));

    assert_eq!(file_row(&db, 10), ("old.zip".to_string(), 2));
}

#[test]
fn test_refactor_missing_file_row_rolls_back_folder() {
    let temp_dir = TempDir::new().unwrap();
    let db = refactor_db(temp_dir.path());

    let mut index = SqliteIndex::open(&db, SchemaGeneration::Refactor).unwrap();
    // item 8 has no file rows
    let result = index.update_path("8", &intent("/lib/New", "new.zip"));
    assert!(matches!(result, Err(media_renamer::Error::Database(_))));

    let conn = Connection::open(&db).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM folders WHERE path = '/lib/New'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}
