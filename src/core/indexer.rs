//! Index store updates.
//!
//! The index is the metadata service's SQLite database. Two schema
//! generations exist:
//! - Legacy: `galleries.path` holds the full path of the item
//! - Refactor: `folders` and `files` rows joined through `gallery_files`

use crate::models::template::RenameIntent;
use crate::services::graphql::DB_VERSION_FILE_REFACTOR;
use crate::Result;
use chrono::{Local, SecondsFormat};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Layout of the index database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    Legacy,
    Refactor,
}

impl SchemaGeneration {
    /// Generation matching a reported schema version.
    pub fn from_version(version: u32) -> Self {
        if version >= DB_VERSION_FILE_REFACTOR {
            SchemaGeneration::Refactor
        } else {
            SchemaGeneration::Legacy
        }
    }
}

/// Store that records where the files of an item live.
pub trait IndexStore {
    /// Record the new location of one file of an item.
    fn update_path(&mut self, item_id: &str, intent: &RenameIntent) -> Result<()>;
}

/// Index backed by the SQLite database.
pub struct SqliteIndex {
    conn: Connection,
    schema: SchemaGeneration,
}

impl SqliteIndex {
    /// Open the database at `path`.
    pub fn open(path: &Path, schema: SchemaGeneration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        tracing::debug!("[SQLITE] Connected to {}", path.display());
        Ok(Self::from_connection(conn, schema))
    }

    pub fn from_connection(conn: Connection, schema: SchemaGeneration) -> Self {
        Self { conn, schema }
    }

    fn update_legacy(&mut self, item_id: i64, intent: &RenameIntent) -> Result<()> {
        let final_path = intent.final_path();
        let updated = self.conn.execute(
            "UPDATE galleries SET path = ?1 WHERE id = ?2",
            params![final_path.to_string_lossy().to_string(), item_id],
        )?;
        if updated == 0 {
            return Err(crate::Error::Database(format!("no gallery row with id {}", item_id)));
        }
        Ok(())
    }

    fn update_refactor(&mut self, item_id: i64, intent: &RenameIntent) -> Result<()> {
        let mod_time = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        let tx = self.conn.transaction()?;

        let current_dir = intent.current_directory().to_string_lossy().to_string();
        let old_folder_id = folder_id(&tx, &current_dir)?.ok_or_else(|| {
            crate::Error::Database(format!("folder {} is not in the index", current_dir))
        })?;

        let target_folder_id = match folder_id(&tx, &intent.final_directory.to_string_lossy())? {
            Some(id) => id,
            None => create_folder(&tx, &intent.final_directory, &mod_time)?,
        };

        let file_id: Option<i64> = tx
            .query_row(
                "SELECT f.id FROM gallery_files gf
                 JOIN files f ON f.id = gf.file_id
                 WHERE gf.gallery_id = ?1 AND f.parent_folder_id = ?2 AND f.basename = ?3",
                params![item_id, old_folder_id, intent.current_filename()],
                |row| row.get(0),
            )
            .optional()?;
        let file_id = file_id.ok_or_else(|| {
            crate::Error::Database(format!(
                "failed to find the file row of {}",
                intent.current_path.display()
            ))
        })?;

        tx.execute(
            "UPDATE files SET basename = ?1, parent_folder_id = ?2, updated_at = ?3 WHERE id = ?4",
            params![intent.final_filename, target_folder_id, mod_time, file_id],
        )?;
        tx.commit()?;
        Ok(())
    }
}

impl IndexStore for SqliteIndex {
    fn update_path(&mut self, item_id: &str, intent: &RenameIntent) -> Result<()> {
        let id: i64 = item_id
            .parse()
            .map_err(|_| crate::Error::Database(format!("invalid item id '{}'", item_id)))?;
        match self.schema {
            SchemaGeneration::Legacy => self.update_legacy(id, intent),
            SchemaGeneration::Refactor => self.update_refactor(id, intent),
        }
    }
}

fn folder_id(tx: &Transaction<'_>, path: &str) -> Result<Option<i64>> {
    Ok(tx
        .query_row("SELECT id FROM folders WHERE path = ?1", params![path], |row| row.get(0))
        .optional()?)
}

/// Insert a folder row under the nearest ancestor already indexed.
fn create_folder(tx: &Transaction<'_>, directory: &Path, mod_time: &str) -> Result<i64> {
    let mut parent_id = None;
    for ancestor in directory.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        if let Some(id) = folder_id(tx, &ancestor.to_string_lossy())? {
            parent_id = Some(id);
            break;
        }
    }
    let parent_id = parent_id.ok_or_else(|| {
        crate::Error::Database(format!(
            "You need to setup a library with the new location ({}) and scan at least 1 file",
            directory.display()
        ))
    })?;

    let new_id: i64 = tx.query_row("SELECT COALESCE(MAX(id), 0) + 1 FROM folders", [], |row| {
        row.get(0)
    })?;
    tx.execute(
        "INSERT INTO folders (id, path, parent_folder_id, mod_time, created_at, updated_at, zip_file_id)
         VALUES (?1, ?2, ?3, ?4, ?4, ?4, NULL)",
        params![new_id, directory.to_string_lossy().to_string(), parent_id, mod_time],
    )?;
    tracing::debug!("[SQLITE] Created folder row {} for {}", new_id, directory.display());
    Ok(new_id)
}
