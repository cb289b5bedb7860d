//! Transactional rename executor.
//!
//! Moves one file and records the move in the index as a single unit:
//! 1. Move the file, clearing file locks when allowed
//! 2. Append the move to the audit log, undoing the move if that fails
//! 3. Update the index, undoing the move if that fails
//! 4. Move sidecar files, then remove the emptied source directory

use crate::core::indexer::IndexStore;
use crate::models::config::Config;
use crate::models::template::RenameIntent;
use crate::models::transaction::{AuditEntry, RenameTransaction, TransactionState};
use crate::services::lock::{is_lock_error, FileHolder, FileLockInspector};
use crate::utils::fs;
use crate::Result;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

/// Time given to a holder to exit after being asked to terminate.
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(10);

type MoveFn<'a> = Box<dyn Fn(&Path, &Path) -> io::Result<()> + 'a>;

/// Performs file moves together with their index update.
pub struct TransactionalRenamer<'a> {
    config: &'a Config,
    inspector: &'a dyn FileLockInspector,
    mover: MoveFn<'a>,
}

impl<'a> TransactionalRenamer<'a> {
    pub fn new(config: &'a Config, inspector: &'a dyn FileLockInspector) -> Self {
        Self {
            config,
            inspector,
            mover: Box::new(fs::move_file),
        }
    }

    /// Replace the function used to move files.
    pub fn with_mover<F>(mut self, mover: F) -> Self
    where
        F: Fn(&Path, &Path) -> io::Result<()> + 'a,
    {
        self.mover = Box::new(mover);
        self
    }

    /// Move the file described by `intent` and record it in `index`.
    pub fn commit(
        &self,
        item_id: &str,
        intent: &RenameIntent,
        index: &mut dyn IndexStore,
    ) -> Result<RenameTransaction> {
        let final_path = intent.final_path();
        let (from, to) = (intent.current_path.as_path(), final_path.as_path());
        let mut tx = RenameTransaction::new(item_id, from.to_path_buf(), to.to_path_buf());

        if !from.is_file() {
            tracing::warn!("[OS] File doesn't exist in your Disk/Drive ({})", from.display());
            return Err(crate::Error::FileMissing(from.display().to_string()));
        }

        self.move_with_recovery(from, to)?;
        tx.advance(TransactionState::Moved);
        tracing::info!("[OS] File Renamed! ({} -> {})", from.display(), to.display());

        if let Err(e) = self.append_audit(tx.audit_entry()) {
            tracing::error!("Restoring the original path, error writing the logfile: {}", e);
            tx.advance(TransactionState::RollbackAttempted);
            let result = (self.mover)(to, from);
            tx.advance(TransactionState::Failed);
            if let Err(back) = result {
                tracing::error!(
                    "[CRITICAL] {} is at {} but the index still points to {}: {}",
                    tx.item_id,
                    to.display(),
                    from.display(),
                    back
                );
                return Err(crate::Error::RollbackFailure {
                    path: to.display().to_string(),
                    reason: format!("{} (logfile error: {})", back, e),
                });
            }
            return Err(crate::Error::AuditLog(e.to_string()));
        }

        if let Err(e) = index.update_path(item_id, intent) {
            tracing::error!("Error when trying to update the database ({}), revert the move...", e);
            tx.advance(TransactionState::RollbackAttempted);
            return Err(self.roll_back(&mut tx, e));
        }
        tx.advance(TransactionState::IndexUpdated);

        if intent.moves_sidecars() {
            self.move_sidecars(item_id, intent);
        }
        if self.config.path.remove_empty_folder {
            self.remove_empty_source(intent);
        }
        Ok(tx)
    }

    fn roll_back(&self, tx: &mut RenameTransaction, cause: crate::Error) -> crate::Error {
        match (self.mover)(tx.to.as_path(), tx.from.as_path()) {
            Ok(()) => {
                tx.advance(TransactionState::Failed);
                tracing::info!("[OS] Move reverted ({} -> {})", tx.to.display(), tx.from.display());
                let reverted = AuditEntry {
                    item_id: &tx.item_id,
                    old: &tx.to,
                    new: &tx.from,
                };
                if let Err(e) = self.append_audit(reverted) {
                    tracing::warn!("Failed to log the reverted move: {}", e);
                }
                crate::Error::Database(cause.to_string())
            }
            Err(e) => {
                tx.advance(TransactionState::Failed);
                tracing::error!(
                    "[CRITICAL] {} is at {} but the index still points to {}: {}",
                    tx.item_id,
                    tx.to.display(),
                    tx.from.display(),
                    e
                );
                crate::Error::RollbackFailure {
                    path: tx.to.display().to_string(),
                    reason: format!("{} (index error: {})", e, cause),
                }
            }
        }
    }

    fn move_with_recovery(&self, from: &Path, to: &Path) -> Result<()> {
        let err = match (self.mover)(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if !is_lock_error(&err) {
            tracing::error!("Something prevents renaming the file. {}", err);
            return Err(crate::Error::Move(err.to_string()));
        }

        tracing::warn!("A process is using this file, trying to find it ...");
        let holders = self.inspector.holders(from);
        if holders.is_empty() {
            return Err(crate::Error::LockedFile(format!("{} ({})", from.display(), err)));
        }
        let targets: &[FileHolder] = if self.config.process.get_all {
            &holders
        } else {
            &holders[..1]
        };
        for holder in targets {
            tracing::debug!("Process that uses this file: {} ({})", holder.name, holder.pid);
        }

        if !self.config.process.kill_attached {
            tracing::error!("A process prevents renaming the file.");
            return Err(crate::Error::LockedFile(from.display().to_string()));
        }
        for holder in targets {
            if let Err(e) = self.inspector.terminate(holder, TERMINATE_TIMEOUT) {
                tracing::warn!("Failed to terminate {} ({}): {}", holder.name, holder.pid, e);
            }
        }

        (self.mover)(from, to).map_err(|e| {
            tracing::error!("Something still prevents renaming the file. {}", e);
            crate::Error::LockedFile(format!("{} ({})", from.display(), e))
        })
    }

    fn append_audit(&self, entry: AuditEntry<'_>) -> io::Result<()> {
        let Some(ref log_file) = self.config.general.log_file else {
            return Ok(());
        };
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        writeln!(file, "{}", entry)
    }

    fn remove_empty_source(&self, intent: &RenameIntent) {
        let dir = intent.current_directory();
        if dir == intent.final_directory.as_path() || dir.as_os_str().is_empty() {
            return;
        }
        match fs::remove_if_empty(dir) {
            Ok(true) => tracing::info!("Removing empty folder ({})", dir.display()),
            Ok(false) => {}
            Err(e) => tracing::warn!("Fail to delete empty folder {} - {}", dir.display(), e),
        }
    }

    /// Move same-basename files along. Failures are logged and skipped.
    fn move_sidecars(&self, item_id: &str, intent: &RenameIntent) {
        let final_path = intent.final_path();
        for ext in &self.config.path.associated_extensions {
            let old = fs::sidecar_path(&intent.current_path, ext);
            let new = fs::sidecar_path(&final_path, ext);
            if !old.is_file() {
                continue;
            }
            if let Err(e) = (self.mover)(old.as_path(), new.as_path()) {
                tracing::error!("Something prevents renaming this file '{}' - err: {}", old.display(), e);
                continue;
            }
            tracing::info!("[OS] Associate file renamed ({})", new.display());

            let entry = AuditEntry {
                item_id,
                old: &old,
                new: &new,
            };
            if let Err(e) = self.append_audit(entry) {
                tracing::error!("Restoring the original name, error writing the logfile: {}", e);
                if let Err(back) = (self.mover)(new.as_path(), old.as_path()) {
                    tracing::error!("Failed to restore {}: {}", old.display(), back);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lock::NoInspector;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct RecordingIndex {
        fail: bool,
        updates: Vec<(String, PathBuf)>,
    }

    impl IndexStore for RecordingIndex {
        fn update_path(&mut self, item_id: &str, intent: &RenameIntent) -> Result<()> {
            if self.fail {
                return Err(crate::Error::Database("locked".to_string()));
            }
            self.updates.push((item_id.to_string(), intent.final_path()));
            Ok(())
        }
    }

    fn intent(dir: &Path, from: &str, to_dir: &str, to: &str) -> RenameIntent {
        RenameIntent {
            current_path: dir.join(from),
            final_directory: dir.join(to_dir),
            final_filename: to.to_string(),
            file_index: 0,
        }
    }

    #[test]
    fn test_commit_moves_and_indexes() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("old.zip"), "x").unwrap();
        let mut config = Config::default();
        config.general.log_file = Some(temp_dir.path().join("rename.log"));

        let inspector = NoInspector;
        let renamer = TransactionalRenamer::new(&config, &inspector);
        let mut index = RecordingIndex {
            fail: false,
            updates: Vec::new(),
        };
        let intent = intent(temp_dir.path(), "old.zip", "Sunny", "new.zip");

        let tx = renamer.commit("5", &intent, &mut index).unwrap();
        assert!(tx.is_committed());
        assert!(intent.final_path().exists());
        assert!(!intent.current_path.exists());
        assert_eq!(index.updates, vec![("5".to_string(), intent.final_path())]);

        let log = std::fs::read_to_string(temp_dir.path().join("rename.log")).unwrap();
        assert_eq!(
            log,
            format!("5|{}|{}\n", intent.current_path.display(), intent.final_path().display())
        );
    }

    #[test]
    fn test_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::default();
        let inspector = NoInspector;
        let renamer = TransactionalRenamer::new(&config, &inspector);
        let mut index = RecordingIndex {
            fail: false,
            updates: Vec::new(),
        };
        let intent = intent(temp_dir.path(), "gone.zip", ".", "new.zip");
        let result = renamer.commit("5", &intent, &mut index);
        assert!(matches!(result, Err(crate::Error::FileMissing(_))));
        assert!(index.updates.is_empty());
    }

    #[test]
    fn test_index_failure_restores_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("old.zip"), "x").unwrap();
        let config = Config::default();
        let inspector = NoInspector;
        let renamer = TransactionalRenamer::new(&config, &inspector);
        let mut index = RecordingIndex {
            fail: true,
            updates: Vec::new(),
        };
        let intent = intent(temp_dir.path(), "old.zip", "Sunny", "new.zip");

        let result = renamer.commit("5", &intent, &mut index);
        assert!(matches!(result, Err(crate::Error::Database(_))));
        assert!(intent.current_path.exists());
        assert!(!intent.final_path().exists());
    }

    #[test]
    fn test_failed_rollback_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("old.zip"), "x").unwrap();
        let config = Config::default();
        let inspector = NoInspector;
        let calls = std::cell::Cell::new(0);
        let renamer = TransactionalRenamer::new(&config, &inspector).with_mover(|from, to| {
            calls.set(calls.get() + 1);
            if calls.get() > 1 {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            fs::move_file(from, to)
        });
        let mut index = RecordingIndex {
            fail: true,
            updates: Vec::new(),
        };
        let intent = intent(temp_dir.path(), "old.zip", "Sunny", "new.zip");

        let result = renamer.commit("5", &intent, &mut index);
        assert!(matches!(result, Err(crate::Error::RollbackFailure { .. })));
        assert!(intent.final_path().exists());
    }

    #[test]
    fn test_sidecars_follow_first_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("old.zip"), "x").unwrap();
        std::fs::write(temp_dir.path().join("old.srt"), "s").unwrap();
        let mut config = Config::default();
        config.path.associated_extensions = vec!["srt".to_string(), "nfo".to_string()];
        let inspector = NoInspector;
        let renamer = TransactionalRenamer::new(&config, &inspector);
        let mut index = RecordingIndex {
            fail: false,
            updates: Vec::new(),
        };
        let intent = intent(temp_dir.path(), "old.zip", "Sunny", "new.zip");

        renamer.commit("5", &intent, &mut index).unwrap();
        assert!(temp_dir.path().join("Sunny/new.srt").exists());
        assert!(!temp_dir.path().join("old.srt").exists());
    }

    #[test]
    fn test_remove_empty_source_folder() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("inbox")).unwrap();
        std::fs::write(temp_dir.path().join("inbox/old.zip"), "x").unwrap();
        let mut config = Config::default();
        config.path.remove_empty_folder = true;
        let inspector = NoInspector;
        let renamer = TransactionalRenamer::new(&config, &inspector);
        let mut index = RecordingIndex {
            fail: false,
            updates: Vec::new(),
        };
        let intent = intent(temp_dir.path(), "inbox/old.zip", "Sunny", "new.zip");

        renamer.commit("5", &intent, &mut index).unwrap();
        assert!(!temp_dir.path().join("inbox").exists());
    }

    #[test]
    fn test_sidecars_moved_before_removing_source_folder() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("inbox")).unwrap();
        std::fs::write(temp_dir.path().join("inbox/old.zip"), "x").unwrap();
        std::fs::write(temp_dir.path().join("inbox/old.srt"), "s").unwrap();
        let mut config = Config::default();
        config.path.remove_empty_folder = true;
        config.path.associated_extensions = vec!["srt".to_string()];
        let inspector = NoInspector;
        let renamer = TransactionalRenamer::new(&config, &inspector);
        let mut index = RecordingIndex {
            fail: false,
            updates: Vec::new(),
        };
        let intent = intent(temp_dir.path(), "inbox/old.zip", "Sunny", "new.zip");

        renamer.commit("5", &intent, &mut index).unwrap();
        assert!(temp_dir.path().join("Sunny/new.srt").exists());
        assert!(!temp_dir.path().join("inbox").exists());
    }

    #[test]
    fn test_audit_failure_restores_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("old.zip"), "x").unwrap();
        let mut config = Config::default();
        // parent directory doesn't exist, so the log can't be opened
        config.general.log_file = Some(temp_dir.path().join("missing/rename.log"));
        let inspector = NoInspector;
        let renamer = TransactionalRenamer::new(&config, &inspector);
        let mut index = RecordingIndex {
            fail: false,
            updates: Vec::new(),
        };
        let intent = intent(temp_dir.path(), "old.zip", "Sunny", "new.zip");

        let result = renamer.commit("5", &intent, &mut index);
        assert!(matches!(result, Err(crate::Error::AuditLog(_))));
        assert!(intent.current_path.exists());
        assert!(!intent.final_path().exists());
        assert!(index.updates.is_empty());
    }

    #[test]
    fn test_audit_failure_with_failed_restore() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("old.zip"), "x").unwrap();
        let mut config = Config::default();
        config.general.log_file = Some(temp_dir.path().join("missing/rename.log"));
        let inspector = NoInspector;
        let calls = std::cell::Cell::new(0);
        let renamer = TransactionalRenamer::new(&config, &inspector).with_mover(|from, to| {
            calls.set(calls.get() + 1);
            if calls.get() > 1 {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            fs::move_file(from, to)
        });
        let mut index = RecordingIndex {
            fail: false,
            updates: Vec::new(),
        };
        let intent = intent(temp_dir.path(), "old.zip", "Sunny", "new.zip");

        let result = renamer.commit("5", &intent, &mut index);
        assert!(matches!(result, Err(crate::Error::RollbackFailure { .. })));
        assert!(intent.final_path().exists());
        assert!(index.updates.is_empty());
    }
}
