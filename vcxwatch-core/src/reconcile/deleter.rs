//! File and directory removal

use super::backup::BackupManager;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, info, warn};

/// Result of one deletion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    Failed,
    /// Dry-run mode: the deletion was reported but the filesystem was not touched
    DryRun,
}

/// Removes files the project no longer references
pub trait Deleter: Send + Sync {
    fn delete(&self, path: &Path) -> DeletionOutcome;

    /// Remove an empty directory. A directory that is already gone counts as deleted.
    fn delete_directory(&self, path: &Path) -> DeletionOutcome;
}

/// Deletes directly on the local filesystem, optionally backing files up first
#[derive(Debug, Clone, Default)]
pub struct FsDeleter {
    dry_run: bool,
    backup: Option<BackupManager>,
}

impl FsDeleter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run, backup: None }
    }

    pub fn with_backup(mut self, backup: BackupManager) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

impl Deleter for FsDeleter {
    fn delete(&self, path: &Path) -> DeletionOutcome {
        if !path.is_file() {
            warn!("File to delete does not exist: {}", path.display());
            return DeletionOutcome::Failed;
        }

        if self.dry_run {
            info!("[dry-run] Would delete {}", path.display());
            return DeletionOutcome::DryRun;
        }

        if let Some(backup) = &self.backup {
            if let Err(e) = backup.backup(path) {
                warn!("Skipping deletion, backup failed: {}", e);
                return DeletionOutcome::Failed;
            }
        }

        match std::fs::remove_file(path) {
            Ok(()) => {
                info!("Deleted {}", path.display());
                DeletionOutcome::Deleted
            }
            Err(e) => {
                error!("Failed to delete {}: {}", path.display(), e);
                DeletionOutcome::Failed
            }
        }
    }

    fn delete_directory(&self, path: &Path) -> DeletionOutcome {
        if self.dry_run {
            info!("[dry-run] Would remove empty directory {}", path.display());
            return DeletionOutcome::DryRun;
        }

        match std::fs::remove_dir(path) {
            Ok(()) => {
                info!("Removed empty directory {}", path.display());
                DeletionOutcome::Deleted
            }
            Err(e) if e.kind() == ErrorKind::NotFound => DeletionOutcome::Deleted,
            Err(e) => {
                warn!("Failed to remove directory {}: {}", path.display(), e);
                DeletionOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.cpp");
        std::fs::write(&file, "").unwrap();

        assert_eq!(FsDeleter::new(false).delete(&file), DeletionOutcome::Deleted);
        assert!(!file.exists());
    }

    #[test]
    fn test_dry_run_leaves_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.cpp");
        std::fs::write(&file, "").unwrap();

        let deleter = FsDeleter::new(true);
        assert_eq!(deleter.delete(&file), DeletionOutcome::DryRun);
        assert_eq!(deleter.delete_directory(dir.path()), DeletionOutcome::DryRun);
        assert!(file.exists());
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("x.cpp");
        assert_eq!(FsDeleter::new(false).delete(&missing), DeletionOutcome::Failed);
    }

    #[test]
    fn test_delete_with_backup() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.cpp");
        std::fs::write(&file, "body").unwrap();
        let backup_dir = dir.path().join("backup");

        let deleter = FsDeleter::new(false).with_backup(BackupManager::new(&backup_dir));
        assert_eq!(deleter.delete(&file), DeletionOutcome::Deleted);

        assert!(!file.exists());
        assert_eq!(std::fs::read_dir(&backup_dir).unwrap().count(), 1);
    }

    #[test]
    fn test_directory_removal() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty");
        let full = dir.path().join("full");
        std::fs::create_dir(&empty).unwrap();
        std::fs::create_dir(&full).unwrap();
        std::fs::write(full.join("keep.h"), "").unwrap();

        let deleter = FsDeleter::new(false);
        assert_eq!(deleter.delete_directory(&empty), DeletionOutcome::Deleted);
        assert_eq!(deleter.delete_directory(&empty), DeletionOutcome::Deleted);
        assert_eq!(deleter.delete_directory(&full), DeletionOutcome::Failed);
        assert!(full.exists());
    }
}
