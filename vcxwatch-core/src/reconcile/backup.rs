//! Backup copies taken before a file is deleted

use super::{ReconcileError, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

/// Copies files into a flat backup directory as `<name>.<YYYYmmdd_HHMMSS>.bak`
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self { backup_dir: backup_dir.into() }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Copy `file` into the backup directory and return the copy's path
    pub fn backup(&self, file: &Path) -> Result<PathBuf> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let target = self.backup_dir.join(format!("{name}.{stamp}.bak"));

        let err = |source| ReconcileError::Backup { path: file.to_path_buf(), source };
        std::fs::create_dir_all(&self.backup_dir).map_err(err)?;
        std::fs::copy(file, &target).map_err(err)?;

        info!("Backed up {} to {}", file.display(), target.display());
        Ok(target)
    }
}
