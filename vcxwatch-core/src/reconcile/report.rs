//! Per-run deletion summaries

use super::deleter::DeletionOutcome;
use chrono::Local;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths grouped by deletion outcome. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub label: String,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub dry_run: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
}

impl DeletionReport {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), ..Default::default() }
    }

    pub fn record(&mut self, path: &Path, outcome: DeletionOutcome) {
        let bucket = match outcome {
            DeletionOutcome::Deleted => &mut self.deleted,
            DeletionOutcome::Failed => &mut self.failed,
            DeletionOutcome::DryRun => &mut self.dry_run,
        };
        bucket.push(path.to_path_buf());
    }

    pub fn record_directory(&mut self, path: &Path, outcome: DeletionOutcome) {
        match outcome {
            DeletionOutcome::Deleted => self.removed_dirs.push(path.to_path_buf()),
            other => self.record(path, other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty()
            && self.failed.is_empty()
            && self.dry_run.is_empty()
            && self.removed_dirs.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "[{}] deleted {}, failed {}, dry-run {}, empty directories removed {}",
            self.label,
            self.deleted.len(),
            self.failed.len(),
            self.dry_run.len(),
            self.removed_dirs.len()
        );
        for (title, paths) in [
            ("deleted", &self.deleted),
            ("failed", &self.failed),
            ("dry-run", &self.dry_run),
            ("directories", &self.removed_dirs),
        ] {
            if paths.is_empty() {
                continue;
            }
            let _ = write!(out, "\n - {title}:");
            for path in paths {
                let _ = write!(out, "\n    {}", path.display());
            }
        }
        out
    }

    pub fn log(&self) {
        info!("{}", self.summary());
    }

    /// Append the summary, under a timestamp header, to `file`
    pub fn append_to(&self, file: &Path) -> std::io::Result<()> {
        if let Some(parent) = file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut handle = std::fs::OpenOptions::new().create(true).append(true).open(file)?;
        writeln!(handle, "=== {} ===", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(handle, "{}", self.summary())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_summary_counts_and_lists() {
        let mut report = DeletionReport::new("post-generation");
        report.record(Path::new("/p/a.cpp"), DeletionOutcome::Deleted);
        report.record(Path::new("/p/b.cpp"), DeletionOutcome::Failed);
        report.record_directory(Path::new("/p/empty"), DeletionOutcome::Deleted);

        let summary = report.summary();
        assert!(summary.starts_with(
            "[post-generation] deleted 1, failed 1, dry-run 0, empty directories removed 1"
        ));
        assert!(summary.contains("/p/b.cpp"));
        assert!(!report.is_empty());
        assert!(DeletionReport::new("x").is_empty());
    }

    #[test]
    fn test_append_to_file_accumulates() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("logs").join("report.log");
        let mut report = DeletionReport::new("pre-generation");
        report.record(Path::new("/p/a.cpp"), DeletionOutcome::DryRun);

        report.append_to(&file).unwrap();
        report.append_to(&file).unwrap();

        let content = std::fs::read_to_string(&file).unwrap();
        assert_eq!(content.matches("[pre-generation]").count(), 2);
    }
}
