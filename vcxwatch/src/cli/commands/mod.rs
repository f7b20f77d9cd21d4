//! Command handlers

pub mod check;
pub mod init;
pub mod orphans;
pub mod reconcile;
pub mod watch;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use vcxwatch_core::config::DEFAULT_CONFIG_FILE;
use vcxwatch_core::reconcile::{
    BackupManager, DiffOutcome, FsDeleter, Generation, Orchestrator, ReferenceCache, RunOutcome,
    RunReport, VcxprojReader,
};
use vcxwatch_core::Config;

pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load the configuration without validating it
pub fn read_config(path: Option<&Path>, dry_run: bool) -> Result<Config> {
    let path = config_path(path);
    let mut config = Config::load(&path).with_context(|| {
        format!("Failed to load configuration (run `vcxwatch init` to create {})", path.display())
    })?;
    if dry_run {
        config.dry_run = true;
    }
    debug!("Configuration: {:?}", config);
    Ok(config)
}

/// Load and validate; every problem is fatal
pub fn load_config(path: Option<&Path>, dry_run: bool) -> Result<Config> {
    let config = read_config(path, dry_run)?;
    config.validate()?;
    if config.dry_run {
        info!("Dry-run mode: nothing will be deleted");
    }
    Ok(config)
}

pub fn build_orchestrator(config: &Config) -> Result<Arc<Orchestrator>> {
    let generator = config.command_generator().context("generator.program is not set")?;

    let mut deleter = FsDeleter::new(config.dry_run);
    if let Some(dir) = config.backup_path() {
        info!("Backing up deleted files to {}", dir.display());
        deleter = deleter.with_backup(BackupManager::new(dir));
    }

    Ok(Arc::new(Orchestrator::new(
        config.orchestrator_config(),
        Arc::new(VcxprojReader::new()),
        Arc::new(deleter),
        Arc::new(generator),
        ReferenceCache::new(config.cache_path()),
    )))
}

pub fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Busy => println!("Another reconciliation is in progress."),
        RunOutcome::Completed(report) => print_report(report),
    }
}

fn print_report(report: &RunReport) {
    print_diff("Pre-generation", &report.pre_diff);
    match &report.generation {
        Generation::NotRun => {}
        Generation::Finished(output) if output.success() => {
            println!("Generator:       ok ({:.1}s)", output.elapsed.as_secs_f32())
        }
        Generation::Finished(output) => println!("Generator:       failed ({:?})", output.status),
        Generation::Error(e) => println!("Generator:       could not run: {}", e),
    }
    print_diff("Post-generation", &report.post_diff);
    if let Some(e) = &report.error {
        println!("Error:           {}", e);
    }
}

fn print_diff(label: &str, outcome: &DiffOutcome) {
    match outcome {
        DiffOutcome::Skipped => {}
        DiffOutcome::ReadFailed => {
            println!("{:<16} descriptors unreadable, nothing deleted", format!("{label}:"))
        }
        DiffOutcome::CeilingExceeded { removed } => println!(
            "{:<16} {} removals exceed the safety limit, nothing deleted",
            format!("{label}:"),
            removed
        ),
        DiffOutcome::Applied(report) => {
            println!(
                "{:<16} {} deleted, {} failed, {} dry-run, {} directories removed",
                format!("{label}:"),
                report.deleted.len(),
                report.failed.len(),
                report.dry_run.len(),
                report.removed_dirs.len()
            );
            for path in report.failed.iter() {
                println!("  failed: {}", path.display());
            }
        }
    }
}
