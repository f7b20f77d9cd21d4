//! Gated two-phase reconciliation
//!
//! A run diffs the committed reference set against the descriptors, deletes
//! files that fell out of reference, regenerates the descriptors, diffs again
//! and commits. Only one run (or patrol) executes at a time; the committed set
//! lives inside the run lock so it can only change while the lock is held.

use super::cache::ReferenceCache;
use super::deleter::{Deleter, DeletionOutcome};
use super::generator::{GeneratorInvoker, GeneratorOutput, GeneratorStatus};
use super::paths::{NormalizedPath, ReferenceSet};
use super::reader::{ReferenceSetReader, read_all};
use super::report::DeletionReport;
use super::{Phase, ReconcileError, Result};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Default ceiling on deletions per diff
pub const DEFAULT_MAX_SAFE_DELETE: usize = 50;

/// Default generator timeout
pub const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Descriptors whose union is the current reference set
    pub descriptors: Vec<PathBuf>,
    /// Diff and delete before running the generator
    pub pre_generation_delete: bool,
    /// More removals than this in one diff aborts the deletion
    pub max_safe_delete: usize,
    pub generator_timeout: Duration,
    /// Deletion summaries are appended here when set
    pub report_file: Option<PathBuf>,
    /// Directories never removed by empty-directory cleanup
    pub protected_dirs: Vec<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            descriptors: Vec::new(),
            pre_generation_delete: true,
            max_safe_delete: DEFAULT_MAX_SAFE_DELETE,
            generator_timeout: DEFAULT_GENERATOR_TIMEOUT,
            report_file: None,
            protected_dirs: Vec::new(),
        }
    }
}

/// Result of one diff phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Phase did not run
    #[default]
    Skipped,
    /// A descriptor could not be read; nothing was deleted or committed
    ReadFailed,
    /// Too many removals; nothing was deleted or committed
    CeilingExceeded { removed: usize },
    /// Deletions attempted and the current set committed
    Applied(DeletionReport),
}

#[derive(Debug, Clone, Default)]
pub enum Generation {
    #[default]
    NotRun,
    Finished(GeneratorOutput),
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub pre_diff: DiffOutcome,
    pub generation: Generation,
    pub post_diff: DiffOutcome,
    /// Error that ended the run early, if any
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Another run held the lock; this request was dropped
    Busy,
    Completed(RunReport),
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Busy => None,
            RunOutcome::Completed(report) => Some(report),
        }
    }
}

/// Resets the phase to `Idle` when dropped, including on early return or panic
struct PhaseGuard<'a> {
    phase: &'a AtomicU8,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a AtomicU8, initial: Phase) -> Self {
        phase.store(initial as u8, Ordering::SeqCst);
        Self { phase }
    }

    fn advance(&self, next: Phase) {
        self.phase.store(next as u8, Ordering::SeqCst);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.store(Phase::Idle as u8, Ordering::SeqCst);
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    reader: Arc<dyn ReferenceSetReader>,
    deleter: Arc<dyn Deleter>,
    generator: Arc<dyn GeneratorInvoker>,
    cache: ReferenceCache,
    /// Run lock guarding the committed reference set
    cached: Mutex<ReferenceSet>,
    phase: AtomicU8,
}

impl Orchestrator {
    /// Create an orchestrator, loading the committed set from `cache`
    pub fn new(
        config: OrchestratorConfig,
        reader: Arc<dyn ReferenceSetReader>,
        deleter: Arc<dyn Deleter>,
        generator: Arc<dyn GeneratorInvoker>,
        cache: ReferenceCache,
    ) -> Self {
        let cached = cache.load();
        info!("Loaded {} committed references", cached.len());

        Self {
            config,
            reader,
            deleter,
            generator,
            cache,
            cached: Mutex::new(cached),
            phase: AtomicU8::new(Phase::Idle as u8),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Current phase; readable without the run lock
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.phase() != Phase::Idle
    }

    /// Snapshot of the committed set. Waits for an in-flight run to finish.
    pub async fn cached(&self) -> ReferenceSet {
        self.cached.lock().await.clone()
    }

    /// Full reconciliation: pre-diff, generate, post-diff, commit.
    ///
    /// Returns `Busy` immediately if a run or patrol is already in progress.
    pub async fn run(&self) -> RunOutcome {
        let Ok(mut cached) = self.cached.try_lock() else {
            warn!("Another reconciliation is in progress, skipping this request");
            return RunOutcome::Busy;
        };
        let initial = if self.config.pre_generation_delete {
            Phase::PreDiff
        } else {
            Phase::Generating
        };
        let phase = PhaseGuard::enter(&self.phase, initial);

        info!("Reconciliation started");
        let mut report = RunReport::default();
        if let Err(e) = self.reconcile(&mut cached, &phase, &mut report).await {
            error!("Reconciliation failed: {}", e);
            report.error = Some(e.to_string());
        }
        info!("Reconciliation finished, watching for changes");

        RunOutcome::Completed(report)
    }

    /// Post-diff and commit only, without running the generator.
    ///
    /// Catches removals that happened while nothing was watching.
    pub async fn patrol_for_changes(&self) -> RunOutcome {
        let Ok(mut cached) = self.cached.try_lock() else {
            debug!("Patrol skipped, reconciliation in progress");
            return RunOutcome::Busy;
        };
        let phase = PhaseGuard::enter(&self.phase, Phase::PostDiff);

        info!("Patrolling for unreferenced files");
        let mut report = RunReport::default();
        match self.post_diff(&mut cached, &phase) {
            Ok(outcome) => report.post_diff = outcome,
            Err(e) => {
                error!("Patrol failed: {}", e);
                report.error = Some(e.to_string());
            }
        }

        RunOutcome::Completed(report)
    }

    /// Replace the committed set with the current descriptor contents, deleting nothing
    pub async fn reset_cache(&self) -> Result<usize> {
        let Ok(mut cached) = self.cached.try_lock() else {
            return Err(ReconcileError::Busy);
        };
        let phase = PhaseGuard::enter(&self.phase, Phase::Committing);

        let current = read_all(self.reader.as_ref(), &self.config.descriptors)
            .ok_or_else(|| ReconcileError::DescriptorUnreadable(self.config.descriptors.clone()))?;
        let count = current.len();
        self.commit(&mut cached, current)?;
        drop(phase);

        info!("Reference cache reset to {} files", count);
        Ok(count)
    }

    async fn reconcile(
        &self,
        cached: &mut ReferenceSet,
        phase: &PhaseGuard<'_>,
        report: &mut RunReport,
    ) -> Result<()> {
        if self.config.pre_generation_delete {
            report.pre_diff = self.pre_diff(cached)?;
            if let DiffOutcome::CeilingExceeded { removed } = report.pre_diff {
                warn!(
                    "Run aborted: {} removals exceed the safety ceiling, nothing deleted",
                    removed
                );
                return Ok(());
            }
        }

        phase.advance(Phase::Generating);
        report.generation = self.generate().await;

        phase.advance(Phase::PostDiff);
        report.post_diff = self.post_diff(cached, phase)?;
        Ok(())
    }

    fn pre_diff(&self, cached: &mut ReferenceSet) -> Result<DiffOutcome> {
        let Some(current) = read_all(self.reader.as_ref(), &self.config.descriptors) else {
            error!("Descriptor parse failed, skipping pre-generation deletion");
            return Ok(DiffOutcome::ReadFailed);
        };

        let removed = cached.difference(&current);
        info!(
            "Pre-generation diff: cached {}, current {}, removed {}",
            cached.len(),
            current.len(),
            removed.len()
        );
        if removed.len() > self.config.max_safe_delete {
            warn!(
                "Too many files to delete: cached={} current={} removed={} (max {})",
                cached.len(),
                current.len(),
                removed.len(),
                self.config.max_safe_delete
            );
            return Ok(DiffOutcome::CeilingExceeded { removed: removed.len() });
        }

        let deletion = self.delete_removed("pre-generation", &removed);

        self.commit(cached, current)?;
        self.publish(&deletion);
        Ok(DiffOutcome::Applied(deletion))
    }

    async fn generate(&self) -> Generation {
        match self.generator.invoke(self.config.generator_timeout).await {
            Ok(output) => {
                match &output.status {
                    GeneratorStatus::Exited(Some(0)) => {
                        info!("Generator completed in {:?}", output.elapsed)
                    }
                    GeneratorStatus::Exited(code) => error!(
                        "Generator failed (code {:?})\nSTDOUT:\n{}\nSTDERR:\n{}",
                        code, output.stdout, output.stderr
                    ),
                    GeneratorStatus::TimedOut => error!(
                        "Generator timed out after {:?}\nSTDOUT:\n{}\nSTDERR:\n{}",
                        self.config.generator_timeout, output.stdout, output.stderr
                    ),
                }
                Generation::Finished(output)
            }
            Err(e) => {
                error!("Generator could not be run: {}", e);
                Generation::Error(e.to_string())
            }
        }
    }

    fn post_diff(&self, cached: &mut ReferenceSet, phase: &PhaseGuard<'_>) -> Result<DiffOutcome> {
        let Some(current) = read_all(self.reader.as_ref(), &self.config.descriptors) else {
            error!("Descriptor parse failed after generation, keeping committed references");
            return Ok(DiffOutcome::ReadFailed);
        };

        let removed = cached.difference(&current);
        if removed.len() > self.config.max_safe_delete {
            warn!(
                "Too many newly unreferenced files: removed={} (max {}), nothing deleted",
                removed.len(),
                self.config.max_safe_delete
            );
            return Ok(DiffOutcome::CeilingExceeded { removed: removed.len() });
        }
        if removed.is_empty() {
            info!("No newly unreferenced files");
        } else {
            info!("Deleting {} newly unreferenced files", removed.len());
        }

        let deletion = self.delete_removed("post-generation", &removed);

        phase.advance(Phase::Committing);
        self.commit(cached, current)?;
        self.publish(&deletion);
        Ok(DiffOutcome::Applied(deletion))
    }

    /// Delete every removed file, then any directory left empty by a deletion
    fn delete_removed(&self, label: &str, removed: &[PathBuf]) -> DeletionReport {
        let mut deletion = DeletionReport::new(label);
        let mut touched_dirs = BTreeSet::new();
        for path in removed {
            let outcome = self.deleter.delete(path);
            if outcome == DeletionOutcome::Deleted {
                if let Some(parent) = path.parent() {
                    touched_dirs.insert(parent.to_path_buf());
                }
            }
            deletion.record(path, outcome);
        }
        self.remove_empty_dirs(touched_dirs, &mut deletion);
        deletion
    }

    /// Deepest directories first so a parent is only checked after its children
    fn remove_empty_dirs(&self, dirs: BTreeSet<PathBuf>, deletion: &mut DeletionReport) {
        let mut dirs: Vec<PathBuf> = dirs.into_iter().collect();
        dirs.sort_by_key(|dir| Reverse(dir.components().count()));

        for dir in dirs {
            if self.is_protected(&dir) {
                debug!("Keeping protected directory {}", dir.display());
                continue;
            }
            match is_empty_dir(&dir) {
                Ok(true) => deletion.record_directory(&dir, self.deleter.delete_directory(&dir)),
                Ok(false) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!("Cannot inspect {}: {}", dir.display(), e),
            }
        }
    }

    fn is_protected(&self, dir: &Path) -> bool {
        let key = NormalizedPath::new(dir);
        self.config.protected_dirs.iter().any(|p| NormalizedPath::new(p) == key)
    }

    /// Persist first, then advance the in-memory set, so the two never disagree
    fn commit(&self, cached: &mut ReferenceSet, current: ReferenceSet) -> Result<()> {
        self.cache.save(&current)?;
        debug!("Committed {} references", current.len());
        *cached = current;
        Ok(())
    }

    fn publish(&self, deletion: &DeletionReport) {
        if deletion.is_empty() {
            return;
        }
        deletion.log();
        if let Some(file) = &self.config.report_file {
            if let Err(e) = deletion.append_to(file) {
                warn!("Could not append deletion report to {}: {}", file.display(), e);
            }
        }
    }
}

fn is_empty_dir(dir: &Path) -> std::io::Result<bool> {
    Ok(std::fs::read_dir(dir)?.next().is_none())
}
