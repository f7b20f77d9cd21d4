//! Reference-set reconciliation
//!
//! This module keeps the set of files a project descriptor references in sync
//! with what is on disk:
//! - Path normalization and reference sets
//! - Descriptor reading and the durable reference cache
//! - Deletion (with optional backups) and deletion reports
//! - Generator invocation
//! - The gated two-phase orchestrator

pub mod backup;
pub mod cache;
pub mod deleter;
pub mod generator;
pub mod orchestrator;
pub mod orphans;
pub mod paths;
pub mod reader;
pub mod report;

pub use backup::BackupManager;
pub use cache::ReferenceCache;
pub use deleter::{Deleter, DeletionOutcome, FsDeleter};
pub use generator::{CommandGenerator, GeneratorInvoker, GeneratorOutput, GeneratorStatus};
pub use orchestrator::{
    DiffOutcome, Generation, Orchestrator, OrchestratorConfig, RunOutcome, RunReport,
};
pub use orphans::find_orphans;
pub use paths::{NormalizedPath, ReferenceSet};
pub use reader::{ReferenceSetReader, VcxprojReader};
pub use report::DeletionReport;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to write reference cache {path}: {source}")]
    CacheWrite { path: PathBuf, source: std::io::Error },

    #[error("Failed to serialize reference cache: {0}")]
    CacheSerialize(#[from] serde_json::Error),

    #[error("Failed to start generator {program}: {source}")]
    GeneratorSpawn { program: PathBuf, source: std::io::Error },

    #[error("Generator process error: {0}")]
    GeneratorWait(std::io::Error),

    #[error("Backup of {path} failed: {source}")]
    Backup { path: PathBuf, source: std::io::Error },

    #[error("Project descriptors could not be read: {0:?}")]
    DescriptorUnreadable(Vec<PathBuf>),

    #[error("A reconciliation run is already in progress")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Phase of a reconciliation run. Advances monotonically within one run and
/// returns to `Idle` when the run ends, however it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    PreDiff = 1,
    Generating = 2,
    PostDiff = 3,
    Committing = 4,
}

impl Phase {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::PreDiff,
            2 => Phase::Generating,
            3 => Phase::PostDiff,
            4 => Phase::Committing,
            _ => Phase::Idle,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::PreDiff => "pre-diff",
            Phase::Generating => "generating",
            Phase::PostDiff => "post-diff",
            Phase::Committing => "committing",
        };
        f.write_str(name)
    }
}
