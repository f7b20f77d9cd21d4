//! Filesystem monitoring for project descriptor reconciliation
//!
//! This module turns raw filesystem notifications into reconciliation runs:
//! - Watching source roots with notify
//! - Classification of events as relevant or ignored
//! - Near-duplicate suppression
//! - Debouncing bursts into a single run trigger

pub mod classifier;
pub mod debouncer;
pub mod pipeline;
pub mod watcher;

pub use classifier::{Classification, EventFilter, IgnoreReason, Relevance};
pub use debouncer::{CoalescerState, Debouncer, DebouncerConfig, RunTrigger, Scheduling};
pub use pipeline::{EventPipeline, OrchestratorTrigger, PipelineDecision};
pub use watcher::{FileWatcher, WatcherHandle};

use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Kind of a filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
    /// Rename within the watched tree; `secondary_path` holds the destination
    Moved,
}

/// A filesystem change, as seen by the filter and coalescer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub kind: ChangeType,
    pub path: PathBuf,
    pub secondary_path: Option<PathBuf>,
    pub is_dir: bool,
    pub timestamp: Instant,
}

impl WatchedEvent {
    pub fn new(kind: ChangeType, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            secondary_path: None,
            is_dir: false,
            timestamp: Instant::now(),
        }
    }

    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self { secondary_path: Some(to.into()), ..Self::new(ChangeType::Moved, from) }
    }

    pub fn directory(mut self) -> Self {
        self.is_dir = true;
        self
    }

    pub fn at(mut self, timestamp: Instant) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Settings for the filter, coalescer and watcher
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Directories watched recursively
    pub watch_roots: Vec<PathBuf>,
    /// Project and filters descriptors; changes to these always trigger
    pub trigger_paths: Vec<PathBuf>,
    /// Extensions with leading dot, compared case-insensitively
    pub watch_extensions: Vec<String>,
    /// Case-insensitive substrings of the file name
    pub ignored_name_patterns: Vec<String>,
    /// Substrings of the normalized path such as `/intermediate/`
    pub ignored_dirs: Vec<String>,
    pub debounce: Duration,
    pub trigger_debounce: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watch_roots: Vec::new(),
            trigger_paths: Vec::new(),
            watch_extensions: [".cpp", ".h", ".hpp", ".c", ".inl"].map(String::from).to_vec(),
            ignored_name_patterns: Vec::new(),
            ignored_dirs: Vec::new(),
            debounce: Duration::from_millis(1500),
            trigger_debounce: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to create watcher: {0}")]
    Notify(#[from] notify::Error),

    #[error("Cannot watch {path}: {source}")]
    Watch { path: PathBuf, source: notify::Error },

    #[error("No directories to watch")]
    NothingToWatch,
}

pub type Result<T> = std::result::Result<T, MonitorError>;
